//! Particle property lookup
use std::collections::HashMap;

use crate::data::NewTrack;
use crate::error::StackError;

/// Source of particle masses, keyed by PDG code
pub trait ParticleDatabase {
    /// Mass in GeV, `None` if the particle is unknown
    fn mass(&self, pdg: i32) -> Option<f64>;
}

impl ParticleDatabase for HashMap<i32, f64> {
    fn mass(&self, pdg: i32) -> Option<f64> {
        self.get(&pdg).copied()
    }
}

impl<F: Fn(i32) -> Option<f64>> ParticleDatabase for F {
    fn mass(&self, pdg: i32) -> Option<f64> {
        self(pdg)
    }
}

/// On-shell energy for a particle with three-momentum `p`
pub fn energy<D>(db: &D, pdg: i32, p: [f64; 3]) -> Result<f64, StackError>
where
    D: ParticleDatabase + ?Sized,
{
    let mass = db.mass(pdg).ok_or(StackError::UnknownSpecies(pdg))?;
    Ok((mass * mass + p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt())
}

impl NewTrack {
    /// A primary track with the energy taken from the static mass
    ///
    /// The mass comes from `db`, not from the generator, so the two may
    /// disagree.
    pub fn on_shell<D>(db: &D, pdg: i32, p: [f64; 3], vertex: [f64; 3]) -> Result<Self, StackError>
    where
        D: ParticleDatabase + ?Sized,
    {
        let e = energy(db, pdg, p)?;
        Ok(Self::new(pdg, [p[0], p[1], p[2], e], vertex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_shell_energy() {
        let db = HashMap::from([(211, 0.13957), (22, 0.)]);
        let photon = NewTrack::on_shell(&db, 22, [3., 0., 4.], [0.; 3]).unwrap();
        assert_eq!(photon.momentum, [3., 0., 4., 5.]);
        let pion = NewTrack::on_shell(&db, 211, [0., 0., 1.], [0.; 3]).unwrap();
        assert!((pion.momentum[3] - (1. + 0.13957f64.powi(2)).sqrt()).abs() < 1e-12);
        assert!(matches!(
            NewTrack::on_shell(&db, 2212, [0.; 3], [0.; 3]),
            Err(StackError::UnknownSpecies(2212))
        ));
    }

    #[test]
    fn closure_database() {
        let db = |pdg: i32| (pdg.abs() == 11).then_some(0.000511);
        assert_eq!(energy(&db, -11, [0.; 3]).unwrap(), 0.000511);
    }
}
