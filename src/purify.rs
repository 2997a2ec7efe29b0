//! Compaction of the secondaries on the stack
use log::debug;

use crate::data::ParticleRecord;
use crate::error::{CorruptReason, StackError};
use crate::remap::{Notifier, RemapTable};
use crate::stack::{corrupt, Stack};
use crate::store::ParticleStore;

/// Decides which secondaries survive compaction for physics reasons
///
/// Only asked for direct daughters of primaries. Secondaries flagged
/// with [Stack::flag_track] are kept regardless.
pub trait KeepPolicy {
    fn keep(&self, record: &ParticleRecord, mother: &ParticleRecord) -> bool;
}

impl<F: Fn(&ParticleRecord, &ParticleRecord) -> bool> KeepPolicy for F {
    fn keep(&self, record: &ParticleRecord, mother: &ParticleRecord) -> bool {
        self(record, mother)
    }
}

/// Keep first-generation daughters of charm and beauty hadrons
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HeavyFlavour;

impl HeavyFlavour {
    /// Heaviest quark flavour in a PDG code
    pub fn flavour(pdg: i32) -> u32 {
        let mut kf = pdg.unsigned_abs();
        // mesons
        if kf > 10 {
            kf /= 100
        }
        // baryons
        if kf > 10 {
            kf /= 10
        }
        if kf > 10 {
            kf /= 10
        }
        kf
    }
}

impl KeepPolicy for HeavyFlavour {
    fn keep(&self, _record: &ParticleRecord, mother: &ParticleRecord) -> bool {
        Self::flavour(mother.pdg) >= 4
    }
}

/// Only keep explicitly flagged tracks
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NoPhysicsKeep;

impl KeepPolicy for NoPhysicsKeep {
    fn keep(&self, _record: &ParticleRecord, _mother: &ParticleRecord) -> bool {
        false
    }
}

impl<S: ParticleStore> Stack<S> {
    /// Remove all secondaries that are not flagged to be kept
    ///
    /// The surviving secondaries are renumbered contiguously after the
    /// primaries, keeping their order, and written to the store. All
    /// observers registered with `notifier` are told about the new
    /// labels before anything is written.
    ///
    /// On error the stack is left in an inconsistent state. The store
    /// event stays open, so no further event can begin on the same store.
    ///
    /// Fails with [StackError::CorruptIndex] if a kept secondary has a
    /// discarded mother, which happens when a track was marked with
    /// [keep_track](Stack::keep_track) without its ancestors.
    pub fn purify(&mut self, notifier: &mut Notifier<'_>) -> Result<RemapTable, StackError> {
        let first = self.first_secondary();
        let n_track = self.n_track();
        if first >= n_track {
            return Ok(RemapTable::identity(n_track));
        }

        for label in first..n_track {
            if self.resident(label).is_none() {
                return Err(corrupt(label, CorruptReason::NotResident));
            }
            if self.keep_for_physics(label) {
                self.flag_track(label)?;
            }
            let record = self.particle_mut(label)?;
            record.flags.daughters_valid = false;
            record.reset_daughters();
        }

        // generation order may interleave, so the range of the mother of
        // the first secondary cannot be trusted after removals
        if let Some(mother) = self.resident(first).and_then(|record| record.mother) {
            self.particle_mut(mother)?.flags.daughters_valid = false;
        }

        let mut map: Vec<_> = (0..first).map(Some).collect();
        map.resize(n_track, None);
        let mut n_keep = first;
        for label in first..n_track {
            let keep = self.resident(label).map_or(false, |record| record.flags.keep);
            if !keep {
                continue;
            }
            map[label] = Some(n_keep);
            let mut record = self.particles[label]
                .take()
                .ok_or_else(|| corrupt(label, CorruptReason::NotResident))?;
            record.label = n_keep;
            if let Some(mother) = record.mother.filter(|&mother| mother >= first) {
                let new_mother = map[mother]
                    .ok_or_else(|| corrupt(label, CorruptReason::DiscardedMother { mother }))?;
                record.mother = Some(new_mother);
            }
            self.particles[n_keep] = Some(record);
            n_keep += 1;
        }

        for label in first..n_keep {
            let Some(mother) = self.resident(label).and_then(|record| record.mother) else {
                continue;
            };
            let father = self.particle_mut(mother)?;
            if father.flags.daughters_valid {
                father.add_daughter(label);
            } else {
                father.first_daughter = Some(label);
                father.last_daughter = Some(label);
                father.flags.daughters_valid = true;
            }
        }

        let remap = RemapTable::new(map);
        notifier.notify(&remap);

        for label in first..n_keep {
            let entry = match &self.particles[label] {
                Some(record) => self.store.append(record)?,
                None => return Err(corrupt(label, CorruptReason::NotResident)),
            };
            self.record_entry(label, entry)?;
            self.particles[label] = None;
        }
        self.particles.truncate(n_keep);
        self.hgwmk = n_keep.checked_sub(1);
        debug!(
            "Purified stack: kept {} of {} secondaries, {} tracks left",
            n_keep - first,
            n_track - first,
            n_keep
        );
        Ok(remap)
    }

    fn keep_for_physics(&self, label: usize) -> bool {
        let Some(record) = self.resident(label) else {
            return false;
        };
        match record.mother {
            Some(mother) if Some(mother) <= self.hgwmk => self
                .resident(mother)
                .map_or(false, |father| self.policy.keep(record, father)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NewTrack;
    use crate::remap::{TrackHit, TrackHits, TrackReferences};
    use crate::store::MemoryStore;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Hit(Option<usize>);

    impl TrackHit for Hit {
        fn track(&self) -> Option<usize> {
            self.0
        }

        fn set_track(&mut self, track: Option<usize>) {
            self.0 = track
        }
    }

    fn track(pdg: i32, mother: Option<usize>) -> NewTrack {
        let track = NewTrack::new(pdg, [0., 0.2, 1., 1.03], [0.; 3]);
        match mother {
            Some(mother) => track.with_mother(mother),
            None => track,
        }
    }

    fn stack() -> Stack {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut stack = Stack::new(MemoryStore::new());
        stack.begin_event(0).unwrap();
        stack
    }

    #[test]
    fn flavour() {
        assert_eq!(HeavyFlavour::flavour(411), 4);
        assert_eq!(HeavyFlavour::flavour(-521), 5);
        assert_eq!(HeavyFlavour::flavour(4122), 4);
        assert_eq!(HeavyFlavour::flavour(5332), 5);
        assert_eq!(HeavyFlavour::flavour(211), 2);
        assert_eq!(HeavyFlavour::flavour(2212), 2);
        assert_eq!(HeavyFlavour::flavour(22), 0);
        assert_eq!(HeavyFlavour::flavour(5), 5);
    }

    #[test]
    fn discard_unflagged_sibling() {
        let mut stack = stack();
        let a = stack.push_track(track(22, None)).unwrap();
        let b = stack.push_track(track(11, Some(a))).unwrap();
        let c = stack.push_track(track(-11, Some(a))).unwrap();
        stack.flag_track(c).unwrap();

        let mut hits = TrackHits::new();
        hits.push(Hit(Some(b)));
        hits.push(Hit(Some(c)));
        let mut refs = TrackReferences::new();
        refs.insert(b, 0.5);
        refs.insert(c, 1.5);
        let mut seen = Vec::new();
        let mut printer = |remap: &RemapTable| seen.push(remap.to_string());
        let remap = {
            let mut notifier = Notifier::new();
            notifier.register(&mut hits).register(&mut refs).register(&mut printer);
            stack.purify(&mut notifier).unwrap()
        };

        assert_eq!(remap.as_slice(), [Some(0), None, Some(1)]);
        assert_eq!(seen, ["{0:0, 1:-, 2:1}"]);
        assert_eq!(hits.hits, [Hit(None), Hit(Some(1))]);
        assert_eq!(refs.iter().collect::<Vec<_>>(), [&(1, 1.5)]);

        assert_eq!(stack.n_track(), 2);
        assert_eq!(stack.high_water_mark(), Some(1));
        assert_eq!(stack.n_primary(), 1);
        assert_eq!(stack.particle(a).unwrap().daughters(), Some(1..=1));
        let kept = stack.particle(1).unwrap();
        assert_eq!((kept.label, kept.pdg, kept.mother), (1, -11, Some(a)));
        assert_eq!(stack.store().records().len(), 1);
        assert!(stack.is_persisted(1));
    }

    #[test]
    fn relabel_mothers_of_kept_secondaries() {
        let mut stack = stack();
        stack.set_keep_policy(NoPhysicsKeep);
        stack.push_track(track(2212, None)).unwrap();
        stack.push_track(track(211, Some(0))).unwrap(); // 1, dropped
        stack.push_track(track(211, Some(0))).unwrap(); // 2 -> 1
        stack.push_track(track(22, Some(2))).unwrap(); // 3, dropped
        stack.push_track(track(11, Some(2))).unwrap(); // 4 -> 2
        stack.push_track(track(11, Some(4))).unwrap(); // 5 -> 3
        stack.flag_track(5).unwrap();

        let remap = stack.purify(&mut Notifier::new()).unwrap();
        assert_eq!(remap.kept().collect::<Vec<_>>(), [(0, 0), (2, 1), (4, 2), (5, 3)]);
        assert_eq!(remap.discarded().collect::<Vec<_>>(), [1, 3]);

        let lineage: Vec<_> = (0..4)
            .map(|label| {
                let record = stack.particle(label).unwrap();
                (record.label, record.mother, record.daughters())
            })
            .collect();
        assert_eq!(
            lineage,
            [
                (0, None, Some(1..=1)),
                (1, Some(0), Some(2..=2)),
                (2, Some(1), Some(3..=3)),
                (3, Some(2), None),
            ]
        );
        let stored: Vec<_> = stack.store().records().iter().map(|r| r.label).collect();
        assert_eq!(stored, [1, 2, 3]);
    }

    #[test]
    fn physics_keep() {
        let mut stack = stack();
        let d = stack.push_track(track(421, None)).unwrap();
        let p = stack.push_track(track(2212, None)).unwrap();
        let k = stack.push_track(track(-321, Some(d))).unwrap();
        stack.push_track(track(211, Some(p))).unwrap();
        stack.push_track(track(22, Some(k))).unwrap();

        let remap = stack.purify(&mut Notifier::new()).unwrap();
        assert_eq!(remap.as_slice(), [Some(0), Some(1), Some(2), None, None]);
        assert!(stack.particle(d).unwrap().flags.keep);
        assert_eq!(stack.particle(2).unwrap().pdg, -321);
    }

    #[test]
    fn closure_policy() {
        let mut stack = stack();
        stack.set_keep_policy(|record: &ParticleRecord, _: &ParticleRecord| record.pdg == 22);
        stack.push_track(track(111, None)).unwrap();
        stack.push_track(track(22, Some(0))).unwrap();
        stack.push_track(track(11, Some(0))).unwrap();
        stack.push_track(track(22, Some(0))).unwrap();

        let remap = stack.purify(&mut Notifier::new()).unwrap();
        assert_eq!(remap.as_slice(), [Some(0), Some(1), None, Some(2)]);
        assert_eq!(stack.particle(0).unwrap().daughters(), Some(1..=2));
    }

    #[test]
    fn nothing_to_purify() {
        let mut stack = stack();
        stack.push_track(track(22, None)).unwrap();
        stack.push_track(track(22, None)).unwrap();
        let mut calls = 0;
        let mut count = |_: &RemapTable| calls += 1;
        let remap = {
            let mut notifier = Notifier::new();
            notifier.register(&mut count);
            stack.purify(&mut notifier).unwrap()
        };
        assert!(remap.is_identity());
        assert_eq!(remap.len(), 2);
        assert_eq!(calls, 0);
        assert_eq!(stack.store().records().len(), 0);
    }

    #[test]
    fn discarded_mother_is_corrupt() {
        let mut stack = stack();
        stack.set_keep_policy(NoPhysicsKeep);
        stack.push_track(track(22, None)).unwrap();
        stack.push_track(track(11, Some(0))).unwrap();
        stack.push_track(track(22, Some(1))).unwrap();
        // kept without its mother
        stack.keep_track(2).unwrap();
        assert!(matches!(
            stack.purify(&mut Notifier::new()),
            Err(StackError::CorruptIndex {
                label: 2,
                reason: CorruptReason::DiscardedMother { mother: 1 }
            })
        ));
        assert_eq!(stack.store().records().len(), 0);
    }

    #[test]
    fn untouched_primary_keeps_insertion_range() {
        let mut stack = stack();
        stack.set_keep_policy(NoPhysicsKeep);
        stack.push_track(track(22, None)).unwrap();
        stack.push_track(track(22, None)).unwrap();
        stack.push_track(track(11, Some(0))).unwrap();
        stack.push_track(track(11, Some(1))).unwrap();
        stack.push_track(track(-11, Some(1))).unwrap();
        stack.keep_track(4).unwrap();

        let remap = stack.purify(&mut Notifier::new()).unwrap();
        assert_eq!(remap.get(4), Some(2));
        assert_eq!(stack.n_track(), 3);
        assert_eq!(stack.particle(0).unwrap().daughters(), None);
        // widened by the new label, still reaching the old ones
        assert_eq!(stack.particle(1).unwrap().daughters(), Some(2..=4));
        assert_eq!(stack.particle(2).unwrap().mother, Some(1));
    }

    #[test]
    fn purify_twice() {
        let mut stack = stack();
        stack.set_keep_policy(NoPhysicsKeep);
        stack.push_track(track(22, None)).unwrap();
        stack.push_track(track(11, Some(0))).unwrap();
        stack.keep_track(1).unwrap();
        stack.purify(&mut Notifier::new()).unwrap();

        stack.push_track(track(22, Some(0))).unwrap();
        stack.push_track(track(22, Some(0))).unwrap();
        stack.keep_track(3).unwrap();
        let remap = stack.purify(&mut Notifier::new()).unwrap();
        assert_eq!(remap.as_slice(), [Some(0), Some(1), None, Some(2)]);
        assert_eq!(stack.n_track(), 3);
        assert_eq!(stack.entry(2).unwrap(), 1);
        assert_eq!(stack.particle(2).unwrap().mother, Some(0));

        let summary = stack.finish_event().unwrap();
        assert_eq!((summary.n_track, summary.n_primary), (3, 1));
        assert_eq!(stack.entry(0).unwrap(), 2);
        assert_eq!(stack.particle(0).unwrap().pdg, 22);
    }
}
