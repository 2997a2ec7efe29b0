use std::fmt;

use crate::status::{self, Mechanism};

pub type XmlTree = xmltree::Element;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bookkeeping bits of a particle record
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ParticleFlags {
    /// Already handed out for transport
    pub done: bool,
    /// Survives compaction
    pub keep: bool,
    /// `first_daughter` and `last_daughter` can be trusted
    pub daughters_valid: bool,
}

impl ParticleFlags {
    const DONE: u8 = 1;
    const KEEP: u8 = 2;
    const DAUGHTERS: u8 = 4;

    /// Pack into the bit field used by the text store
    pub fn bits(self) -> u8 {
        let mut bits = 0;
        if self.done {
            bits |= Self::DONE
        }
        if self.keep {
            bits |= Self::KEEP
        }
        if self.daughters_valid {
            bits |= Self::DAUGHTERS
        }
        bits
    }

    /// Unpack from the text store bit field
    pub fn from_bits(bits: u8) -> Self {
        Self {
            done: bits & Self::DONE != 0,
            keep: bits & Self::KEEP != 0,
            daughters_valid: bits & Self::DAUGHTERS != 0,
        }
    }
}

/// One simulated particle on the stack
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(PartialEq, Debug, Clone)]
pub struct ParticleRecord {
    /// Position on the stack
    pub label: usize,
    /// PDG particle code
    pub pdg: i32,
    /// Generation status code, see [status](crate::status)
    pub status: i32,
    /// Production mechanism
    pub mechanism: Mechanism,
    /// Four-momentum `[px, py, pz, E]` in GeV
    pub momentum: [f64; 4],
    /// Production vertex in cm
    pub vertex: [f64; 3],
    /// Time of flight in seconds
    pub tof: f64,
    /// Polarisation vector
    pub polarisation: [f64; 3],
    /// Statistical weight
    pub weight: f64,
    /// Label of the mother, `None` for primaries
    pub mother: Option<usize>,
    /// Label of the first daughter
    pub first_daughter: Option<usize>,
    /// Label of the last daughter
    pub last_daughter: Option<usize>,
    pub flags: ParticleFlags,
}

impl ParticleRecord {
    pub fn is_primary(&self) -> bool {
        self.mother.is_none()
    }

    /// Labels of all daughters, if the daughter range is valid
    ///
    /// Compaction rebuilds the range of every mother of a kept secondary
    /// and invalidates the range of the mother of the first secondary.
    /// Any other primary keeps the range from insertion, widened by the
    /// new labels of its kept daughters. Such a range can still name
    /// discarded labels and reach past [Stack::n_track](crate::Stack::n_track).
    /// Compacting after every primary keeps all ranges exact.
    pub fn daughters(&self) -> Option<std::ops::RangeInclusive<usize>> {
        if !self.flags.daughters_valid {
            return None;
        }
        match (self.first_daughter, self.last_daughter) {
            (Some(first), Some(last)) => Some(first..=last),
            _ => None,
        }
    }

    pub(crate) fn reset_daughters(&mut self) {
        self.first_daughter = None;
        self.last_daughter = None;
    }

    pub(crate) fn add_daughter(&mut self, label: usize) {
        self.first_daughter = Some(self.first_daughter.map_or(label, |d| d.min(label)));
        self.last_daughter = Some(self.last_daughter.map_or(label, |d| d.max(label)));
    }
}

impl fmt::Display for ParticleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lineage = |l: Option<usize>| l.map_or(-1, |l| l as i64);
        write!(
            f,
            "{:>6} pdg {:>8} status {:>2} mother {:>6} daughters [{}, {}] \
             p ({:.4}, {:.4}, {:.4}, {:.4}) v ({:.4}, {:.4}, {:.4}) {}",
            self.label,
            self.pdg,
            self.status,
            lineage(self.mother),
            lineage(self.first_daughter),
            lineage(self.last_daughter),
            self.momentum[0],
            self.momentum[1],
            self.momentum[2],
            self.momentum[3],
            self.vertex[0],
            self.vertex[1],
            self.vertex[2],
            self.mechanism,
        )
    }
}

/// Input for a new entry on the stack
///
/// ```rust
/// use kinestack::{NewTrack, status::Mechanism};
///
/// let pion = NewTrack::new(211, [0.1, 0.2, 3.0, 3.01], [0.; 3])
///     .with_mother(0)
///     .with_mechanism(Mechanism::DECAY);
/// assert_eq!(pion.mother, Some(0));
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(PartialEq, Debug, Clone)]
pub struct NewTrack {
    /// Mother label, `None` for a primary
    pub mother: Option<usize>,
    /// Whether the track still has to be transported
    pub transport: bool,
    pub pdg: i32,
    pub status: i32,
    pub mechanism: Mechanism,
    pub momentum: [f64; 4],
    pub vertex: [f64; 3],
    pub tof: f64,
    pub polarisation: [f64; 3],
    pub weight: f64,
}

impl NewTrack {
    /// A primary final-state track to be transported
    pub fn new(pdg: i32, momentum: [f64; 4], vertex: [f64; 3]) -> Self {
        Self {
            mother: None,
            transport: true,
            pdg,
            status: status::FINAL_STATE,
            mechanism: Mechanism::PRIMARY,
            momentum,
            vertex,
            tof: 0.,
            polarisation: [0.; 3],
            weight: 1.,
        }
    }

    pub fn with_mother(mut self, mother: usize) -> Self {
        self.mother = Some(mother);
        self
    }

    pub fn with_transport(mut self, transport: bool) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    pub fn with_mechanism(mut self, mechanism: Mechanism) -> Self {
        self.mechanism = mechanism;
        self
    }

    pub fn with_tof(mut self, tof: f64) -> Self {
        self.tof = tof;
        self
    }

    pub fn with_polarisation(mut self, polarisation: [f64; 3]) -> Self {
        self.polarisation = polarisation;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// The record this track becomes when it is stored under `label`
    pub fn into_record(self, label: usize) -> ParticleRecord {
        ParticleRecord {
            label,
            pdg: self.pdg,
            status: self.status,
            mechanism: self.mechanism,
            momentum: self.momentum,
            vertex: self.vertex,
            tof: self.tof,
            polarisation: self.polarisation,
            weight: self.weight,
            mother: self.mother,
            first_daughter: None,
            last_daughter: None,
            flags: ParticleFlags {
                done: !self.transport,
                keep: false,
                daughters_valid: true,
            },
        }
    }
}

/// Stack counters stored when an event is closed
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct EventSummary {
    pub number: usize,
    /// Number of tracks after the last compaction
    pub n_track: usize,
    /// Number of primaries
    pub n_primary: usize,
}

/// Run information handed to a store when it is created
///
/// Takes the place of looking up the current run through a global.
#[derive(PartialEq, Debug, Clone)]
pub struct RunContext {
    /// Run number
    pub run: u32,
    /// Name of the event folder the kinematics belong to
    pub folder: String,
    /// Optional user information written into the store header
    pub info: Option<XmlTree>,
}

impl RunContext {
    pub const DEFAULT_FOLDER: &'static str = "Event";

    pub fn new(run: u32) -> Self {
        Self {
            run,
            folder: Self::DEFAULT_FOLDER.to_owned(),
            info: None,
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(0)
    }
}
