//! Generation status codes and production mechanisms

/// Empty entry
pub const NULL: i32 = 0;
/// Existing entry, not decayed or fragmented
pub const FINAL_STATE: i32 = 1;
/// Decayed or fragmented entry
pub const DECAYED: i32 = 2;
/// Documentation line, e.g. a hard-process parton
pub const DOCUMENTATION: i32 = 3;
/// Incoming beam particle
pub const INCOMING_BEAM: i32 = 4;

/// Production mechanism attached to each track
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Mechanism(pub u32);

impl Mechanism {
    /// Produced by the event generator
    pub const PRIMARY: Mechanism = Mechanism(0);
    /// Multiple scattering
    pub const MULTIPLE_SCATTERING: Mechanism = Mechanism(1);
    /// Energy loss
    pub const ENERGY_LOSS: Mechanism = Mechanism(2);
    /// Decay
    pub const DECAY: Mechanism = Mechanism(4);
    /// Pair production
    pub const PAIR_PRODUCTION: Mechanism = Mechanism(5);
    /// Compton scattering
    pub const COMPTON: Mechanism = Mechanism(6);
    /// Photoelectric effect
    pub const PHOTOELECTRIC: Mechanism = Mechanism(7);
    /// Bremsstrahlung
    pub const BREMSSTRAHLUNG: Mechanism = Mechanism(8);
    /// Delta ray production
    pub const DELTA_RAY: Mechanism = Mechanism(9);
    /// Positron annihilation
    pub const ANNIHILATION: Mechanism = Mechanism(10);
    /// Hadronic interaction
    pub const HADRONIC: Mechanism = Mechanism(11);
    /// Unspecified process
    pub const UNKNOWN: Mechanism = Mechanism(44);
}

impl std::fmt::Display for Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match *self {
            Mechanism::PRIMARY => "primary",
            Mechanism::MULTIPLE_SCATTERING => "multiple scattering",
            Mechanism::ENERGY_LOSS => "energy loss",
            Mechanism::DECAY => "decay",
            Mechanism::PAIR_PRODUCTION => "pair production",
            Mechanism::COMPTON => "compton",
            Mechanism::PHOTOELECTRIC => "photoelectric",
            Mechanism::BREMSSTRAHLUNG => "bremsstrahlung",
            Mechanism::DELTA_RAY => "delta ray",
            Mechanism::ANNIHILATION => "annihilation",
            Mechanism::HADRONIC => "hadronic",
            Mechanism::UNKNOWN => "unknown",
            Mechanism(other) => return write!(f, "mechanism {}", other),
        };
        f.write_str(name)
    }
}
