#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stack settings
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct StackConfig {
    /// Number of tracks reserved when a new event begins
    pub initial_capacity: usize,
    /// Factor by which the label-to-entry map grows when it runs out of space
    ///
    /// Values below 1 are treated as 1.
    pub file_map_growth: f64,
    /// Compare the computed store entry with the recorded one on every load
    pub check_entry_map: bool,
}

impl StackConfig {
    pub const DEFAULT_CAPACITY: usize = 1000;
    pub const DEFAULT_FILE_MAP_GROWTH: f64 = 1.5;

    pub fn new(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            file_map_growth: Self::DEFAULT_FILE_MAP_GROWTH,
            check_entry_map: true,
        }
    }

    /// Size the file map should grow to when it has to hold `needed` labels
    pub(crate) fn grown_size(&self, needed: usize) -> usize {
        let grown = (needed as f64 * self.file_map_growth.max(1.)) as usize;
        grown.max(needed)
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
