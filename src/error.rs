use std::io;

use thiserror::Error;

/// Errors from stack operations
#[derive(Debug, Error)]
pub enum StackError {
    /// The mother of a new track does not exist (yet)
    #[error("Mother {mother} does not exist, stack holds {n_track} tracks")]
    InvalidParent { mother: usize, n_track: usize },
    /// A label outside the stack or outside the requested region
    #[error("Invalid track label {label}, stack holds {n_track} tracks")]
    InvalidLabel { label: usize, n_track: usize },
    /// The mother was written to the store and can no longer take daughters
    #[error("Mother {mother} was already written to the store")]
    MotherPersisted { mother: usize },
    /// More primaries than tracks
    #[error("{n_primary} primaries but only {n_track} tracks")]
    PrimaryCount { n_primary: usize, n_track: usize },
    /// A primary label where only secondaries are allowed
    #[error("Track {label} is not a secondary, there are {n_primary} primaries")]
    NotSecondary { label: usize, n_primary: usize },
    /// Internal bookkeeping is inconsistent; the event has to be abandoned
    #[error("Corrupt index for track {label}: {reason}")]
    CorruptIndex { label: usize, reason: CorruptReason },
    /// The event was closed while secondaries were still uncompacted
    #[error("{count} secondaries have not been compacted")]
    PendingSecondaries { count: usize },
    /// Tracks can only be added to an open event
    #[error("No open event")]
    EventClosed,
    /// The particle database does not know this particle
    #[error("Unknown particle species {0}")]
    UnknownSpecies(i32),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reason for a [StackError::CorruptIndex]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorruptReason {
    #[error("computed entry {computed} but file map has {mapped:?}")]
    EntryMismatch {
        computed: usize,
        mapped: Option<usize>,
    },
    #[error("store entry {entry} holds track {found}")]
    LabelMismatch { entry: usize, found: usize },
    #[error("kept track has discarded mother {mother}")]
    DiscardedMother { mother: usize },
    #[error("track is neither in memory nor persisted")]
    NotResident,
}

/// Errors from particle stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Entry {entry} not found, event holds {count} entries")]
    NotFound { entry: usize, count: usize },
    #[error("No event selected")]
    NoEvent,
    #[error("Event {0} is still open")]
    EventOpen(usize),
    #[error("No closed event with number {0}")]
    NoSuchEvent(usize),
    #[error("Event summary has {n_primary} primaries but only {n_track} tracks")]
    InconsistentSummary { n_track: usize, n_primary: usize },
    #[error("Store is read-only")]
    ReadOnly,
    #[error("First line '{0}' does not start a kinematics file")]
    BadFirstLine(String),
    #[error("Unsupported version {0}, only 1.0 is supported")]
    UnsupportedVersion(String),
    #[error("Version information missing")]
    MissingVersion,
    #[error("Encountered unrecognized line '{0}'")]
    BadLine(String),
    #[error("Missing entry '{0}'")]
    MissingEntry(&'static str),
    #[error("Failed to convert to number: '{0}'")]
    ConversionError(String),
    #[error("Encountered '{0}' block without closing tag")]
    EndOfFile(&'static str),
    #[error("Malformed xml: {0}")]
    Xml(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
