//! The particle stack
//!
//! Tracks are pushed during an event and get dense labels in insertion
//! order. The first `hgwmk + 1` labels are primaries, everything after
//! is a secondary produced during transport. Secondaries are compacted
//! and spilled to the store by [Stack::purify], the remaining primaries
//! are spilled by [Stack::finish_event]. Spilled records are read back
//! on demand.
use std::fmt;

use log::{debug, error, trace, warn};

use crate::config::StackConfig;
use crate::data::{EventSummary, NewTrack, ParticleRecord};
use crate::error::{CorruptReason, StackError, StoreError};
use crate::purify::{HeavyFlavour, KeepPolicy};
use crate::store::{MemoryStore, ParticleStore};

/// Entry index in the store of the track with `label`
///
/// Within one event the store holds the compacted secondaries first,
/// followed by the primaries appended when the event is finished.
pub fn tree_entry(label: usize, n_primary: usize, n_track: usize) -> Result<usize, StackError> {
    if label >= n_track {
        return Err(StackError::InvalidLabel { label, n_track });
    }
    if label < n_primary {
        let n_secondary = n_track
            .checked_sub(n_primary)
            .ok_or(StackError::PrimaryCount { n_primary, n_track })?;
        Ok(label + n_secondary)
    } else {
        secondary_entry(label, n_primary)
    }
}

/// Entry index of a secondary, which precede all primaries in the store
pub fn secondary_entry(label: usize, n_primary: usize) -> Result<usize, StackError> {
    label
        .checked_sub(n_primary)
        .ok_or(StackError::NotSecondary { label, n_primary })
}

pub(crate) fn corrupt(label: usize, reason: CorruptReason) -> StackError {
    error!("Corrupt index for track {}: {}", label, reason);
    StackError::CorruptIndex { label, reason }
}

/// Stack of particles with a disk-spillable kinematics tree
///
/// # Example
///
/// ```rust
/// use kinestack::{MemoryStore, NewTrack, Notifier, Stack};
///
/// let mut stack = Stack::new(MemoryStore::new());
/// stack.begin_event(0).unwrap();
/// let d = stack.push_track(NewTrack::new(411, [0., 0., 10., 10.2], [0.; 3])).unwrap();
/// let k = stack.push_track(NewTrack::new(-321, [0., 0.1, 5., 5.03], [0.; 3]).with_mother(d)).unwrap();
/// let pi = stack.push_track(NewTrack::new(211, [0., -0.1, 5., 5.01], [0.; 3]).with_mother(d)).unwrap();
/// stack.flag_track(pi).unwrap();
///
/// let remap = stack.purify(&mut Notifier::new()).unwrap();
/// assert_eq!(remap.get(k), Some(1));
/// assert_eq!(remap.get(pi), Some(2));
/// let summary = stack.finish_event().unwrap();
/// assert_eq!(summary.n_track, 3);
/// assert_eq!(stack.particle(pi).unwrap().mother, Some(d));
/// ```
pub struct Stack<S = MemoryStore> {
    /// Records in memory, indexed by label
    pub(crate) particles: Vec<Option<ParticleRecord>>,
    /// Store entry of each persisted label
    pub(crate) file_map: Vec<Option<usize>>,
    pub(crate) store: S,
    pub(crate) config: StackConfig,
    pub(crate) policy: Box<dyn KeepPolicy>,
    pub(crate) n_primary: usize,
    pub(crate) hgwmk: Option<usize>,
    current: Option<usize>,
    current_primary: Option<usize>,
    event: Option<usize>,
    next_event: usize,
    open: bool,
}

impl<S: ParticleStore> Stack<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, StackConfig::default())
    }

    pub fn with_config(store: S, config: StackConfig) -> Self {
        Self {
            particles: Vec::with_capacity(config.initial_capacity),
            file_map: Vec::new(),
            store,
            config,
            policy: Box::new(HeavyFlavour),
            n_primary: 0,
            hgwmk: None,
            current: None,
            current_primary: None,
            event: None,
            next_event: 0,
            open: false,
        }
    }

    /// Replace the policy deciding which secondaries are kept for physics reasons
    pub fn set_keep_policy<P: KeepPolicy + 'static>(&mut self, policy: P) {
        self.policy = Box::new(policy);
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Number of tracks in the current event
    pub fn n_track(&self) -> usize {
        self.particles.len()
    }

    /// Number of primaries in the current event
    pub fn n_primary(&self) -> usize {
        self.n_primary
    }

    /// Last label before the secondaries
    pub fn high_water_mark(&self) -> Option<usize> {
        self.hgwmk
    }

    /// Number of secondaries that have not been compacted yet
    pub fn pending_secondaries(&self) -> usize {
        self.n_track().saturating_sub(self.first_secondary())
    }

    /// Label of the track last handed out for transport
    pub fn current_track(&self) -> Option<usize> {
        self.current
    }

    pub fn event_number(&self) -> Option<usize> {
        self.event
    }

    /// Whether tracks can be pushed
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn first_secondary(&self) -> usize {
        self.hgwmk.map_or(0, |hgwmk| hgwmk + 1)
    }

    /// Store entry of the track with `label`
    pub fn entry(&self, label: usize) -> Result<usize, StackError> {
        tree_entry(label, self.n_primary, self.n_track())
    }

    /// Open the next event with room for `capacity` tracks
    ///
    /// The event is numbered one past the highest event begun so far.
    /// Fails if the current event has not been finished.
    pub fn reset(&mut self, capacity: usize) -> Result<usize, StackError> {
        let number = self.next_event;
        self.store.begin_event(number)?;
        self.clear(capacity);
        self.event = Some(number);
        self.next_event = number + 1;
        Ok(number)
    }

    /// Start event `number` in the store and reset the stack for it
    pub fn begin_event(&mut self, number: usize) -> Result<(), StackError> {
        self.store.begin_event(number)?;
        self.clear(self.config.initial_capacity);
        self.event = Some(number);
        self.next_event = self.next_event.max(number + 1);
        Ok(())
    }

    fn clear(&mut self, capacity: usize) {
        self.particles.clear();
        self.particles.reserve(capacity);
        self.file_map.clear();
        self.n_primary = 0;
        self.hgwmk = None;
        self.current = None;
        self.current_primary = None;
        self.open = true;
    }

    /// Load a tracks to the stack
    ///
    /// Returns the label of the new track. A track without mother
    /// becomes a primary and moves the high water mark.
    pub fn push_track(&mut self, track: NewTrack) -> Result<usize, StackError> {
        if !self.open {
            return Err(StackError::EventClosed);
        }
        let label = self.n_track();
        match track.mother {
            Some(mother) => {
                if mother >= label {
                    return Err(StackError::InvalidParent {
                        mother,
                        n_track: label,
                    });
                }
                // the store is append-only, a written mother cannot be updated
                if self.is_persisted(mother) {
                    return Err(StackError::MotherPersisted { mother });
                }
                self.particle_mut(mother)?.add_daughter(label);
            }
            None => {
                let pending = self.pending_secondaries();
                if pending > 0 {
                    warn!(
                        "Primary {} pushed after {} secondaries, they become primaries",
                        label, pending
                    );
                }
                self.hgwmk = Some(label);
                self.n_primary = label + 1;
                self.current_primary = Some(label);
            }
        }
        self.particles.push(Some(track.into_record(label)));
        Ok(label)
    }

    /// Declare all tracks pushed so far primaries
    pub fn set_high_water_mark(&mut self) {
        self.hgwmk = self.n_track().checked_sub(1);
        self.current_primary = self.hgwmk;
        self.n_primary = self.n_track();
    }

    /// Next track to be transported, without handing it out
    ///
    /// The newest secondary comes first, then primaries in descending order.
    pub fn peek_pending(&self) -> Option<&ParticleRecord> {
        let pending = |record: &&ParticleRecord| !record.flags.done;
        let secondary = self
            .particles
            .iter()
            .skip(self.first_secondary())
            .rev()
            .flatten()
            .find(pending);
        if secondary.is_some() {
            return secondary;
        }
        let cursor = self.current_primary?;
        self.particles
            .iter()
            .take(cursor + 1)
            .rev()
            .flatten()
            .find(pending)
    }

    /// Mark a track as handed out for transport
    pub fn mark_dispatched(&mut self, label: usize) -> Result<(), StackError> {
        self.particle_mut(label)?.flags.done = true;
        self.current = Some(label);
        while let Some(cursor) = self.current_primary {
            let done = self.resident(cursor).map_or(false, |record| record.flags.done);
            if !done {
                break;
            }
            self.current_primary = cursor.checked_sub(1);
        }
        Ok(())
    }

    /// Hand out the next track to be transported
    pub fn next_track(&mut self) -> Result<Option<usize>, StackError> {
        let next = self.peek_pending().map(|record| record.label);
        match next {
            Some(label) => self.mark_dispatched(label)?,
            None => self.current = None,
        }
        Ok(next)
    }

    /// The primary `label` if it still has to be transported
    pub fn primary_for_tracking(
        &mut self,
        label: usize,
    ) -> Result<Option<&ParticleRecord>, StackError> {
        let record = self.particle(label)?;
        Ok((!record.flags.done).then_some(record))
    }

    /// Flag a track and all its ancestors to be kept
    pub fn flag_track(&mut self, label: usize) -> Result<(), StackError> {
        let mut current = label;
        loop {
            let record = self.particle_mut(current)?;
            // ancestors of a kept track are kept already
            if record.flags.keep {
                return Ok(());
            }
            record.flags.keep = true;
            match record.mother {
                Some(mother) => current = mother,
                None => return Ok(()),
            }
        }
    }

    /// Flag a single track to be kept
    pub fn keep_track(&mut self, label: usize) -> Result<(), StackError> {
        self.particle_mut(label)?.flags.keep = true;
        Ok(())
    }

    /// Record in memory, without reading from the store
    pub fn resident(&self, label: usize) -> Option<&ParticleRecord> {
        self.particles.get(label).and_then(Option::as_ref)
    }

    /// Record with `label`, read from the store if necessary
    pub fn particle(&mut self, label: usize) -> Result<&ParticleRecord, StackError> {
        self.ensure_loaded(label)?;
        self.particles[label]
            .as_ref()
            .ok_or_else(|| corrupt(label, CorruptReason::NotResident))
    }

    pub fn particle_mut(&mut self, label: usize) -> Result<&mut ParticleRecord, StackError> {
        self.ensure_loaded(label)?;
        self.particles[label]
            .as_mut()
            .ok_or_else(|| corrupt(label, CorruptReason::NotResident))
    }

    /// Copy of the stored record, bypassing memory
    pub fn particle_from_store(&mut self, label: usize) -> Result<ParticleRecord, StackError> {
        let entry = self.entry(label)?;
        Ok(self.store.read_at(entry)?)
    }

    fn ensure_loaded(&mut self, label: usize) -> Result<(), StackError> {
        let n_track = self.n_track();
        match self.particles.get(label) {
            None => return Err(StackError::InvalidLabel { label, n_track }),
            Some(Some(_)) => return Ok(()),
            Some(None) => {}
        }
        let entry = self.entry(label)?;
        let mapped = self.file_map.get(label).copied().flatten();
        if self.config.check_entry_map && mapped != Some(entry) {
            let reason = match mapped {
                None => CorruptReason::NotResident,
                Some(_) => CorruptReason::EntryMismatch {
                    computed: entry,
                    mapped,
                },
            };
            return Err(corrupt(label, reason));
        }
        let record = self.store.read_at(entry)?;
        if record.label != label {
            let reason = CorruptReason::LabelMismatch {
                entry,
                found: record.label,
            };
            return Err(corrupt(label, reason));
        }
        trace!("Loaded track {} from entry {}", label, entry);
        self.particles[label] = Some(record);
        Ok(())
    }

    /// Remember where `label` was written
    pub(crate) fn record_entry(&mut self, label: usize, entry: usize) -> Result<(), StackError> {
        if self.config.check_entry_map {
            let computed = self.entry(label)?;
            if computed != entry {
                let reason = CorruptReason::EntryMismatch {
                    computed,
                    mapped: Some(entry),
                };
                return Err(corrupt(label, reason));
            }
        }
        if self.file_map.len() <= label {
            let size = self.config.grown_size(label + 1);
            self.file_map.resize(size, None);
        }
        self.file_map[label] = Some(entry);
        Ok(())
    }

    /// Whether `label` has been written to the store
    pub fn is_persisted(&self, label: usize) -> bool {
        matches!(self.file_map.get(label), Some(Some(_)))
    }

    /// Drop the in-memory copy of a persisted track
    ///
    /// Returns whether a copy was dropped.
    pub fn evict(&mut self, label: usize) -> bool {
        if !self.is_persisted(label) {
            return false;
        }
        self.particles
            .get_mut(label)
            .and_then(Option::take)
            .is_some()
    }

    /// Drop all in-memory copies of persisted tracks
    pub fn evict_persisted(&mut self) -> usize {
        (0..self.n_track()).filter(|&label| self.evict(label)).count()
    }

    /// Label of the primary the track descends from
    pub fn primary_of(&mut self, label: usize) -> Result<usize, StackError> {
        let mut current = label;
        loop {
            match self.particle(current)?.mother {
                Some(mother) if mother < current => current = mother,
                Some(mother) => {
                    return Err(StackError::InvalidParent {
                        mother,
                        n_track: current,
                    })
                }
                None => return Ok(current),
            }
        }
    }

    /// Reset the daughter range of primaries where it is not valid
    fn clean_parents(&mut self) {
        let first_secondary = self.first_secondary();
        for record in self.particles.iter_mut().take(first_secondary).flatten() {
            if !record.flags.daughters_valid {
                record.reset_daughters();
            }
        }
    }

    /// Write out the primaries and close the event
    pub fn finish_event(&mut self) -> Result<EventSummary, StackError> {
        if !self.open {
            return Err(StackError::EventClosed);
        }
        let pending = self.pending_secondaries();
        if pending > 0 {
            return Err(StackError::PendingSecondaries { count: pending });
        }
        self.clean_parents();
        let mut written = 0;
        for label in 0..self.first_secondary() {
            if self.is_persisted(label) {
                continue;
            }
            let entry = match &self.particles[label] {
                Some(record) => self.store.append(record)?,
                None => {
                    warn!("Track {} is neither in memory nor written", label);
                    continue;
                }
            };
            self.particles[label] = None;
            self.record_entry(label, entry)?;
            written += 1;
        }
        let summary = EventSummary {
            number: self.event.unwrap_or_default(),
            n_track: self.n_track(),
            n_primary: self.n_primary,
        };
        self.store.end_event(summary)?;
        self.open = false;
        debug!(
            "Finished event {}: {} tracks, {} primaries written",
            summary.number, summary.n_track, written
        );
        Ok(summary)
    }

    /// Make a finished event from the store current
    ///
    /// Records are read from the store when they are accessed. The event
    /// is closed for new tracks.
    pub fn load_event(&mut self, number: usize) -> Result<EventSummary, StackError> {
        let summary = self.store.select_event(number)?;
        if summary.n_primary > summary.n_track {
            return Err(StoreError::InconsistentSummary {
                n_track: summary.n_track,
                n_primary: summary.n_primary,
            }
            .into());
        }
        self.clear(summary.n_track);
        self.open = false;
        self.event = Some(number);
        self.particles.resize(summary.n_track, None);
        self.file_map = vec![None; summary.n_track];
        self.n_primary = summary.n_primary;
        self.hgwmk = summary.n_track.checked_sub(1);
        for entry in 0..self.store.entry_count() {
            let label = self.store.read_at(entry)?.label;
            match self.file_map.get_mut(label) {
                Some(slot) if slot.is_none() => *slot = Some(entry),
                _ => {
                    return Err(corrupt(label, CorruptReason::LabelMismatch {
                        entry,
                        found: label,
                    }))
                }
            }
        }
        debug!(
            "Loaded event {}: {} tracks, {} primaries",
            number, summary.n_track, summary.n_primary
        );
        Ok(summary)
    }

    /// View of the records currently in memory
    pub fn loaded(&self) -> LoadedStack<'_> {
        LoadedStack {
            particles: &self.particles,
        }
    }

    /// Listing of every track and its store entry, reading from the store as needed
    pub fn dump(&mut self) -> Result<String, StackError> {
        let records = (0..self.n_track())
            .map(|label| self.particle(label).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        let dump = StackDump {
            records: &records,
            file_map: &self.file_map,
        };
        Ok(dump.to_string())
    }
}

impl<S> fmt::Debug for Stack<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("n_track", &self.particles.len())
            .field("n_primary", &self.n_primary)
            .field("hgwmk", &self.hgwmk)
            .field("current", &self.current)
            .field("event", &self.event)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

struct StackDump<'a> {
    records: &'a [ParticleRecord],
    file_map: &'a [Option<usize>],
}

impl fmt::Display for StackDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in self.records {
            writeln!(f, "-> {}", record)?;
        }
        writeln!(f, "Particle file map:")?;
        for label in 0..self.records.len() {
            match self.file_map.get(label).copied().flatten() {
                Some(entry) => writeln!(f, "   {} th entry: {}", label, entry)?,
                None => writeln!(f, "   {} th entry: -", label)?,
            }
        }
        Ok(())
    }
}

/// Display adaptor listing the records in memory
#[derive(Debug, Clone, Copy)]
pub struct LoadedStack<'a> {
    particles: &'a [Option<ParticleRecord>],
}

impl fmt::Display for LoadedStack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, record) in self.particles.iter().enumerate() {
            match record {
                Some(record) => writeln!(f, "-> {}", record)?,
                None => writeln!(f, "-> {:>6} not loaded", label)?,
            }
        }
        Ok(())
    }
}
