//! Persistence backends for spilled particle records
use crate::data::{EventSummary, ParticleRecord};
use crate::error::StoreError;

/// Durable, append-only record store with per-event entry numbering
///
/// Entries are numbered from zero within each event and are never reused.
pub trait ParticleStore {
    /// Start a new event, making it the current one
    fn begin_event(&mut self, number: usize) -> Result<(), StoreError>;

    /// Append a record to the current event and return its entry index
    fn append(&mut self, record: &ParticleRecord) -> Result<usize, StoreError>;

    /// Read the record at `entry` of the current event
    fn read_at(&mut self, entry: usize) -> Result<ParticleRecord, StoreError>;

    /// Number of entries in the current event
    fn entry_count(&self) -> usize;

    /// Close the current event
    fn end_event(&mut self, summary: EventSummary) -> Result<(), StoreError>;

    /// Make a previously closed event the current one for reading
    fn select_event(&mut self, number: usize) -> Result<EventSummary, StoreError>;
}

#[derive(Debug, Clone, Default)]
struct MemoryEvent {
    number: usize,
    records: Vec<ParticleRecord>,
    summary: Option<EventSummary>,
}

/// Store keeping all entries in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    events: Vec<MemoryEvent>,
    current: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events seen so far, open or closed
    pub fn n_events(&self) -> usize {
        self.events.len()
    }

    /// All records of the current event in entry order
    pub fn records(&self) -> &[ParticleRecord] {
        self.current
            .map(|idx| self.events[idx].records.as_slice())
            .unwrap_or_default()
    }
}

impl ParticleStore for MemoryStore {
    fn begin_event(&mut self, number: usize) -> Result<(), StoreError> {
        if let Some(open) = self.events.last().filter(|ev| ev.summary.is_none()) {
            return Err(StoreError::EventOpen(open.number));
        }
        self.events.push(MemoryEvent {
            number,
            ..Default::default()
        });
        self.current = Some(self.events.len() - 1);
        Ok(())
    }

    fn append(&mut self, record: &ParticleRecord) -> Result<usize, StoreError> {
        let event = self
            .current
            .map(|idx| &mut self.events[idx])
            .filter(|ev| ev.summary.is_none())
            .ok_or(StoreError::NoEvent)?;
        event.records.push(record.clone());
        Ok(event.records.len() - 1)
    }

    fn read_at(&mut self, entry: usize) -> Result<ParticleRecord, StoreError> {
        let records = self.records();
        records.get(entry).cloned().ok_or(StoreError::NotFound {
            entry,
            count: records.len(),
        })
    }

    fn entry_count(&self) -> usize {
        self.records().len()
    }

    fn end_event(&mut self, summary: EventSummary) -> Result<(), StoreError> {
        let event = self
            .current
            .map(|idx| &mut self.events[idx])
            .filter(|ev| ev.summary.is_none())
            .ok_or(StoreError::NoEvent)?;
        event.summary = Some(summary);
        Ok(())
    }

    fn select_event(&mut self, number: usize) -> Result<EventSummary, StoreError> {
        let (idx, summary) = self
            .events
            .iter()
            .enumerate()
            .find_map(|(idx, ev)| {
                ev.summary.filter(|_| ev.number == number).map(|s| (idx, s))
            })
            .ok_or(StoreError::NoSuchEvent(number))?;
        self.current = Some(idx);
        Ok(summary)
    }
}
