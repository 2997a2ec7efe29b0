//! File-backed particle store in a line-oriented text format
//!
//! ```text
//! <kinestack version="1.0">
//! <header run="7" folder="Event"></header>
//! <event number="0">
//! 1 211 1 4 0 -1 -1 4 0.1 0.2 3.0 3.01 0.0 0.0 0.0 0.0 0.0 0.0 0.0 1.0
//! 0 411 2 0 -1 1 1 4 0.1 0.2 10.0 10.2 0.0 0.0 0.0 0.0 0.0 0.0 0.0 1.0
//! <summary ntrack="2" nprimary="1"/>
//! </event>
//! </kinestack>
//! ```
//!
//! Each record line holds label, PDG code, status, mechanism, mother,
//! first and last daughter (`-1` if unset), flag bits, four-momentum,
//! vertex, time of flight, polarisation and weight.
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};

use log::{debug, trace};

use crate::data::{EventSummary, ParticleRecord, RunContext};
use crate::error::StoreError;
use crate::reader::*;
use crate::store::ParticleStore;
use crate::tags::*;
use crate::writer::Block;

#[derive(Debug, Clone)]
struct EventIndex {
    number: usize,
    offsets: Vec<u64>,
    summary: Option<EventSummary>,
}

/// Particle store writing to and reading from a seekable stream
///
/// # Example
///
/// ```rust
/// use std::io::Cursor;
/// use kinestack::{NewTrack, ParticleStore, RunContext, TextStore};
///
/// let mut store = TextStore::create(Cursor::new(Vec::new()), RunContext::new(1)).unwrap();
/// store.begin_event(0).unwrap();
/// let record = NewTrack::new(22, [0., 0., 1., 1.], [0.; 3]).into_record(0);
/// let entry = store.append(&record).unwrap();
/// assert_eq!(store.read_at(entry).unwrap(), record);
/// ```
#[derive(Debug)]
pub struct TextStore<F> {
    stream: F,
    version: &'static str,
    context: RunContext,
    events: Vec<EventIndex>,
    current: Option<usize>,
    end: u64,
    finished: bool,
}

impl<F: Read + Write + Seek> TextStore<F> {
    /// Start a new store at the beginning of `stream`
    pub fn create(stream: F, context: RunContext) -> Result<Self, StoreError> {
        let mut block = Block::new();
        block.first_line();
        block.header(&context)?;
        let mut store = Self {
            stream,
            version: VERSION,
            context,
            events: Vec::new(),
            current: None,
            end: 0,
            finished: false,
        };
        store.write_block(&block)?;
        Ok(store)
    }

    /// Index an existing store
    ///
    /// Appending is possible if the stream was not finished.
    pub fn open(mut stream: F) -> Result<Self, StoreError> {
        stream.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&mut stream);
        let mut offset = 0;
        let mut line = String::new();
        let mut next_line = |line: &mut String| -> Result<(u64, usize), StoreError> {
            line.clear();
            let start = offset;
            let len = reader.read_line(line)?;
            offset += len as u64;
            Ok((start, len))
        };

        next_line(&mut line)?;
        let version = parse_version(&line)?;

        next_line(&mut line)?;
        if !line.trim_start().starts_with(HEADER_START) {
            return Err(StoreError::BadLine(line));
        }
        let first = line.clone();
        let mut header = line.clone();
        while !is_header_end(&first, &line) {
            if next_line(&mut line)?.1 == 0 {
                return Err(StoreError::EndOfFile("header"));
            }
            header.push_str(&line);
        }
        let context = parse_header(&header)?;

        let mut events: Vec<EventIndex> = Vec::new();
        let mut finished = false;
        loop {
            let (start, len) = next_line(&mut line)?;
            if len == 0 {
                break;
            }
            let open = events.last_mut().filter(|ev| ev.summary.is_none());
            let trimmed = line.trim();
            if trimmed.starts_with(EVENT_START) {
                if open.is_some() {
                    return Err(StoreError::EndOfFile("event"));
                }
                events.push(EventIndex {
                    number: parse_event_start(trimmed)?,
                    offsets: Vec::new(),
                    summary: None,
                });
            } else if trimmed == STORE_LAST_LINE {
                if open.is_some() {
                    return Err(StoreError::EndOfFile("event"));
                }
                finished = true;
                break;
            } else if let Some(event) = open {
                if trimmed.starts_with(SUMMARY_START) {
                    event.summary = Some(parse_summary(trimmed, event.number)?);
                } else if trimmed.is_empty() || trimmed.starts_with('<') {
                    return Err(StoreError::BadLine(line));
                } else {
                    event.offsets.push(start);
                }
            } else if trimmed != EVENT_END {
                return Err(StoreError::BadLine(line));
            }
        }
        let end = offset;
        drop(reader);

        let current = events
            .iter()
            .rposition(|ev| ev.summary.is_none())
            .filter(|_| !finished);
        debug!(
            "Indexed {} events in kinematics store, {} bytes",
            events.len(),
            end
        );
        Ok(Self {
            stream,
            version,
            context,
            events,
            current,
            end,
            finished,
        })
    }

    pub fn version(&self) -> &str {
        self.version
    }

    /// Run information from the header
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Numbers of all events, open or closed, in file order
    pub fn event_numbers(&self) -> impl Iterator<Item = usize> + '_ {
        self.events.iter().map(|ev| ev.number)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Write the closing line; afterwards the store is read-only
    pub fn finish(&mut self) -> Result<(), StoreError> {
        self.check_writable()?;
        if let Some(open) = self.open_event() {
            return Err(StoreError::EventOpen(self.events[open].number));
        }
        let mut block = Block::new();
        block.last_line();
        self.write_block(&block)?;
        self.stream.flush()?;
        self.finished = true;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.stream.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> F {
        self.stream
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.finished {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn open_event(&self) -> Option<usize> {
        self.current
            .filter(|&idx| self.events[idx].summary.is_none())
    }

    fn write_block(&mut self, block: &Block) -> Result<u64, StoreError> {
        let start = self.end;
        self.stream.seek(SeekFrom::Start(start))?;
        self.stream.write_all(block.as_bytes())?;
        self.end += block.as_bytes().len() as u64;
        Ok(start)
    }
}

impl<F: Read + Write + Seek> ParticleStore for TextStore<F> {
    fn begin_event(&mut self, number: usize) -> Result<(), StoreError> {
        self.check_writable()?;
        if let Some(open) = self.events.last().filter(|ev| ev.summary.is_none()) {
            return Err(StoreError::EventOpen(open.number));
        }
        let mut block = Block::new();
        block.event_start(number);
        self.write_block(&block)?;
        self.events.push(EventIndex {
            number,
            offsets: Vec::new(),
            summary: None,
        });
        self.current = Some(self.events.len() - 1);
        Ok(())
    }

    fn append(&mut self, record: &ParticleRecord) -> Result<usize, StoreError> {
        self.check_writable()?;
        let idx = self.open_event().ok_or(StoreError::NoEvent)?;
        let mut block = Block::new();
        block.record(record);
        let offset = self.write_block(&block)?;
        let offsets = &mut self.events[idx].offsets;
        offsets.push(offset);
        Ok(offsets.len() - 1)
    }

    fn read_at(&mut self, entry: usize) -> Result<ParticleRecord, StoreError> {
        let idx = self.current.ok_or(StoreError::NoEvent)?;
        let offsets = &self.events[idx].offsets;
        let offset = *offsets.get(entry).ok_or(StoreError::NotFound {
            entry,
            count: offsets.len(),
        })?;
        trace!("Reading entry {} at byte {}", entry, offset);
        self.stream.seek(SeekFrom::Start(offset))?;
        let mut line = String::new();
        BufReader::new(&mut self.stream).read_line(&mut line)?;
        parse_record(&line)
    }

    fn entry_count(&self) -> usize {
        self.current
            .map_or(0, |idx| self.events[idx].offsets.len())
    }

    fn end_event(&mut self, summary: EventSummary) -> Result<(), StoreError> {
        self.check_writable()?;
        let idx = self.open_event().ok_or(StoreError::NoEvent)?;
        let summary = EventSummary {
            number: self.events[idx].number,
            ..summary
        };
        let mut block = Block::new();
        block.event_end(&summary);
        self.write_block(&block)?;
        self.events[idx].summary = Some(summary);
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
