//! Propagating track renumbering to external label holders
//!
//! Compacting the stack changes the labels of the surviving secondaries.
//! Everything outside the stack that stores raw labels (hit lists,
//! detector track references) registers a [RemapObserver] with a
//! [Notifier] passed to [Stack::purify](crate::Stack::purify).
use std::fmt;

use itertools::Itertools;

/// Mapping from labels before compaction to labels after compaction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemapTable {
    map: Vec<Option<usize>>,
}

impl RemapTable {
    pub fn new(map: Vec<Option<usize>>) -> Self {
        Self { map }
    }

    /// The mapping that leaves `len` labels unchanged
    pub fn identity(len: usize) -> Self {
        Self::new((0..len).map(Some).collect())
    }

    /// New label for `old`, `None` if the track was discarded
    ///
    /// Labels beyond the table were not affected by the compaction.
    pub fn get(&self, old: usize) -> Option<usize> {
        match self.map.get(old) {
            Some(&new) => new,
            None => Some(old),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Whether any label changes
    pub fn is_identity(&self) -> bool {
        self.map
            .iter()
            .enumerate()
            .all(|(old, &new)| new == Some(old))
    }

    /// `(old, new)` pairs of all surviving tracks
    pub fn kept(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.map
            .iter()
            .enumerate()
            .filter_map(|(old, new)| new.map(|new| (old, new)))
    }

    /// Old labels of all discarded tracks
    pub fn discarded(&self) -> impl Iterator<Item = usize> + '_ {
        self.map.iter().positions(Option::is_none)
    }

    pub fn as_slice(&self) -> &[Option<usize>] {
        &self.map
    }
}

impl fmt::Display for RemapTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.map.iter().enumerate().format_with(", ", |(old, new), f| match new {
            Some(new) => f(&format_args!("{}:{}", old, new)),
            None => f(&format_args!("{}:-", old)),
        });
        write!(f, "{{{}}}", entries)
    }
}

/// Holder of raw track labels that must follow a renumbering
pub trait RemapObserver {
    fn on_remap(&mut self, remap: &RemapTable);
}

impl<F: FnMut(&RemapTable)> RemapObserver for F {
    fn on_remap(&mut self, remap: &RemapTable) {
        self(remap)
    }
}

/// Registered observers for one compaction
#[derive(Default)]
pub struct Notifier<'a> {
    observers: Vec<&'a mut dyn RemapObserver>,
}

impl<'a> Notifier<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: &'a mut dyn RemapObserver) -> &mut Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn notify(&mut self, remap: &RemapTable) {
        for observer in self.observers.iter_mut() {
            observer.on_remap(remap);
        }
    }
}

impl fmt::Debug for Notifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// A hit that was produced by a track
pub trait TrackHit {
    /// Label of the producing track, `None` if that track was discarded
    fn track(&self) -> Option<usize>;
    fn set_track(&mut self, track: Option<usize>);
}

/// Hit list whose track labels are relabelled in place
///
/// Hits of discarded tracks stay in the list with their track unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackHits<H> {
    pub hits: Vec<H>,
}

impl<H: TrackHit> TrackHits<H> {
    pub fn new() -> Self {
        Self { hits: Vec::new() }
    }

    pub fn push(&mut self, hit: H) {
        self.hits.push(hit)
    }
}

impl<H: TrackHit> RemapObserver for TrackHits<H> {
    fn on_remap(&mut self, remap: &RemapTable) {
        for hit in self.hits.iter_mut() {
            let track = hit.track().and_then(|track| remap.get(track));
            hit.set_track(track);
        }
    }
}

/// Per-detector table of `(track label, payload)` references
///
/// References to discarded tracks are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackReferences<T> {
    refs: Vec<(usize, T)>,
}

impl<T> Default for TrackReferences<T> {
    fn default() -> Self {
        Self { refs: Vec::new() }
    }
}

impl<T> TrackReferences<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, track: usize, payload: T) {
        self.refs.push((track, payload))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(usize, T)> {
        self.refs.iter()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

impl<T> RemapObserver for TrackReferences<T> {
    fn on_remap(&mut self, remap: &RemapTable) {
        self.refs.retain_mut(|(track, _)| match remap.get(*track) {
            Some(new) => {
                *track = new;
                true
            }
            None => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Hit {
        track: Option<usize>,
        edep: f64,
    }

    impl TrackHit for Hit {
        fn track(&self) -> Option<usize> {
            self.track
        }

        fn set_track(&mut self, track: Option<usize>) {
            self.track = track
        }
    }

    fn remap() -> RemapTable {
        RemapTable::new(vec![Some(0), None, Some(1), None, Some(2)])
    }

    #[test]
    fn table() {
        let remap = remap();
        assert_eq!(remap.get(0), Some(0));
        assert_eq!(remap.get(1), None);
        assert_eq!(remap.get(4), Some(2));
        assert_eq!(remap.get(9), Some(9));
        assert_eq!(remap.kept().collect::<Vec<_>>(), [(0, 0), (2, 1), (4, 2)]);
        assert_eq!(remap.discarded().collect::<Vec<_>>(), [1, 3]);
        assert!(!remap.is_identity());
        assert!(RemapTable::identity(3).is_identity());
        assert_eq!(remap.to_string(), "{0:0, 1:-, 2:1, 3:-, 4:2}");
    }

    #[test]
    fn relabel_hits_and_references() {
        let mut hits = TrackHits::new();
        for track in [4, 1, 2] {
            hits.push(Hit {
                track: Some(track),
                edep: 0.1,
            });
        }
        let mut refs = TrackReferences::new();
        refs.insert(3, "TPC");
        refs.insert(4, "TRD");
        let mut calls = 0;
        let mut counter = |_: &RemapTable| calls += 1;
        {
            let mut notifier = Notifier::new();
            notifier
                .register(&mut hits)
                .register(&mut refs)
                .register(&mut counter);
            assert_eq!(notifier.len(), 3);
            notifier.notify(&remap());
        }
        assert_eq!(calls, 1);
        let tracks: Vec<_> = hits.hits.iter().map(|hit| hit.track).collect();
        assert_eq!(tracks, [Some(2), None, Some(1)]);
        assert!(hits.hits.iter().all(|hit| hit.edep == 0.1));
        assert_eq!(refs.iter().collect::<Vec<_>>(), [&(2, "TRD")]);
    }
}
