//! Particle stack for detector simulation
//!
//! A [Stack] holds the particles of one event as a tree of mothers and
//! daughters. Tracks are pushed as they are generated or produced in
//! transport, handed out for transport with [Stack::next_track] and
//! flagged to be kept with [Stack::flag_track]. [Stack::purify] throws
//! away everything else, renumbers the survivors and spills them to a
//! [ParticleStore]. Everybody holding raw labels is told about the new
//! numbering through a [Notifier].
//!
//! # Example
//!
//! ```rust
//! use std::io::Cursor;
//! use kinestack::{NewTrack, Notifier, RunContext, Stack, TextStore, TrackReferences};
//!
//! let store = TextStore::create(Cursor::new(Vec::new()), RunContext::new(1)).unwrap();
//! let mut stack = Stack::new(store);
//! stack.begin_event(0).unwrap();
//! let photon = stack.push_track(NewTrack::new(22, [0., 0., 1., 1.], [0.; 3])).unwrap();
//! while let Some(track) = stack.next_track().unwrap() {
//!     if track == photon {
//!         let e = NewTrack::new(11, [0., 0., 0.5, 0.5], [0., 0., 10.]).with_mother(photon);
//!         stack.push_track(e.clone()).unwrap();
//!         stack.push_track(e.with_transport(false)).unwrap();
//!     }
//! }
//! let mut refs = TrackReferences::new();
//! refs.insert(2, "calorimeter");
//! stack.flag_track(2).unwrap();
//! stack.purify(Notifier::new().register(&mut refs)).unwrap();
//! assert_eq!(refs.iter().next(), Some(&(1, "calorimeter")));
//! stack.finish_event().unwrap();
//! ```
pub mod config;
pub mod data;
pub mod error;
pub mod pdg;
pub mod purify;
mod reader;
pub mod remap;
pub mod stack;
pub mod status;
pub mod store;
mod tags;
pub mod text_store;
mod writer;

pub use config::StackConfig;
pub use data::*;
pub use error::{CorruptReason, StackError, StoreError};
pub use pdg::ParticleDatabase;
pub use purify::{HeavyFlavour, KeepPolicy, NoPhysicsKeep};
pub use remap::{Notifier, RemapObserver, RemapTable, TrackHit, TrackHits, TrackReferences};
pub use stack::{secondary_entry, tree_entry, LoadedStack, Stack};
pub use store::{MemoryStore, ParticleStore};
pub use text_store::TextStore;

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{read::GzDecoder, write::GzEncoder, Compression};
    use std::io::{Cursor, Read, Write};

    // one B+ decaying and one pion showering, compacted after each primary
    fn simulate<S: ParticleStore>(stack: &mut Stack<S>, event: usize) -> Vec<ParticleRecord> {
        stack.begin_event(event).unwrap();
        stack
            .push_track(NewTrack::new(521, [0.5, 0., 20., 20.7], [0.; 3]))
            .unwrap();
        let pi = stack
            .push_track(NewTrack::new(-211, [0., 0.3, 4., 4.01], [0.; 3]))
            .unwrap();
        let mut hits = TrackReferences::new();
        while let Some(track) = stack.next_track().unwrap() {
            hits.insert(track, event);
            let record = stack.particle(track).unwrap();
            let (pdg, pz) = (record.pdg, record.momentum[2]);
            let children = match pdg {
                521 => vec![(-421, 10.), (211, 10.)],
                -211 if track == pi => vec![(22, 1.), (22, 2.), (111, 1.)],
                _ => vec![],
            };
            for (pdg, pz) in children {
                let child = NewTrack::new(pdg, [0., 0., pz, pz], [0., 0., 0.01])
                    .with_mother(track)
                    .with_mechanism(status::Mechanism::DECAY);
                stack.push_track(child).unwrap();
            }
            if pdg == 22 && pz > 1.5 {
                stack.flag_track(track).unwrap();
            }
            let primary_done = stack.peek_pending().map_or(true, |next| next.is_primary());
            if primary_done {
                stack.purify(Notifier::new().register(&mut hits)).unwrap();
            }
        }
        assert_eq!(hits.len(), 5);
        let summary = stack.finish_event().unwrap();
        assert_eq!((summary.n_track, summary.n_primary), (5, 2));
        (0..stack.n_track())
            .map(|label| stack.particle(label).unwrap().clone())
            .collect()
    }

    #[test]
    fn test_write_reload() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut output = Vec::new();
        let mut events = Vec::new();
        {
            let store = TextStore::create(Cursor::new(&mut output), RunContext::new(3)).unwrap();
            let mut stack = Stack::new(store);
            for event in 0..3 {
                events.push(simulate(&mut stack, event));
            }
            stack.store_mut().finish().unwrap();
        }
        let first = &events[0];
        let pdgs: Vec<_> = first.iter().map(|p| p.pdg).collect();
        assert_eq!(pdgs, [521, -211, 22, -421, 211]);
        assert!(first.iter().all(|p| p.flags.done));
        assert_eq!(first[2].mother, Some(1));
        assert_eq!(first[2].momentum[2], 2.);
        assert_eq!(first[0].daughters(), Some(3..=4));
        assert_eq!(first[1].daughters(), Some(2..=2));

        let mut compressed = GzEncoder::new(Vec::new(), Compression::default());
        compressed.write_all(&output).unwrap();
        let compressed = compressed.finish().unwrap();
        let mut text = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut text)
            .unwrap();
        assert_eq!(text, output);

        let store = TextStore::open(Cursor::new(text)).unwrap();
        assert_eq!(store.context().run, 3);
        let mut stack = Stack::new(store);
        for (number, event) in events.iter().enumerate().rev() {
            let summary = stack.load_event(number).unwrap();
            assert_eq!((summary.n_track, summary.n_primary), (5, 2));
            for record in event {
                assert_eq!(stack.particle(record.label).unwrap(), record);
            }
        }
        assert!(matches!(
            stack.begin_event(3),
            Err(StackError::Store(StoreError::ReadOnly))
        ));
    }

    #[test]
    fn closed_store_rejects_events() {
        let store = TextStore::create(Cursor::new(Vec::new()), RunContext::default()).unwrap();
        let mut stack = Stack::new(store);
        stack.begin_event(0).unwrap();
        assert!(matches!(
            stack.store_mut().finish(),
            Err(StoreError::EventOpen(0))
        ));
        stack.finish_event().unwrap();
        stack.store_mut().finish().unwrap();
        assert!(matches!(
            stack.begin_event(1),
            Err(StackError::Store(StoreError::ReadOnly))
        ));
    }
}
