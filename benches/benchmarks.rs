use std::io::Cursor;

use criterion::{criterion_group, criterion_main, Criterion};
use kinestack::{MemoryStore, NewTrack, Notifier, ParticleStore, RunContext, Stack, TextStore};

const N_PRIMARY: usize = 100;
const N_DAUGHTER: usize = 20;

// every primary radiates a fixed number of photons, one in five is kept
fn fill_event<S: ParticleStore>(stack: &mut Stack<S>, event: usize) {
    stack.begin_event(event).unwrap();
    for i in 0..N_PRIMARY {
        let pz = 1. + i as f64;
        stack
            .push_track(NewTrack::new(211, [0.1, 0., pz, pz], [0.; 3]))
            .unwrap();
    }
    while let Some(track) = stack.next_track().unwrap() {
        for d in 0..N_DAUGHTER {
            let daughter = NewTrack::new(22, [0., 0.1, 0.5, 0.51], [0.; 3])
                .with_mother(track)
                .with_transport(false);
            let label = stack.push_track(daughter).unwrap();
            if d % 5 == 0 {
                stack.flag_track(label).unwrap();
            }
        }
        stack.purify(&mut Notifier::new()).unwrap();
    }
    stack.finish_event().unwrap();
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("memory", |b| {
        b.iter(|| {
            let mut stack = Stack::new(MemoryStore::new());
            fill_event(&mut stack, 0);
            assert_eq!(stack.n_track(), N_PRIMARY * (1 + N_DAUGHTER / 5));
        })
    });

    let mut text = Vec::new();
    {
        let store = TextStore::create(Cursor::new(&mut text), RunContext::new(0)).unwrap();
        let mut stack = Stack::new(store);
        fill_event(&mut stack, 0);
        stack.store_mut().finish().unwrap();
    }
    c.bench_function("write", |b| {
        b.iter(|| {
            let store = TextStore::create(Cursor::new(Vec::new()), RunContext::new(0)).unwrap();
            let mut stack = Stack::new(store);
            fill_event(&mut stack, 0);
        })
    });

    c.bench_function("read", |b| {
        b.iter(|| {
            let store = TextStore::open(Cursor::new(text.as_slice().to_vec())).unwrap();
            let mut stack = Stack::new(store);
            let summary = stack.load_event(0).unwrap();
            for label in 0..summary.n_track {
                stack.particle(label).unwrap();
            }
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
