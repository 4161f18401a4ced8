//! Benchmarks for Lamport clock operations

use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dcp_time::LamportClock;

fn bench_clock_increment(c: &mut Criterion) {
    let clock = LamportClock::new();

    c.bench_function("clock_increment", |b| b.iter(|| black_box(clock.increment())));
}

fn bench_clock_update(c: &mut Criterion) {
    let clock = LamportClock::new();

    c.bench_function("clock_update", |b| {
        let mut received = 0u64;
        b.iter(|| {
            received = received.wrapping_add(3);
            black_box(clock.update(black_box(received)))
        })
    });
}

fn bench_clock_stamp(c: &mut Criterion) {
    let clock = LamportClock::new();

    c.bench_function("clock_stamp", |b| {
        b.iter(|| clock.stamp(|ts| black_box(ts)))
    });
}

fn bench_clock_contended(c: &mut Criterion) {
    c.bench_function("clock_increment_4_threads", |b| {
        b.iter(|| {
            let clock = Arc::new(LamportClock::new());
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let clock = Arc::clone(&clock);
                    thread::spawn(move || {
                        for _ in 0..1_000 {
                            clock.increment();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            black_box(clock.get())
        })
    });
}

criterion_group!(
    benches,
    bench_clock_increment,
    bench_clock_update,
    bench_clock_stamp,
    bench_clock_contended,
);
criterion_main!(benches);
