//! Criterion micro-benchmarks for arena allocation, relocation and persistence.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use strata_arena::{Arena, ArenaConfig};
use strata_bench::{populate, populated_arena};
use strata_core::{TypeCatalog, TypeId};

/// Benchmark: 1K raw allocations from a tiny arena, growth included.
fn bench_allocate_1k(c: &mut Criterion) {
    c.bench_function("allocate_1k", |b| {
        b.iter(|| {
            let mut arena = Arena::new(ArenaConfig::new().with_capacities(16, 4, 4, 1)).unwrap();
            for _ in 0..1000 {
                black_box(arena.allocate(24, TypeId(1), &[8]).unwrap());
            }
            black_box(arena.relocations());
        });
    });
}

/// Benchmark: build 1K typed fixture objects.
fn bench_create_objects_1k(c: &mut Criterion) {
    c.bench_function("create_objects_1k", |b| {
        b.iter(|| {
            let mut arena = Arena::new(ArenaConfig::default()).unwrap();
            black_box(populate(&mut arena, 1000));
        });
    });
}

/// Benchmark: relocate an arena holding 10K objects.
fn bench_relocate_10k(c: &mut Criterion) {
    c.bench_function("relocate_10k", |b| {
        b.iter_batched(
            || populated_arena(10_000),
            |mut arena| {
                let need = arena.free_slots() + 1;
                arena.reserve(need, 0, 0).unwrap();
                black_box(arena.base());
                arena
            },
            BatchSize::LargeInput,
        );
    });
}

/// Benchmark: write and read back an in-memory image of 10K objects.
fn bench_image_round_trip_10k(c: &mut Criterion) {
    let arena = populated_arena(10_000);
    let mut image = Vec::with_capacity(arena.size() as usize);
    c.bench_function("image_round_trip_10k", |b| {
        b.iter(|| {
            image.clear();
            arena.write_image(&mut image).unwrap();
            let loaded = Arena::read_image(
                image.as_slice(),
                ArenaConfig::default(),
                TypeCatalog::standard(),
            )
            .unwrap();
            black_box(loaded.base());
        });
    });
}

criterion_group!(
    benches,
    bench_allocate_1k,
    bench_create_objects_1k,
    bench_relocate_10k,
    bench_image_round_trip_10k
);
criterion_main!(benches);
