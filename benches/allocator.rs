//! Allocator benchmarks
//!
//! Measures arena bump allocation against the C heap fallback, in-place
//! growth of a trailing block, and the cost of a reset.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gc_arena::{Config, Runtime};

const BATCH: usize = 1024;

fn bench_alloc(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc");

    for size in [8usize, 64, 512].iter() {
        group.bench_with_input(BenchmarkId::new("arena", size), size, |b, &size| {
            let mut rt = Runtime::new(Config::default());
            let arena = rt.allocate(0, BATCH * (size + 16)).unwrap();
            b.iter(|| {
                rt.eval(arena, |rt| {
                    for _ in 0..BATCH {
                        black_box(rt.malloc(black_box(size)));
                    }
                })
                .unwrap();
                rt.reset(arena).unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("fallback", size), size, |b, &size| {
            let mut rt = Runtime::new(Config::default());
            let mut blocks = Vec::with_capacity(BATCH);
            b.iter(|| {
                for _ in 0..BATCH {
                    blocks.push(black_box(rt.malloc(black_box(size))));
                }
                for block in blocks.drain(..) {
                    unsafe { rt.free(block) };
                }
            });
        });
    }

    group.finish();
}

fn bench_realloc(c: &mut Criterion) {
    let mut group = c.benchmark_group("realloc");

    group.bench_function("grow_in_place", |b| {
        let mut rt = Runtime::new(Config::default());
        let arena = rt.allocate(0, 64 * 1024).unwrap();
        b.iter(|| {
            rt.eval(arena, |rt| {
                let mut ptr = rt.malloc(8);
                for size in (16..4096).step_by(64) {
                    ptr = unsafe { rt.realloc(ptr, black_box(size)) };
                }
                black_box(ptr)
            })
            .unwrap();
            rt.reset(arena).unwrap();
        });
    });

    group.bench_function("grow_by_copy", |b| {
        let mut rt = Runtime::new(Config::default());
        let arena = rt.allocate(0, 64 * 1024).unwrap();
        b.iter(|| {
            rt.eval(arena, |rt| {
                let mut ptr = rt.malloc(8);
                for size in (16..4096).step_by(64) {
                    // An interleaved block keeps `ptr` from being the trailing one.
                    rt.malloc(8);
                    ptr = unsafe { rt.realloc(ptr, black_box(size)) };
                }
                black_box(ptr)
            })
            .unwrap();
            rt.reset(arena).unwrap();
        });
    });

    group.finish();
}

fn bench_reset(c: &mut Criterion) {
    let mut group = c.benchmark_group("reset");

    for objects in [0usize, 256, 4096].iter() {
        group.bench_with_input(BenchmarkId::new("objects", objects), objects, |b, &objects| {
            let mut rt = Runtime::new(Config::default());
            let arena = rt.allocate(objects, 4096).unwrap();
            b.iter(|| {
                rt.eval(arena, |rt| {
                    for _ in 0..objects {
                        black_box(rt.new_object().unwrap());
                    }
                    black_box(rt.malloc(8192));
                })
                .unwrap();
                rt.reset(arena).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_alloc, bench_realloc, bench_reset);
criterion_main!(benches);
