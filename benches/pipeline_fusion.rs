//! Benchmark for pipeline fusion performance
//!
//! Run with: cargo bench --bench pipeline_fusion
//!
//! Compares, per pipeline shape:
//! - fused pipeline
//! - hand-written loop
//! - std iterator chain
//!
//! Accumulators live inside each benchmark closure.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fusepipe::{lazy, Pipeline};

fn create_input(n: usize) -> Vec<i64> {
    (0..n as i64).map(|i| (i * 7919) % 10_007).collect()
}

/// transform → filter → transform → sum
fn bench_map_filter_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_filter_sum");

    for n in [1_000usize, 100_000, 1_000_000] {
        let input = create_input(n);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("fused", n), &input, |b, input| {
            let pipeline = lazy(input.as_slice())
                .transform(|x| x * 3)
                .filter(|x| x % 2 == 0)
                .transform(|x| x + 1);
            b.iter(|| black_box(pipeline.fold(0i64, |acc, x| acc + x).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("hand_loop", n), &input, |b, input| {
            b.iter(|| {
                let mut acc = 0i64;
                for &x in input.iter() {
                    let x = x * 3;
                    if x % 2 == 0 {
                        acc += x + 1;
                    }
                }
                black_box(acc)
            })
        });

        group.bench_with_input(BenchmarkId::new("iterator", n), &input, |b, input| {
            b.iter(|| {
                let acc: i64 = input
                    .iter()
                    .map(|x| x * 3)
                    .filter(|x| x % 2 == 0)
                    .map(|x| x + 1)
                    .sum();
                black_box(acc)
            })
        });
    }

    group.finish();
}

/// filter → take: early exit after k matches
fn bench_early_exit(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_take");
    let input = create_input(1_000_000);

    for k in [10usize, 1_000] {
        group.bench_with_input(BenchmarkId::new("fused", k), &k, |b, &k| {
            let pipeline = lazy(input.as_slice()).filter(|x| x % 13 == 0).take(k);
            b.iter(|| black_box(pipeline.to_vec().unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("iterator", k), &k, |b, &k| {
            b.iter(|| {
                let out: Vec<i64> = input.iter().copied().filter(|x| x % 13 == 0).take(k).collect();
                black_box(out)
            })
        });
    }

    group.finish();
}

/// Indexed jump past a leading skip vs pulling through a cursor
fn bench_skip_prefix(c: &mut Criterion) {
    let mut group = c.benchmark_group("drop_take");
    let input = create_input(1_000_000);

    group.bench_function("indexed", |b| {
        let pipeline = lazy(input.as_slice()).drop(900_000).take(100);
        b.iter(|| black_box(pipeline.count().unwrap()))
    });

    group.bench_function("cursor", |b| {
        let pipeline = Pipeline::replay(|| input.iter().copied()).drop(900_000).take(100);
        b.iter(|| black_box(pipeline.count().unwrap()))
    });

    group.finish();
}

/// flat_map → transform → count
fn bench_flat_map(c: &mut Criterion) {
    let input = create_input(100_000);

    c.bench_function("flat_map_fused", |b| {
        let pipeline = lazy(input.as_slice())
            .flat_map(|x| [x, x + 1])
            .transform(|x| x * 2);
        b.iter(|| black_box(pipeline.count().unwrap()))
    });

    c.bench_function("flat_map_iterator", |b| {
        b.iter(|| {
            let n = input.iter().flat_map(|&x| [x, x + 1]).map(|x| x * 2).count();
            black_box(n)
        })
    });
}

criterion_group!(
    benches,
    bench_map_filter_sum,
    bench_early_exit,
    bench_skip_prefix,
    bench_flat_map
);
criterion_main!(benches);
