//! Benchmarks for pipeline hand-off throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tandem::prelude::*;

const ITEMS: u64 = 10_000;

fn counting_source() -> impl FnMut(&mut u64) -> Result<bool> {
    let mut next = 0;
    move |item: &mut u64| {
        next += 1;
        *item = next;
        Ok(next <= ITEMS)
    }
}

fn bench_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_capacity");
    group.throughput(Throughput::Elements(ITEMS));

    for capacity in [1usize, 16, 128, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            b.iter(|| {
                let mut source = counting_source();
                let mut sink = |n: &u64| -> Result<bool> {
                    black_box(n);
                    Ok(true)
                };
                Pipeline::source(&mut source, 0u64)
                    .capacity(capacity)
                    .sink(&mut sink)
                    .run()
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_replicated_pipe(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_replicated_pipe");
    group.throughput(Throughput::Elements(ITEMS));

    for replicas in [1usize, 2, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(replicas), &replicas, |b, &replicas| {
            let mut work = |n: &u64, out: &mut u64| -> Result<bool> {
                *out = (0..64).fold(*n, |acc, k| acc.wrapping_mul(31).wrapping_add(k));
                Ok(true)
            };
            b.iter(|| {
                let mut source = counting_source();
                let mut sink = |n: &u64| -> Result<bool> {
                    black_box(n);
                    Ok(true)
                };
                run_queue_with_pipe(&mut source, 0u64, multi(&mut work, replicas), 0u64, &mut sink)
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_capacity, bench_replicated_pipe);
criterion_main!(benches);
