use catseq_core::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::BTreeMap;

fn bench_deep_serial_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_serial_chain");

    for size in [100usize, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut arena = Arena::with_capacity(size);
                let ch = ChannelId::from_parts(0, 0);
                let mut root = arena.atomic(ch, 1, 0, vec![]);
                for _ in 1..size {
                    let next = arena.atomic(ch, 1, 0, vec![]);
                    root = arena.compose_sequence(&[root, next]).unwrap();
                }
                black_box(compile(&arena, root).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_wide_parallel(c: &mut Criterion) {
    let mut group = c.benchmark_group("wide_parallel");

    for size in [10u16, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut arena = Arena::with_capacity(size as usize);
                let mut nodes = Vec::with_capacity(size as usize);
                for i in 0..size {
                    let ch = ChannelId::from_parts(0, i);
                    nodes.push(arena.atomic(ch, 10 * (i as u64 + 1), 0, vec![]));
                }
                let root = arena.parallel_compose_many(&nodes).unwrap();
                black_box(compile(&arena, root).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_incremental_recompile(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_recompile");

    group.bench_function("shared_subtree_reuse", |b| {
        b.iter(|| {
            let mut arena = Arena::with_capacity(2_000);
            arena.enable_incremental();
            let ch = ChannelId::from_parts(0, 0);

            let mut shared = arena.atomic(ch, 1, 0, vec![]);
            for _ in 1..500 {
                let next = arena.atomic(ch, 1, 0, vec![]);
                shared = arena.compose_sequence(&[shared, next]).unwrap();
            }

            for i in 0..20u8 {
                let prefix = arena.atomic(ChannelId::from_parts(0, 1), 1, i, vec![i]);
                let root = arena.parallel_compose_many(&[prefix, shared]).unwrap();
                black_box(arena.compile_graph(root).unwrap());
            }
        });
    });

    group.finish();
}

fn bench_rectangularization(c: &mut Criterion) {
    let mut group = c.benchmark_group("rectangularization");

    group.bench_function("parallel_then_serial_chain", |b| {
        b.iter(|| {
            let ch0 = ChannelId::from_parts(0, 0);
            let ch1 = ChannelId::from_parts(0, 1);

            let mut a = BoundMorphism::from_channel(ch0);
            a.append(100, 0, vec![], None).unwrap();
            let mut bm = BoundMorphism::from_channel(ch1);
            bm.append(50, 0, vec![], None).unwrap();
            let mut whole = a.parallel(&bm).unwrap();

            for _ in 0..200 {
                let mut step = BoundMorphism::from_channel(ch0);
                step.append(10, 0, vec![], None).unwrap();
                whole = whole.then(&step).unwrap();
            }

            black_box(whole)
        });
    });

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");

    group.bench_function("single_channel_500_steps", |b| {
        b.iter(|| {
            let ch0 = ChannelId::from_parts(0, 0);
            let mut bound = BoundMorphism::from_channel(ch0);
            for i in 0..500u16 {
                bound.append(1, i, vec![], None).unwrap();
            }
            let machine: AcceptAll<()> = AcceptAll::new();
            let mut states = BTreeMap::new();
            states.insert(ch0, ());
            let mut arena = Arena::with_capacity(1_000);
            black_box(bound.replay(&states, &machine, &mut arena).unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_deep_serial_chain,
    bench_wide_parallel,
    bench_incremental_recompile,
    bench_rectangularization,
    bench_replay,
);
criterion_main!(benches);
