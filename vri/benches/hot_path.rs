use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use vri::coverage::CoverageMap;
use vri::toggle::Counting;

fn benchmark_coverage(c: &mut Criterion) {
    let mut group = c.benchmark_group("coverage");

    group.bench_function("record_transition", |b| {
        let map = CoverageMap::new();
        let mut location = 0u64;
        b.iter(|| {
            location = location.wrapping_add(0x9e37_79b9);
            map.record_transition(black_box(location))
        })
    });

    group.bench_function("compress", |b| {
        b.iter_batched(
            CoverageMap::new,
            |map| map.compress().len(),
            BatchSize::LargeInput,
        )
    });

    group.finish()
}

fn benchmark_toggles(c: &mut Criterion) {
    let mut group = c.benchmark_group("toggles");

    group.bench_function("Counting<u8>::set", |b| {
        let mut register = Counting::new(0u8);
        let mut next = 0u8;
        b.iter(|| {
            next = next.wrapping_add(37);
            register.set(black_box(next))
        })
    });

    group.bench_function("Counting<u64>::set", |b| {
        let mut register = Counting::new(0u64);
        let mut next = 0u64;
        b.iter(|| {
            next = next.wrapping_add(0x9e37_79b9_7f4a_7c15);
            register.set(black_box(next))
        })
    });

    group.finish()
}

criterion_group!(benches, benchmark_coverage, benchmark_toggles);
criterion_main!(benches);
