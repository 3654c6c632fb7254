use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use luckysix::lottery::{DrawEngine, PayoutCalculator};
use luckysix::Seed;

fn draw_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("draw_derivation");
    for (pool_max, draw_length) in [(10u32, 10usize), (48, 35), (1_000, 100)] {
        let engine = DrawEngine::new(1, pool_max, draw_length).expect("valid geometry");
        group.bench_function(BenchmarkId::new("derive", pool_max), |b| {
            let mut n = 0u64;
            b.iter(|| {
                n = n.wrapping_add(1);
                black_box(engine.derive(&Seed::from_u64(n)))
            })
        });
    }
    group.finish();
}

fn ticket_scoring(c: &mut Criterion) {
    let engine = DrawEngine::new(1, 48, 35).expect("valid geometry");
    let drawn = engine.derive(&Seed::from_u64(7));
    let calculator = PayoutCalculator::default();
    let tickets: Vec<Vec<u32>> = (0..1_000u32)
        .map(|i| (0..6).map(|k| 1 + (i * 7 + k * 8) % 48).collect())
        .collect();

    c.bench_function("score_1000_tickets", |b| {
        b.iter(|| {
            tickets
                .iter()
                .map(|t| calculator.evaluate(t, 10, &drawn).amount)
                .sum::<u64>()
        })
    });
}

criterion_group!(benches, draw_derivation, ticket_scoring);
criterion_main!(benches);
