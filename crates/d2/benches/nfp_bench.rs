//! Benchmarks for 2D nesting operations.
//!
//! Measures cold and cached NFP computation and bottom-left fill at a few
//! part counts.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kerfnest_core::{Budget, StrategyKind};
use kerfnest_d2::{Constraints, NestingSession, NfpCache, NfpEngine, Part, RotationSet, Sheet};

fn shapes() -> Vec<(&'static str, Part, Part)> {
    vec![
        (
            "rect_rect",
            Part::rectangle("a", 60.0, 40.0).unwrap(),
            Part::rectangle("b", 30.0, 20.0).unwrap(),
        ),
        (
            "l_rect",
            Part::l_shape("a", 80.0, 60.0, 30.0, 25.0).unwrap(),
            Part::rectangle("b", 30.0, 20.0).unwrap(),
        ),
        (
            "l_l",
            Part::l_shape("a", 80.0, 60.0, 30.0, 25.0).unwrap(),
            Part::l_shape("b", 50.0, 40.0, 20.0, 15.0).unwrap(),
        ),
        (
            "circle_l",
            Part::circle("a", 30.0, 48).unwrap(),
            Part::l_shape("b", 50.0, 40.0, 20.0, 15.0).unwrap(),
        ),
    ]
}

fn bench_nfp_cold(c: &mut Criterion) {
    let mut group = c.benchmark_group("nfp_cold");
    let engine = NfpEngine::new(Arc::new(NfpCache::new())).with_spacing(3.3);

    for (name, a, b) in shapes() {
        group.bench_with_input(BenchmarkId::new("exact", name), &(a, b), |bench, (a, b)| {
            bench.iter(|| {
                black_box(engine.compute_uncached(
                    black_box(a.polygon()),
                    black_box(b.polygon()),
                    0.0,
                    90.0,
                ))
            })
        });
    }
    group.finish();
}

fn bench_nfp_cached(c: &mut Criterion) {
    let mut group = c.benchmark_group("nfp_cached");
    let engine = NfpEngine::new(Arc::new(NfpCache::new())).with_spacing(3.3);

    for (name, a, b) in shapes() {
        engine.compute(a.polygon(), b.polygon(), 0.0, 90.0);
        group.bench_with_input(BenchmarkId::new("hit", name), &(a, b), |bench, (a, b)| {
            bench.iter(|| black_box(engine.compute(black_box(a.polygon()), black_box(b.polygon()), 0.0, 90.0)))
        });
    }
    group.finish();
}

fn bench_blf(c: &mut Criterion) {
    let mut group = c.benchmark_group("blf");
    group.sample_size(10);

    for &n in &[5, 10, 20] {
        let parts: Vec<Part> = (0..n)
            .map(|i| {
                let w = 20.0 + (i as f64 * 3.0) % 30.0;
                let h = 15.0 + (i as f64 * 7.0) % 25.0;
                if i % 3 == 0 {
                    Part::l_shape(format!("L{}", i), w + 20.0, h + 20.0, w / 2.0, h / 2.0).unwrap()
                } else {
                    Part::rectangle(format!("R{}", i), w, h).unwrap()
                }
            })
            .collect();
        let constraints = Constraints::new(Sheet::small_test()).with_rotations(RotationSet::cardinal());
        let session = NestingSession::new(parts, constraints).unwrap();

        group.bench_with_input(BenchmarkId::new("mixed", n), &session, |bench, session| {
            bench.iter(|| {
                let solution = session.nest(StrategyKind::BottomLeftFill, Budget::unlimited());
                black_box(solution)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_nfp_cold, bench_nfp_cached, bench_blf);
criterion_main!(benches);
