use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use gs_core::{ModelOracle, ObservableRange, TestKind};
use gs_inference::{BinnedTestConfig, FittableModel, GoodnessOfFit, SamplingEngine, ToyConfig};
use gs_unbinned::tutorial_model;
use std::hint::black_box;

fn range() -> ObservableRange {
    ObservableRange::new(0.0, 10.0).unwrap()
}

fn bench_tests(c: &mut Criterion) {
    let model = FittableModel::new(tutorial_model().unwrap());
    let mut group = c.benchmark_group("gof_tests");

    for n_events in [1_000usize, 10_000] {
        let data = model.generate(n_events, 1).unwrap();
        let gof = GoodnessOfFit::new(&data, &model, range()).unwrap();
        for kind in TestKind::ALL {
            group.bench_with_input(BenchmarkId::new(kind.name(), n_events), &kind, |b, &kind| {
                b.iter(|| black_box(gof.test(black_box(kind)).unwrap()))
            });
        }
    }

    group.finish();
}

fn bench_refit(c: &mut Criterion) {
    let model = FittableModel::new(tutorial_model().unwrap());
    let data = model.generate(1000, 2).unwrap();

    c.bench_function("tutorial_refit_1000", |b| {
        b.iter(|| {
            let mut m = model.clone();
            black_box(m.refit(black_box(&data)).unwrap())
        })
    });
}

fn bench_sampling(c: &mut Criterion) {
    let model = FittableModel::new(tutorial_model().unwrap());
    let mut group = c.benchmark_group("sampling_distribution");
    group.sample_size(10);

    for threads in [1usize, 4] {
        let engine = SamplingEngine::new(
            range(),
            BinnedTestConfig::default(),
            ToyConfig { n_toys: 100, n_events: 1000, threads, seed: 3 },
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::new("ad_100_toys", threads), &engine, |b, engine| {
            b.iter(|| black_box(engine.build(&model, TestKind::AndersonDarling).unwrap().len()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tests, bench_refit, bench_sampling);
criterion_main!(benches);
