use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_scalar_distributions(c: &mut Criterion) {
    let xs: Vec<f64> = (0..10_000).map(|i| (i as f64) * 0.001 - 5.0).collect();

    c.bench_function("normal_cdf_10k", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &x in &xs {
                acc += gs_prob::normal::standard_cdf(x);
            }
            black_box(acc)
        })
    });
}

fn bench_statistic_tails(c: &mut Criterion) {
    let zs: Vec<f64> = (1..10_000).map(|i| (i as f64) * 0.001).collect();

    c.bench_function("chi_square_sf_10k", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &z in &zs {
                acc += gs_prob::chi_square::sf(10.0 * z, 17).unwrap();
            }
            black_box(acc)
        })
    });

    c.bench_function("kolmogorov_sf_10k", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &z in &zs {
                acc += gs_prob::kolmogorov::sf(z);
            }
            black_box(acc)
        })
    });

    c.bench_function("anderson_darling_p_value_10k", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &z in &zs {
                acc += gs_prob::anderson_darling::p_value(z, 1000);
            }
            black_box(acc)
        })
    });
}

criterion_group!(benches, bench_scalar_distributions, bench_statistic_tails);
criterion_main!(benches);
