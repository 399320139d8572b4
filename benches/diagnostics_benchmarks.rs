use criterion::{black_box, criterion_group, criterion_main, Criterion};
use model_diagnostics::binning::{bin_feature, BinMethod};
use model_diagnostics::calibration::bias::{compute_bias, BiasConfig};
use model_diagnostics::calibration::isotonic::IsotonicRegression;
use model_diagnostics::data::{Feature, Predictions};
use model_diagnostics::functional::Functional;
use model_diagnostics::utils::fast_sum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

fn create_data(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(0);
    let feature: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..100.0)).collect();
    let y_pred: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..10.0)).collect();
    let y_obs: Vec<f64> = y_pred.iter().map(|p| p + rng.gen_range(-2.0..2.0)).collect();
    (feature, y_obs, y_pred)
}

pub fn diagnostics_benchmarks(c: &mut Criterion) {
    let n = 100_000;
    let (feature, y_obs, y_pred) = create_data(n);

    c.bench_function("fast sum", |b| b.iter(|| fast_sum(black_box(&y_obs))));

    let mut isotonic = c.benchmark_group("isotonic");
    isotonic.measurement_time(Duration::from_secs(10));
    for functional in [
        Functional::mean(),
        Functional::expectile(0.8).unwrap(),
        Functional::quantile(0.8).unwrap(),
    ] {
        let iso = IsotonicRegression::new(functional);
        isotonic.bench_function(format!("fit {}", functional), |b| {
            b.iter(|| iso.fit(black_box(&y_pred), black_box(&y_obs), None))
        });
    }
    isotonic.finish();

    let f = Feature::numeric("feature", &feature);
    c.bench_function("bin quantile", |b| {
        b.iter(|| bin_feature(black_box(&f), 10, BinMethod::Quantile))
    });
    c.bench_function("compute bias", |b| {
        b.iter(|| {
            compute_bias(
                black_box(&y_obs),
                &Predictions::single(&y_pred),
                Some(&f),
                None,
                &BiasConfig::default(),
            )
        })
    });
}

criterion_group!(benches, diagnostics_benchmarks);
criterion_main!(benches);
