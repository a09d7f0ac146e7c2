use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polars::prelude::*;
use ra_models::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_regression_frames(n_rows: usize, n_features: usize) -> (DataFrame, DataFrame) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let features: Vec<Vec<f64>> = (0..n_features)
        .map(|_| (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect())
        .collect();
    let target: Vec<f64> = (0..n_rows)
        .map(|i| features.iter().map(|f| f[i]).sum::<f64>() + rng.gen::<f64>() * 0.1)
        .collect();

    let columns: Vec<Column> = features
        .into_iter()
        .enumerate()
        .map(|(i, values)| Series::new(format!("feature_{}", i).into(), values).into())
        .collect();
    (
        DataFrame::new(columns).unwrap(),
        DataFrame::new(vec![Series::new("target".into(), target).into()]).unwrap(),
    )
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);

    for n_rows in [200, 1000].iter() {
        let (task, target) = create_regression_frames(*n_rows, 5);

        group.bench_with_input(BenchmarkId::new("rf_regressor", n_rows), &(task.clone(), target.clone()), |b, (task, target)| {
            b.iter(|| {
                let mut model = RFRegressor::new(task, target, 0.8, false).unwrap();
                let params = FitConfiguration::new().with("n_estimators", 20);
                model.fit(Some(&params), false, FitOptions::default()).unwrap();
                black_box(model.mean_absolute_error().unwrap())
            })
        });

        group.bench_with_input(BenchmarkId::new("encv", n_rows), &(task, target), |b, (task, target)| {
            b.iter(|| {
                let mut model = ENCVRegressor::new(task, target, 0.8, false).unwrap();
                model.fit(None, false, FitOptions::default()).unwrap();
                black_box(model.mean_squared_error().unwrap())
            })
        });
    }

    group.finish();
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    let (task, target) = create_regression_frames(300, 4);
    for n_jobs in [1i64, -1].iter() {
        group.bench_with_input(BenchmarkId::new("rf_regressor_count_2", n_jobs), n_jobs, |b, &n_jobs| {
            b.iter(|| {
                let mut model = RFRegressor::new(&task, &target, 0.8, false).unwrap();
                let config = GridSearchConfig::new().with_count(2).with_n_jobs(n_jobs);
                let overrides = GridConfiguration::new().with_values("n_estimators", vec![5, 10]);
                black_box(model.fit_grid(Some(&overrides), config).unwrap().trials.len())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_grid_search);
criterion_main!(benches);
