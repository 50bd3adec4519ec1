use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use bmi_forecast::config::TrainingConfig;
use bmi_forecast::prediction::{Gender, ModelContext, ModelSelection, PredictionRequest};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_bmi_data(n_rows: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let gender: Vec<i64> = (0..n_rows).map(|_| rng.gen_range(0..2)).collect();
    let height: Vec<f64> = gender
        .iter()
        .map(|&g| 1.50 + rng.gen::<f64>() * 0.35 + g as f64 * 0.08)
        .collect();
    let weight: Vec<f64> = height
        .iter()
        .map(|&h| 22.0 * h * h + rng.gen::<f64>() * 30.0 - 10.0)
        .collect();
    let bmi_post: Vec<f64> = height
        .iter()
        .zip(&weight)
        .map(|(h, w)| w / (h * h) * 0.95 + rng.gen::<f64>() * 0.5)
        .collect();

    df!(
        "Gender" => gender,
        "Height" => height,
        "Weight" => weight,
        "BMI_Post" => bmi_post
    )
    .unwrap()
}

fn bench_startup_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("startup_training");
    group.sample_size(10);

    let config = TrainingConfig::default().with_xgboost(false);
    for n_rows in [200, 1000].iter() {
        let df = create_bmi_data(*n_rows);
        group.bench_with_input(BenchmarkId::new("model_context", n_rows), &df, |b, df| {
            b.iter(|| ModelContext::from_frame(black_box(df), &config).unwrap())
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let df = create_bmi_data(500);
    let context = ModelContext::from_frame(&df, &TrainingConfig::default()).unwrap();
    let mut group = c.benchmark_group("prediction");

    for selection in ["Best Fit", "Random Forest", "Stacking"] {
        let request = PredictionRequest {
            gender: Gender::Male,
            height: 178.0,
            weight: 82.0,
            selection: ModelSelection::from_option(Some(selection)),
        };
        group.bench_with_input(BenchmarkId::new("predict", selection), &request, |b, req| {
            b.iter(|| context.predict(black_box(req)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_startup_training, bench_prediction);
criterion_main!(benches);
