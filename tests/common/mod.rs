//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, OnceLock};

use bmi_forecast::config::TrainingConfig;
use bmi_forecast::prediction::ModelContext;
use tempfile::NamedTempFile;

pub const N_ROWS: usize = 120;

/// Deterministic body-metric rows in the raw CSV layout
pub fn fixture_csv() -> String {
    let mut csv = String::from("Person ID A1,Gender,Height,Feet,Inches,Weight,Pounds,Age,BMI,BMI_Post\n");
    for i in 0..N_ROWS {
        let male = i % 2 == 0;
        let height = 1.50 + (i % 25) as f64 * 0.015 + if male { 0.08 } else { 0.0 };
        let weight = 45.0 + ((i * 7) % 50) as f64 + if male { 6.0 } else { 0.0 };
        let bmi = weight / (height * height);
        let bmi_post = bmi * 0.94 + if male { 0.4 } else { 0.0 } + (i % 3) as f64 * 0.1;
        let inches_total = height * 39.3701;
        csv.push_str(&format!(
            "{},{},{:.3},{},{:.1},{:.1},{:.1},{},{:.2},{:.2}\n",
            1000 + i,
            if male { "Male" } else { "Female" },
            height,
            (inches_total / 12.0).floor(),
            inches_total % 12.0,
            weight,
            weight * 2.20462,
            20 + i % 40,
            bmi,
            bmi_post,
        ));
    }
    csv
}

pub fn write_fixture() -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .unwrap();
    file.write_all(fixture_csv().as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn training_config(file: &NamedTempFile) -> TrainingConfig {
    TrainingConfig::default().with_dataset_path(file.path())
}

/// One trained context shared by every test in a binary
pub fn shared_context() -> Arc<ModelContext> {
    static CONTEXT: OnceLock<Arc<ModelContext>> = OnceLock::new();
    CONTEXT
        .get_or_init(|| {
            let file = write_fixture();
            let context = ModelContext::train(&training_config(&file)).unwrap();
            Arc::new(context)
        })
        .clone()
}
