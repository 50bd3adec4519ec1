//! CSV loading and feature extraction

use super::{
    Dataset, DROPPED_COLUMNS, FEATURE_COLUMNS, GENDER_IDX, HEIGHT_IDX, TARGET_COLUMN, WEIGHT_IDX,
};
use crate::error::{BmiError, Result};
use crate::prediction::Gender;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Read a CSV with a header row into a DataFrame
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path).map_err(|e| {
        BmiError::DataError(format!("cannot open {}: {}", path.display(), e))
    })?;

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| BmiError::DataError(e.to_string()))
}

/// Turns the raw body-metric table into a [`Dataset`]
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    height_scale: f64,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl DatasetLoader {
    pub fn new(height_scale: f64) -> Self {
        Self { height_scale }
    }

    pub fn height_scale(&self) -> f64 {
        self.height_scale
    }

    /// Load and preprocess the CSV at `path`
    pub fn load(&self, path: &Path) -> Result<Dataset> {
        let df = read_csv(path)?;
        info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            "Loaded dataset"
        );
        self.from_frame(&df)
    }

    /// Preprocess an already loaded frame
    pub fn from_frame(&self, df: &DataFrame) -> Result<Dataset> {
        let mut df = df.clone();
        for name in DROPPED_COLUMNS {
            if df.column(name).is_ok() {
                df = df.drop(name)?;
            }
        }

        let n = df.height();
        if n == 0 {
            return Err(BmiError::DataError("dataset has no rows".to_string()));
        }

        let gender = gender_column(&df)?;
        let height = numeric_column(&df, FEATURE_COLUMNS[HEIGHT_IDX])?.mapv(|h| h * self.height_scale);
        let weight = numeric_column(&df, FEATURE_COLUMNS[WEIGHT_IDX])?;
        let target = numeric_column(&df, TARGET_COLUMN)?;

        let mut features = Array2::zeros((n, FEATURE_COLUMNS.len()));
        features.column_mut(GENDER_IDX).assign(&gender);
        features.column_mut(HEIGHT_IDX).assign(&height);
        features.column_mut(WEIGHT_IDX).assign(&weight);

        debug!(rows = n, height_scale = self.height_scale, "Extracted feature matrix");
        Dataset::new(features, target)
    }
}

/// Extract a column as f64, failing on nulls and unparsable cells
fn numeric_column(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    let column = df
        .column(name)
        .map_err(|_| BmiError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    let values = series.f64()?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.filter(|x| x.is_finite()).ok_or_else(|| {
                BmiError::DataError(format!(
                    "column '{}' has a missing or non-numeric value at row {}",
                    name, row
                ))
            })
        })
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from_vec)
}

/// `Gender` is either already encoded (0/1) or textual
fn gender_column(df: &DataFrame) -> Result<Array1<f64>> {
    let name = FEATURE_COLUMNS[GENDER_IDX];
    let column = df
        .column(name)
        .map_err(|_| BmiError::FeatureNotFound(name.to_string()))?;

    if !matches!(column.dtype(), DataType::String) {
        return numeric_column(df, name);
    }

    let series = column.as_materialized_series();
    series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(|label| Gender::from_label(label).as_feature())
                .ok_or_else(|| {
                    BmiError::DataError(format!("column '{}' is missing a value at row {}", name, row))
                })
        })
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from_vec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df! {
            "Person ID A1" => [1i64, 2, 3, 4],
            "Gender" => [1i64, 0, 1, 0],
            "Height" => [1.80f64, 1.60, 1.75, 1.55],
            "Feet" => [5i64, 5, 5, 5],
            "Inches" => [11i64, 3, 9, 1],
            "Weight" => [80.0f64, 55.0, 90.0, 50.0],
            "Pounds" => [176.0f64, 121.0, 198.0, 110.0],
            "Age" => [30i64, 40, 35, 28],
            "BMI" => [24.7f64, 21.5, 29.4, 20.8],
            "BMI_Post" => [24.0f64, 21.0, 28.0, 20.5],
        }
        .unwrap()
    }

    #[test]
    fn test_from_frame_selects_and_scales() {
        let dataset = DatasetLoader::default().from_frame(&sample_frame()).unwrap();
        assert_eq!(dataset.features.dim(), (4, 3));
        assert!((dataset.features[[0, 1]] - 180.0).abs() < 1e-9);
        assert_eq!(dataset.features[[1, 0]], 0.0);
        assert_eq!(dataset.features[[2, 2]], 90.0);
        assert_eq!(dataset.target[3], 20.5);
    }

    #[test]
    fn test_textual_gender() {
        let df = df! {
            "Gender" => ["Male", "female", "MALE"],
            "Height" => [1.8f64, 1.6, 1.7],
            "Weight" => [80.0f64, 60.0, 70.0],
            "BMI_Post" => [24.0f64, 23.0, 24.5],
        }
        .unwrap();
        let dataset = DatasetLoader::default().from_frame(&df).unwrap();
        assert_eq!(dataset.features.column(0).to_vec(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_missing_target_column() {
        let df = df! {
            "Gender" => [1i64],
            "Height" => [1.8f64],
            "Weight" => [80.0f64],
        }
        .unwrap();
        let err = DatasetLoader::default().from_frame(&df).unwrap_err();
        assert!(matches!(err, BmiError::FeatureNotFound(ref c) if c == "BMI_Post"));
    }

    #[test]
    fn test_non_numeric_cell() {
        let df = df! {
            "Gender" => [1i64, 0],
            "Height" => ["1.8", "tall"],
            "Weight" => [80.0f64, 60.0],
            "BMI_Post" => [24.0f64, 23.0],
        }
        .unwrap();
        let err = DatasetLoader::default().from_frame(&df).unwrap_err();
        assert!(matches!(err, BmiError::DataError(_)));
    }

    #[test]
    fn test_missing_file() {
        let result = DatasetLoader::default().load(Path::new("/nonexistent/bmi.csv"));
        assert!(result.is_err());
    }
}
