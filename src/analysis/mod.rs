//! Descriptive analysis of the raw dataset
//!
//! Works on the CSV as it is on disk, before any column is dropped or
//! rescaled. Every section is a [`Table`] of preformatted cells that the
//! server renders as HTML and the CLI prints as text.

use crate::dataset::{read_csv, TARGET_COLUMN};
use crate::error::Result;
use polars::prelude::cov::pearson_corr;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Rows shown in the preview
pub const PREVIEW_ROWS: usize = 10;

pub const GROUP_COLUMN: &str = "Gender";
pub const GROUP_UNAVAILABLE: &str = "Gender-based analysis is not available.";
pub const FREQUENCY_UNAVAILABLE: &str = "Frequency distribution for BMI_Post is not available.";

/// A rectangular table of display strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Cell under `header` in the row whose first cell is `label`
    pub fn cell(&self, label: &str, header: &str) -> Option<&str> {
        let col = self.headers.iter().position(|h| h == header)?;
        self.rows
            .iter()
            .find(|r| r.first().map(String::as_str) == Some(label))
            .and_then(|r| r.get(col))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetAnalysis {
    pub n_rows: usize,
    pub n_columns: usize,
    pub preview: Table,
    pub description: Table,
    pub missing_values: Table,
    pub correlation: Table,
    pub insights: String,
    /// `BMI_Post` aggregated per gender; `None` when either column is absent
    pub group_analysis: Option<Table>,
    /// `BMI_Post` counts over its quartile bins
    pub frequency: Option<Table>,
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn as_f64(column: &Column) -> Result<Float64Chunked> {
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.clone())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "NaN".to_string(), fmt2)
}

fn fmt2(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        format!("{:.2}", value)
    }
}

fn display_cells(column: &Column) -> Result<Vec<String>> {
    if is_numeric(column.dtype()) {
        return Ok(as_f64(column)?
            .into_iter()
            .map(|v| v.map_or_else(|| "NaN".to_string(), |x| x.to_string()))
            .collect());
    }
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map_or_else(|| "NaN".to_string(), str::to_string))
        .collect())
}

impl DatasetAnalysis {
    pub fn from_path(path: &Path) -> Result<Self> {
        let df = read_csv(path)?;
        let analysis = Self::from_frame(&df)?;
        info!(
            path = %path.display(),
            rows = analysis.n_rows,
            columns = analysis.n_columns,
            "Analyzed dataset"
        );
        Ok(analysis)
    }

    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let n_rows = df.height();
        let n_columns = df.width();

        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        let numeric: Vec<(String, Float64Chunked)> = df
            .get_columns()
            .iter()
            .filter(|c| is_numeric(c.dtype()))
            .map(|c| -> Result<(String, Float64Chunked)> { Ok((c.name().to_string(), as_f64(c)?)) })
            .collect::<Result<_>>()?;

        Ok(Self {
            n_rows,
            n_columns,
            preview: preview(df, &names)?,
            description: describe(&numeric)?,
            missing_values: missing_values(df),
            correlation: correlation(&numeric),
            insights: format!(
                "The dataset contains {} records and {} features. Review the tables below for detailed analysis.",
                n_rows, n_columns
            ),
            group_analysis: group_analysis(df)?,
            frequency: frequency(df)?,
        })
    }

    pub fn group_analysis_text(&self) -> Option<&'static str> {
        self.group_analysis.is_none().then_some(GROUP_UNAVAILABLE)
    }

    pub fn frequency_text(&self) -> Option<&'static str> {
        self.frequency.is_none().then_some(FREQUENCY_UNAVAILABLE)
    }
}

fn preview(df: &DataFrame, names: &[String]) -> Result<Table> {
    let head = df.head(Some(PREVIEW_ROWS));
    let columns: Vec<Vec<String>> = head
        .get_columns()
        .iter()
        .map(display_cells)
        .collect::<Result<_>>()?;

    let mut table = Table::new(names.to_vec());
    for row in 0..head.height() {
        table.push_row(columns.iter().map(|c| c[row].clone()).collect());
    }
    Ok(table)
}

fn describe(numeric: &[(String, Float64Chunked)]) -> Result<Table> {
    let mut headers = vec![String::new()];
    headers.extend(numeric.iter().map(|(name, _)| name.clone()));
    let mut table = Table::new(headers);

    for label in DESCRIBE_ROWS {
        let mut row = vec![label.to_string()];
        for (_, ca) in numeric {
            row.push(fmt_opt(describe_stat(label, ca)?));
        }
        table.push_row(row);
    }
    Ok(table)
}

const DESCRIBE_ROWS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

fn describe_stat(label: &str, ca: &Float64Chunked) -> Result<Option<f64>> {
    Ok(match label {
        "count" => Some((ca.len() - ca.null_count()) as f64),
        "mean" => ca.mean(),
        "std" => ca.std(1),
        "min" => ca.min(),
        "25%" => ca.quantile(0.25, QuantileMethod::Linear)?,
        "50%" => ca.median(),
        "75%" => ca.quantile(0.75, QuantileMethod::Linear)?,
        _ => ca.max(),
    })
}

fn missing_values(df: &DataFrame) -> Table {
    let mut table = Table::new(vec![String::new(), "Missing Values".to_string()]);
    for column in df.get_columns() {
        table.push_row(vec![column.name().to_string(), column.null_count().to_string()]);
    }
    table
}

/// Pearson correlation over rows where both columns are present
fn correlation(numeric: &[(String, Float64Chunked)]) -> Table {
    let mut headers = vec![String::new()];
    headers.extend(numeric.iter().map(|(name, _)| name.clone()));
    let mut table = Table::new(headers);

    for (name_a, a) in numeric {
        let mut row = vec![name_a.clone()];
        for (_, b) in numeric {
            row.push(fmt_opt(pearson_corr(a, b)));
        }
        table.push_row(row);
    }
    table
}

fn group_analysis(df: &DataFrame) -> Result<Option<Table>> {
    let (Ok(gender), Ok(target)) = (df.column(GROUP_COLUMN), df.column(TARGET_COLUMN)) else {
        return Ok(None);
    };
    if !is_numeric(target.dtype()) {
        return Ok(None);
    }

    let frame = DataFrame::new(vec![gender.clone(), target.clone()])?;
    let target_f64 = || col(TARGET_COLUMN).cast(DataType::Float64);
    let grouped = frame
        .lazy()
        .filter(col(GROUP_COLUMN).is_not_null())
        .group_by([col(GROUP_COLUMN)])
        .agg([
            target_f64().mean().alias("mean"),
            target_f64().median().alias("median"),
            target_f64().std(1).alias("std"),
        ])
        .sort([GROUP_COLUMN], SortMultipleOptions::default())
        .collect()?;

    let keys = grouped
        .column(GROUP_COLUMN)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let keys = keys.str()?;
    let stat = |name: &str| -> Result<Float64Chunked> { as_f64(grouped.column(name)?) };
    let (means, medians, stds) = (stat("mean")?, stat("median")?, stat("std")?);

    let mut table = Table::new(vec![
        GROUP_COLUMN.to_string(),
        "mean".to_string(),
        "median".to_string(),
        "std".to_string(),
    ]);
    for i in 0..grouped.height() {
        table.push_row(vec![
            keys.get(i).unwrap_or_default().to_string(),
            fmt_opt(means.get(i)),
            fmt_opt(medians.get(i)),
            fmt_opt(stds.get(i)),
        ]);
    }
    Ok(Some(table))
}

/// Counts over `[min, Q1, Q2, Q3, max]`; the first bin is closed on the left.
/// Repeated edges collapse into one.
fn frequency(df: &DataFrame) -> Result<Option<Table>> {
    let Ok(target) = df.column(TARGET_COLUMN) else {
        return Ok(None);
    };
    if !is_numeric(target.dtype()) {
        return Ok(None);
    }
    let ca = as_f64(target)?;
    let (Some(min), Some(max)) = (ca.min(), ca.max()) else {
        return Ok(None);
    };

    let mut edges = vec![min];
    for q in [0.25, 0.5, 0.75] {
        if let Some(edge) = ca.quantile(q, QuantileMethod::Linear)? {
            edges.push(edge);
        }
    }
    edges.push(max);
    edges.dedup();

    let values: Vec<f64> = ca.into_iter().flatten().collect();

    let mut table = Table::new(vec![TARGET_COLUMN.to_string(), "Frequency".to_string()]);
    if edges.len() == 1 {
        table.push_row(vec![
            format!("[{}, {}]", fmt_edge(edges[0]), fmt_edge(edges[0])),
            values.len().to_string(),
        ]);
        return Ok(Some(table));
    }

    for i in 1..edges.len() {
        let (lo, hi) = (edges[i - 1], edges[i]);
        let (label, count) = if i == 1 {
            (
                format!("[{}, {}]", fmt_edge(lo), fmt_edge(hi)),
                values.iter().filter(|&&v| v >= lo && v <= hi).count(),
            )
        } else {
            (
                format!("({}, {}]", fmt_edge(lo), fmt_edge(hi)),
                values.iter().filter(|&&v| v > lo && v <= hi).count(),
            )
        };
        table.push_row(vec![label, count.to_string()]);
    }
    Ok(Some(table))
}

fn fmt_edge(value: f64) -> String {
    format!("{:.3}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df! {
            "Person ID A1" => [1i64, 2, 3, 4, 5],
            "Gender" => ["Male", "Female", "Male", "Female", "Male"],
            "Height" => [Some(1.80f64), Some(1.60), None, Some(1.55), Some(1.70)],
            "Weight" => [80.0f64, 55.0, 90.0, 50.0, 70.0],
            "BMI_Post" => [24.0f64, 21.0, 28.0, 20.0, 23.0],
        }
        .unwrap()
    }

    #[test]
    fn test_shape_and_insights() {
        let analysis = DatasetAnalysis::from_frame(&frame()).unwrap();
        assert_eq!(analysis.n_rows, 5);
        assert_eq!(analysis.n_columns, 5);
        assert_eq!(
            analysis.insights,
            "The dataset contains 5 records and 5 features. Review the tables below for detailed analysis."
        );
        assert_eq!(analysis.preview.rows.len(), 5);
        assert_eq!(analysis.preview.rows[2][2], "NaN");
    }

    #[test]
    fn test_describe_and_missing() {
        let analysis = DatasetAnalysis::from_frame(&frame()).unwrap();
        assert_eq!(analysis.description.cell("count", "Height"), Some("4.00"));
        assert_eq!(analysis.description.cell("mean", "BMI_Post"), Some("23.20"));
        assert_eq!(analysis.description.cell("50%", "Weight"), Some("70.00"));
        assert_eq!(analysis.description.cell("max", "BMI_Post"), Some("28.00"));
        assert!(analysis.description.headers.iter().all(|h| h != "Gender"));
        assert_eq!(analysis.missing_values.cell("Height", "Missing Values"), Some("1"));
        assert_eq!(analysis.missing_values.cell("Weight", "Missing Values"), Some("0"));
    }

    #[test]
    fn test_correlation_diagonal() {
        let analysis = DatasetAnalysis::from_frame(&frame()).unwrap();
        assert_eq!(analysis.correlation.cell("Weight", "Weight"), Some("1.00"));
        assert_eq!(analysis.correlation.cell("Height", "Height"), Some("1.00"));
    }

    #[test]
    fn test_gender_groups_sorted() {
        let analysis = DatasetAnalysis::from_frame(&frame()).unwrap();
        let groups = analysis.group_analysis.unwrap();
        assert_eq!(groups.rows[0][0], "Female");
        assert_eq!(groups.cell("Female", "mean"), Some("20.50"));
        assert_eq!(groups.cell("Male", "median"), Some("24.00"));
    }

    #[test]
    fn test_describe_std_and_quartiles() {
        let analysis = DatasetAnalysis::from_frame(&frame()).unwrap();
        // BMI_Post: 20, 21, 23, 24, 28
        assert_eq!(analysis.description.cell("25%", "BMI_Post"), Some("21.00"));
        assert_eq!(analysis.description.cell("75%", "BMI_Post"), Some("24.00"));
        assert_eq!(analysis.description.cell("std", "BMI_Post"), Some("3.11"));
    }

    #[test]
    fn test_correlation_skips_missing_rows() {
        let df = df! {
            "a" => [Some(1.0f64), Some(2.0), None, Some(4.0)],
            "b" => [2.0f64, 4.0, 100.0, 8.0],
            "c" => [4.0f64, 3.0, 2.0, 1.0],
        }
        .unwrap();
        let analysis = DatasetAnalysis::from_frame(&df).unwrap();
        assert_eq!(analysis.correlation.cell("a", "b"), Some("1.00"));
        assert_eq!(analysis.correlation.cell("b", "a"), Some("1.00"));
        assert_eq!(analysis.correlation.cell("c", "b").map(|v| v.starts_with('-')), Some(true));
    }

    #[test]
    fn test_numeric_gender_groups() {
        let df = df! {
            "Gender" => [1i64, 0, 1, 0, 1],
            "BMI_Post" => [24.0f64, 21.0, 28.0, 20.0, 23.0],
        }
        .unwrap();
        let groups = DatasetAnalysis::from_frame(&df).unwrap().group_analysis.unwrap();
        assert_eq!(groups.rows.len(), 2);
        assert_eq!(groups.rows[0][0], "0");
        assert_eq!(groups.cell("0", "mean"), Some("20.50"));
        assert_eq!(groups.cell("1", "median"), Some("24.00"));
        assert_eq!(groups.cell("1", "std"), Some("2.65"));
    }

    #[test]
    fn test_frequency_bins_cover_all_rows() {
        let analysis = DatasetAnalysis::from_frame(&frame()).unwrap();
        let freq = analysis.frequency.unwrap();
        assert_eq!(freq.rows.len(), 4);
        assert!(freq.rows[0][0].starts_with('['));
        assert!(freq.rows[1][0].starts_with('('));
        let total: usize = freq.rows.iter().map(|r| r[1].parse::<usize>().unwrap()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn test_unavailable_sections() {
        let df = df! { "Weight" => [80.0f64, 55.0] }.unwrap();
        let analysis = DatasetAnalysis::from_frame(&df).unwrap();
        assert!(analysis.group_analysis.is_none());
        assert_eq!(analysis.group_analysis_text(), Some(GROUP_UNAVAILABLE));
        assert_eq!(analysis.frequency_text(), Some(FREQUENCY_UNAVAILABLE));
    }
}
