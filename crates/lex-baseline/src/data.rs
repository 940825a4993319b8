//! Loading a labelled dataset and splitting it for validation.

use crate::error::{PipelineError, Result, ResultExt};
use crate::utils::string_values;
use polars::io::csv::read::{CsvParseOptions, CsvReadOptions};
use polars::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Markers treated as missing values when cleaning string columns.
pub const DEFAULT_MISSING_MARKERS: &[&str] = &["?", ""];

/// Read a CSV file with a header row.
pub fn read_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))
        .and_then(|reader| reader.finish())
        .context(format!("failed to read CSV '{}'", path.display()))
}

/// Trim surrounding whitespace in string columns and turn missing-value
/// markers into nulls. Returns a new frame.
pub fn normalize_missing(df: &DataFrame, markers: &[&str]) -> Result<DataFrame> {
    let mut out = df.clone();
    for col in df.get_columns() {
        if col.dtype() != &DataType::String {
            continue;
        }
        let cleaned: Vec<Option<String>> = string_values(col.as_materialized_series())?
            .into_iter()
            .map(|value| {
                value
                    .map(|v| v.trim().to_string())
                    .filter(|v| !markers.contains(&v.as_str()))
            })
            .collect();
        let nulls = cleaned.iter().filter(|v| v.is_none()).count();
        if nulls > 0 {
            debug!("'{}': {} missing values after cleaning", col.name(), nulls);
        }
        out.replace(col.name().as_str(), Series::new(col.name().clone(), cleaned))?;
    }
    Ok(out)
}

/// Split the `target` column off `df`, returning features and labels.
pub fn split_target(df: &DataFrame, target: &str) -> Result<(DataFrame, Series)> {
    let labels = df
        .column(target)
        .map_err(|_| PipelineError::ColumnNotFound(target.to_string()))?
        .as_materialized_series()
        .clone();
    let features = df.drop(target)?;
    Ok((features, labels))
}

/// Training and validation partitions of a labelled dataset.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: DataFrame,
    pub train_labels: Series,
    pub test: DataFrame,
    pub test_labels: Series,
}

/// Shuffle rows with `seed` and put the first `train_size` share in the
/// training partition (rounded down). Both partitions must be non-empty.
pub fn train_test_split(
    df: &DataFrame,
    labels: &Series,
    train_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if !(train_size > 0.0 && train_size < 1.0) {
        return Err(PipelineError::InvalidConfig(format!(
            "train_size must be in (0, 1), got {}",
            train_size
        )));
    }
    if df.height() != labels.len() {
        return Err(PipelineError::InvalidData(format!(
            "{} feature rows but {} labels",
            df.height(),
            labels.len()
        )));
    }

    let n = df.height();
    let n_train = (train_size * n as f64).floor() as usize;
    if n_train == 0 || n_train == n {
        return Err(PipelineError::InvalidData(format!(
            "train_size {} leaves an empty partition for {} rows",
            train_size, n
        )));
    }

    let mut rows: Vec<IdxSize> = (0..n as IdxSize).collect();
    rows.shuffle(&mut StdRng::seed_from_u64(seed));
    let (train_rows, test_rows) = rows.split_at(n_train);

    let train_idx = IdxCa::from_vec("train".into(), train_rows.to_vec());
    let test_idx = IdxCa::from_vec("test".into(), test_rows.to_vec());

    Ok(TrainTestSplit {
        train: df.take(&train_idx)?,
        train_labels: labels.take(&train_idx)?,
        test: df.take(&test_idx)?,
        test_labels: labels.take(&test_idx)?,
    })
}
