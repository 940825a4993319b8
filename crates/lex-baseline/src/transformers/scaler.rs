//! Standard scaling with statistics learned at fit time.

use super::Transformer;
use crate::error::{PipelineError, Result};
use crate::utils::{f64_values, is_numeric_dtype};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Mean and population standard deviation of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub column: String,
    pub mean: f64,
    pub std: f64,
}

impl ColumnScale {
    /// Divisor applied in transform; constant columns are only centered.
    pub fn scale(&self) -> f64 {
        if self.std > 0.0 { self.std } else { 1.0 }
    }
}

/// Scales every numeric column to zero mean and unit variance.
///
/// Statistics come from the fit frame only and are reused unchanged for
/// every later transform. Nulls are skipped when fitting and stay null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    stats: Option<Vec<ColumnScale>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learned per-column statistics, in fit column order.
    pub fn stats(&self) -> Option<&[ColumnScale]> {
        self.stats.as_deref()
    }

    fn column_scale(series: &Series) -> Result<ColumnScale> {
        let name = series.name().to_string();
        let values: Vec<f64> = f64_values(series)?.into_iter().flatten().collect();
        if values.is_empty() {
            return Err(PipelineError::NoValidValues(name));
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Ok(ColumnScale {
            column: name,
            mean,
            std: variance.sqrt(),
        })
    }
}

impl Transformer for StandardScaler {
    fn name(&self) -> &'static str {
        "StandardScaler"
    }

    fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let mut stats = Vec::with_capacity(df.width());
        for col in df.get_columns() {
            if !is_numeric_dtype(col.dtype()) {
                return Err(PipelineError::InvalidData(format!(
                    "StandardScaler requires numeric columns, '{}' is {}",
                    col.name(),
                    col.dtype()
                )));
            }
            let scale = Self::column_scale(col.as_materialized_series())?;
            debug!(
                "Scaler '{}': mean={:.4}, std={:.4}",
                scale.column, scale.mean, scale.std
            );
            stats.push(scale);
        }

        self.stats = Some(stats);
        Ok(self)
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let stats = self
            .stats
            .as_ref()
            .ok_or(PipelineError::NotFitted(self.name()))?;

        if let Some(extra) = df
            .get_column_names()
            .into_iter()
            .find(|name| !stats.iter().any(|s| s.column == name.as_str()))
        {
            return Err(PipelineError::schema_mismatch(
                self.name(),
                format!("column '{}' was not seen during fit", extra),
            ));
        }

        let mut columns: Vec<Column> = Vec::with_capacity(stats.len());
        for scale in stats {
            let col = df.column(&scale.column).map_err(|_| {
                PipelineError::schema_mismatch(
                    self.name(),
                    format!("missing fitted column '{}'", scale.column),
                )
            })?;
            let divisor = scale.scale();
            let scaled: Vec<Option<f64>> = f64_values(col.as_materialized_series())?
                .into_iter()
                .map(|v| v.map(|x| (x - scale.mean) / divisor))
                .collect();
            columns.push(Series::new(scale.column.as_str().into(), scaled).into());
        }

        Ok(DataFrame::new(columns)?)
    }

    fn is_fitted(&self) -> bool {
        self.stats.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        f64_values(df.column(name).unwrap().as_materialized_series()).unwrap()
    }

    #[test]
    fn test_fit_learns_population_statistics() {
        let df = df!["x" => [10i64, 20, 30]].unwrap();
        let mut scaler = StandardScaler::new();
        scaler.fit(&df).unwrap();

        let stats = scaler.stats().unwrap();
        assert_eq!(stats[0].mean, 20.0);
        assert_abs_diff_eq!(stats[0].std, 8.16496580927726, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_mean_is_zero() {
        let train = df!["x" => [10i64, 20, 30]].unwrap();
        let mut scaler = StandardScaler::new();
        scaler.fit(&train).unwrap();

        let out = scaler.transform(&df!["x" => [20i64]].unwrap()).unwrap();
        assert_eq!(values(&out, "x"), vec![Some(0.0)]);
    }

    #[test]
    fn test_transform_uses_fit_time_statistics() {
        let train = df!["x" => [10.0, 20.0, 30.0]].unwrap();
        let mut scaler = StandardScaler::new();
        scaler.fit(&train).unwrap();

        // A validation frame with a very different distribution
        let validation = df!["x" => [100.0, 110.0]].unwrap();
        let out = scaler.transform(&validation).unwrap();
        let std = 8.16496580927726;
        let got = values(&out, "x");
        assert_abs_diff_eq!(got[0].unwrap(), 80.0 / std, epsilon = 1e-9);
        assert_abs_diff_eq!(got[1].unwrap(), 90.0 / std, epsilon = 1e-9);
    }

    #[test]
    fn test_constant_column_is_only_centered() {
        let df = df!["x" => [5.0, 5.0, 5.0]].unwrap();
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(&df).unwrap();
        assert_eq!(values(&out, "x"), vec![Some(0.0); 3]);
    }

    #[test]
    fn test_nulls_are_skipped_and_kept() {
        let df = df!["x" => [Some(1.0), None, Some(3.0)]].unwrap();
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(&df).unwrap();

        assert_eq!(scaler.stats().unwrap()[0].mean, 2.0);
        assert_eq!(values(&out, "x"), vec![Some(-1.0), None, Some(1.0)]);
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df!["x" => [1.0]].unwrap();
        let err = StandardScaler::new().transform(&df).unwrap_err();
        assert!(err.is_not_fitted());
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&df!["x" => [1.0, 2.0], "y" => [3.0, 4.0]].unwrap()).unwrap();

        let err = scaler.transform(&df!["x" => [1.0]].unwrap()).unwrap_err();
        assert!(err.is_schema_mismatch());

        let err = scaler
            .transform(&df!["x" => [1.0], "y" => [1.0], "z" => [1.0]].unwrap())
            .unwrap_err();
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn test_refit_replaces_state() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&df!["x" => [1.0, 3.0]].unwrap()).unwrap();
        scaler.fit(&df!["x" => [10.0, 30.0]].unwrap()).unwrap();
        assert_eq!(scaler.stats().unwrap()[0].mean, 20.0);
    }
}
