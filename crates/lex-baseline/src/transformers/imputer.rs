//! Categorical imputation with fill values learned at fit time.
//!
//! Numeric imputers work on means and medians; categorical columns need a
//! fill value that is itself a category. Fit records one fill value per
//! target column, transform replaces nulls with it.

use super::Transformer;
use crate::config::{ImputeStrategy, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::utils::{fill_string_nulls, string_mode};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Fill value recorded by [`ImputeStrategy::ZeroFill`].
pub const ZERO_FILL_VALUE: &str = "0";

/// Fills missing values of categorical columns.
///
/// With [`ImputeStrategy::MostFrequent`] each target column is filled with
/// its most frequent non-null fit-time value. When several values tie, the
/// one that appears first in the fit frame is used; callers should only
/// rely on "a most frequent value" being chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalImputer {
    columns: Option<Vec<String>>,
    strategy: ImputeStrategy,
    fill: Option<BTreeMap<String, String>>,
}

impl CategoricalImputer {
    /// Create an imputer for `columns` (`None` = every column of the fit frame).
    pub fn new(columns: Option<Vec<String>>, strategy: ImputeStrategy) -> Self {
        Self {
            columns,
            strategy,
            fill: None,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.impute_columns.clone(), config.impute_strategy)
    }

    pub fn strategy(&self) -> ImputeStrategy {
        self.strategy
    }

    /// Learned fill values keyed by column name.
    pub fn fill_values(&self) -> Option<&BTreeMap<String, String>> {
        self.fill.as_ref()
    }

    fn target_columns(&self, df: &DataFrame) -> Vec<String> {
        match &self.columns {
            Some(columns) => columns.clone(),
            None => df
                .get_column_names()
                .into_iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl Transformer for CategoricalImputer {
    fn name(&self) -> &'static str {
        "CategoricalImputer"
    }

    fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let mut fill = BTreeMap::new();

        for col_name in self.target_columns(df) {
            let column = df.column(&col_name).map_err(|_| {
                PipelineError::schema_mismatch(
                    self.name(),
                    format!("imputation column '{}' is not in the frame", col_name),
                )
            })?;

            let value = match self.strategy {
                ImputeStrategy::MostFrequent => string_mode(column.as_materialized_series())?
                    .ok_or_else(|| PipelineError::NoValidValues(col_name.clone()))?,
                ImputeStrategy::ZeroFill => ZERO_FILL_VALUE.to_string(),
            };

            debug!("Imputer fill for '{}': '{}'", col_name, value);
            fill.insert(col_name, value);
        }

        self.fill = Some(fill);
        Ok(self)
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let fill = self
            .fill
            .as_ref()
            .ok_or(PipelineError::NotFitted(self.name()))?;

        let mut out = df.clone();
        for (col_name, value) in fill {
            let column = df.column(col_name).map_err(|_| {
                PipelineError::schema_mismatch(
                    self.name(),
                    format!("missing fitted column '{}'", col_name),
                )
            })?;
            if column.null_count() == 0 {
                continue;
            }

            let filled = fill_string_nulls(column.as_materialized_series(), value)?;
            out.replace(col_name, filled)?;
        }

        Ok(out)
    }

    fn is_fitted(&self) -> bool {
        self.fill.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::string_values;
    use pretty_assertions::assert_eq;

    fn strings(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        string_values(df.column(name).unwrap().as_materialized_series()).unwrap()
    }

    fn owned(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_most_frequent_fit_and_transform() {
        let df = df!["col" => [Some("A"), Some("A"), Some("B"), None]].unwrap();
        let mut imputer = CategoricalImputer::new(None, ImputeStrategy::MostFrequent);
        imputer.fit(&df).unwrap();

        assert_eq!(imputer.fill_values().unwrap()["col"], "A");

        let out = imputer.transform(&df).unwrap();
        assert_eq!(strings(&out, "col"), owned(&["A", "A", "B", "A"]));
        // The input frame is untouched
        assert_eq!(df.column("col").unwrap().null_count(), 1);
    }

    #[test]
    fn test_zero_fill() {
        let df = df!["col" => [Some("x"), None]].unwrap();
        let mut imputer = CategoricalImputer::new(None, ImputeStrategy::ZeroFill);
        let out = imputer.fit_transform(&df).unwrap();

        assert_eq!(strings(&out, "col"), owned(&["x", "0"]));
    }

    #[test]
    fn test_tie_picks_some_most_frequent_value() {
        let df = df!["col" => [Some("A"), Some("B"), None]].unwrap();
        let mut imputer = CategoricalImputer::new(None, ImputeStrategy::MostFrequent);
        imputer.fit(&df).unwrap();

        let fill = &imputer.fill_values().unwrap()["col"];
        assert!(fill == "A" || fill == "B");
    }

    #[test]
    fn test_only_target_columns_are_filled() {
        let df = df![
            "workclass" => [Some("private"), None, Some("private")],
            "race" => [Some("white"), None, Some("black")],
        ]
        .unwrap();
        let mut imputer = CategoricalImputer::new(
            Some(vec!["workclass".to_string()]),
            ImputeStrategy::MostFrequent,
        );
        let out = imputer.fit_transform(&df).unwrap();

        assert_eq!(out.column("workclass").unwrap().null_count(), 0);
        assert_eq!(out.column("race").unwrap().null_count(), 1);
        assert_eq!(out.get_column_names(), df.get_column_names());
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df!["col" => [Some("A")]].unwrap();
        let imputer = CategoricalImputer::new(None, ImputeStrategy::MostFrequent);
        let err = imputer.transform(&df).unwrap_err();
        assert!(err.is_not_fitted());
    }

    #[test]
    fn test_missing_target_column_is_schema_mismatch() {
        let df = df!["col" => [Some("A")]].unwrap();
        let mut imputer =
            CategoricalImputer::new(Some(vec!["other".to_string()]), ImputeStrategy::ZeroFill);
        assert!(imputer.fit(&df).unwrap_err().is_schema_mismatch());
    }

    #[test]
    fn test_all_null_column_has_no_mode() {
        let df = df!["col" => [Option::<&str>::None, None]].unwrap();
        let mut imputer = CategoricalImputer::new(None, ImputeStrategy::MostFrequent);
        let err = imputer.fit(&df).unwrap_err();
        assert_eq!(err.error_code(), "NO_VALID_VALUES");
    }

    #[test]
    fn test_fit_twice_is_idempotent() {
        let df = df!["col" => [Some("A"), Some("B"), Some("B"), None]].unwrap();
        let mut once = CategoricalImputer::new(None, ImputeStrategy::MostFrequent);
        once.fit(&df).unwrap();
        let mut twice = once.clone();
        twice.fit(&df).unwrap();

        assert_eq!(once, twice);
    }
}
