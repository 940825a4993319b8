//! One-hot encoding against a vocabulary learned at fit time.

use super::Transformer;
use crate::error::{PipelineError, Result};
use crate::utils::{find_name_collision, is_categorical_dtype, string_values, value_counts_desc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Known categories of one column, most frequent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnVocabulary {
    pub column: String,
    pub categories: Vec<String>,
}

impl ColumnVocabulary {
    /// Categories that get an indicator column.
    pub fn encoded_categories(&self, drop_first: bool) -> &[String] {
        let skip = usize::from(drop_first).min(self.categories.len());
        &self.categories[skip..]
    }

    /// Indicator column names, `<column>_<category>`.
    pub fn indicator_names(&self, drop_first: bool) -> Vec<String> {
        self.encoded_categories(drop_first)
            .iter()
            .map(|category| format!("{}_{}", self.column, category))
            .collect()
    }
}

/// One-hot encodes the categorical columns of a frame.
///
/// The output schema depends only on the fit-time vocabulary: transform
/// never adds indicator columns. Values outside the vocabulary, and nulls,
/// produce an all-zero indicator row for their column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    drop_first: bool,
    vocabulary: Option<Vec<ColumnVocabulary>>,
}

impl CategoricalEncoder {
    /// Create an encoder; `drop_first` omits the most frequent category of
    /// each column to avoid linearly dependent indicators.
    pub fn new(drop_first: bool) -> Self {
        Self {
            drop_first,
            vocabulary: None,
        }
    }

    pub fn drop_first(&self) -> bool {
        self.drop_first
    }

    pub fn vocabulary(&self) -> Option<&[ColumnVocabulary]> {
        self.vocabulary.as_deref()
    }

    /// Names of the columns `transform` produces, in output order.
    pub fn feature_names(&self) -> Result<Vec<String>> {
        let vocabulary = self
            .vocabulary
            .as_ref()
            .ok_or(PipelineError::NotFitted(self.name()))?;
        Ok(vocabulary
            .iter()
            .flat_map(|vocab| vocab.indicator_names(self.drop_first))
            .collect())
    }

    fn encode_column(&self, vocab: &ColumnVocabulary, series: &Series) -> Result<Vec<Column>> {
        let categories = vocab.encoded_categories(self.drop_first);
        let positions: HashMap<&str, usize> = categories
            .iter()
            .enumerate()
            .map(|(pos, category)| (category.as_str(), pos))
            .collect();

        let mut indicators = vec![vec![0.0f64; series.len()]; categories.len()];
        for (row, value) in string_values(series)?.iter().enumerate() {
            if let Some(&pos) = value.as_deref().and_then(|v| positions.get(v)) {
                indicators[pos][row] = 1.0;
            }
        }

        Ok(vocab
            .indicator_names(self.drop_first)
            .into_iter()
            .zip(indicators)
            .map(|(name, values)| Series::new(name.into(), values).into())
            .collect())
    }
}

impl Transformer for CategoricalEncoder {
    fn name(&self) -> &'static str {
        "CategoricalEncoder"
    }

    fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let mut vocabulary = Vec::new();
        for col in df.get_columns() {
            if !is_categorical_dtype(col.dtype()) {
                continue;
            }
            let categories: Vec<String> = value_counts_desc(col.as_materialized_series())?
                .into_iter()
                .map(|(category, _)| category)
                .collect();
            debug!(
                "Encoder vocabulary for '{}': {} categories",
                col.name(),
                categories.len()
            );
            vocabulary.push(ColumnVocabulary {
                column: col.name().to_string(),
                categories,
            });
        }

        let outputs: Vec<(String, &str)> = vocabulary
            .iter()
            .flat_map(|vocab| {
                vocab
                    .indicator_names(self.drop_first)
                    .into_iter()
                    .map(|name| (name, vocab.column.as_str()))
            })
            .collect();
        if let Some((name, first, second)) =
            find_name_collision(outputs.iter().map(|(name, source)| (name.as_str(), *source)))
        {
            return Err(PipelineError::InvalidData(format!(
                "indicator column '{}' is produced by both '{}' and '{}'",
                name, first, second
            )));
        }

        self.vocabulary = Some(vocabulary);
        Ok(self)
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let vocabulary = self
            .vocabulary
            .as_ref()
            .ok_or(PipelineError::NotFitted(self.name()))?;

        if let Some(unseen) = df.get_columns().iter().find(|col| {
            is_categorical_dtype(col.dtype())
                && !vocabulary.iter().any(|v| v.column == col.name().as_str())
        }) {
            return Err(PipelineError::schema_mismatch(
                self.name(),
                format!("categorical column '{}' was not seen during fit", unseen.name()),
            ));
        }

        let mut columns = Vec::new();
        for vocab in vocabulary {
            let col = df
                .column(&vocab.column)
                .ok()
                .filter(|col| is_categorical_dtype(col.dtype()))
                .ok_or_else(|| {
                    PipelineError::schema_mismatch(
                        self.name(),
                        format!("missing fitted categorical column '{}'", vocab.column),
                    )
                })?;
            columns.extend(self.encode_column(vocab, col.as_materialized_series())?);
        }

        Ok(DataFrame::new(columns)?)
    }

    fn is_fitted(&self) -> bool {
        self.vocabulary.is_some()
    }
}
