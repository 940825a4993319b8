//! Dtype-based column selection.

use super::Transformer;
use crate::error::Result;
use crate::utils::{is_categorical_dtype, is_numeric_dtype};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Semantic type a column is selected by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Any integer or float dtype
    Numeric,
    /// String or polars categorical dtype
    Categorical,
}

impl ColumnKind {
    /// Whether a column of `dtype` belongs to this kind.
    pub fn matches(&self, dtype: &DataType) -> bool {
        match self {
            ColumnKind::Numeric => is_numeric_dtype(dtype),
            ColumnKind::Categorical => is_categorical_dtype(dtype),
        }
    }

    /// Kind of a dtype, if it belongs to either branch.
    pub fn of(dtype: &DataType) -> Option<ColumnKind> {
        if is_numeric_dtype(dtype) {
            Some(ColumnKind::Numeric)
        } else if is_categorical_dtype(dtype) {
            Some(ColumnKind::Categorical)
        } else {
            None
        }
    }
}

/// Selects the columns of a frame whose dtype matches a [`ColumnKind`].
///
/// Stateless: `fit` does nothing. Column order and values are preserved; a
/// frame without matching columns yields an empty frame instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSelector {
    kind: ColumnKind,
}

impl ColumnSelector {
    pub fn new(kind: ColumnKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Names of the matching columns, in frame order.
    pub fn selected_columns(&self, df: &DataFrame) -> Vec<PlSmallStr> {
        df.get_columns()
            .iter()
            .filter(|col| self.kind.matches(col.dtype()))
            .map(|col| col.name().clone())
            .collect()
    }
}

impl Transformer for ColumnSelector {
    fn name(&self) -> &'static str {
        "ColumnSelector"
    }

    fn fit(&mut self, _df: &DataFrame) -> Result<&mut Self> {
        Ok(self)
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        Ok(df.select(self.selected_columns(df))?)
    }

    fn is_fitted(&self) -> bool {
        true
    }
}
