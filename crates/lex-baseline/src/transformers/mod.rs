//! Column transformers for the preprocessing pipeline.
//!
//! Each transformer learns its state in [`Transformer::fit`] and applies it
//! in [`Transformer::transform`]:
//!
//! - [`ColumnSelector`] - stateless selection of numeric or categorical columns
//! - [`StandardScaler`] - zero mean / unit variance scaling with fit-time statistics
//! - [`CategoricalImputer`] - fills missing categorical values with fit-time fill values
//! - [`CategoricalEncoder`] - one-hot encoding against a fit-time vocabulary
//!
//! Pipelines hold transformers as [`Stage`] values, a closed set that keeps
//! a fitted pipeline serializable.

mod encoder;
mod imputer;
mod scaler;
mod selector;

pub use encoder::{CategoricalEncoder, ColumnVocabulary};
pub use imputer::CategoricalImputer;
pub use scaler::{ColumnScale, StandardScaler};
pub use selector::{ColumnKind, ColumnSelector};

use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// A fit/transform step over a DataFrame.
///
/// `transform` never mutates the learned state and never mutates its input;
/// calling it before `fit` fails with [`PipelineError::NotFitted`].
///
/// [`PipelineError::NotFitted`]: crate::PipelineError::NotFitted
pub trait Transformer {
    /// Component name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Learn state from `df`, replacing any previously learned state.
    fn fit(&mut self, df: &DataFrame) -> Result<&mut Self>;

    /// Apply the learned state to `df`, returning a new frame.
    fn transform(&self, df: &DataFrame) -> Result<DataFrame>;

    /// Whether `transform` can be called.
    fn is_fitted(&self) -> bool;

    /// Fit on `df` and transform it.
    fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }
}

/// One step of a preprocessing branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    Select(ColumnSelector),
    Scale(StandardScaler),
    Impute(CategoricalImputer),
    Encode(CategoricalEncoder),
}

impl Transformer for Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Select(t) => t.name(),
            Stage::Scale(t) => t.name(),
            Stage::Impute(t) => t.name(),
            Stage::Encode(t) => t.name(),
        }
    }

    fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        match self {
            Stage::Select(t) => {
                t.fit(df)?;
            }
            Stage::Scale(t) => {
                t.fit(df)?;
            }
            Stage::Impute(t) => {
                t.fit(df)?;
            }
            Stage::Encode(t) => {
                t.fit(df)?;
            }
        }
        Ok(self)
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        match self {
            Stage::Select(t) => t.transform(df),
            Stage::Scale(t) => t.transform(df),
            Stage::Impute(t) => t.transform(df),
            Stage::Encode(t) => t.transform(df),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            Stage::Select(t) => t.is_fitted(),
            Stage::Scale(t) => t.is_fitted(),
            Stage::Impute(t) => t.is_fitted(),
            Stage::Encode(t) => t.is_fitted(),
        }
    }
}

impl From<ColumnSelector> for Stage {
    fn from(t: ColumnSelector) -> Self {
        Stage::Select(t)
    }
}

impl From<StandardScaler> for Stage {
    fn from(t: StandardScaler) -> Self {
        Stage::Scale(t)
    }
}

impl From<CategoricalImputer> for Stage {
    fn from(t: CategoricalImputer) -> Self {
        Stage::Impute(t)
    }
}

impl From<CategoricalEncoder> for Stage {
    fn from(t: CategoricalEncoder) -> Self {
        Stage::Encode(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImputeStrategy;

    #[test]
    fn test_stage_chain_fit_transform() {
        let df = df![
            "age" => [30i64, 40, 50],
            "color" => [Some("red"), None, Some("red")],
        ]
        .unwrap();

        let mut stages: Vec<Stage> = vec![
            ColumnSelector::new(ColumnKind::Categorical).into(),
            CategoricalImputer::new(None, ImputeStrategy::MostFrequent).into(),
            CategoricalEncoder::new(false).into(),
        ];

        let mut current = df.clone();
        for stage in &mut stages {
            current = stage.fit_transform(&current).unwrap();
        }

        assert!(stages.iter().all(Stage::is_fitted));
        assert_eq!(current.get_column_names_str(), vec!["color_red"]);
        assert_eq!(current.height(), 3);
    }

    #[test]
    fn test_stage_names() {
        let stage: Stage = StandardScaler::new().into();
        assert_eq!(stage.name(), "StandardScaler");
        assert!(!stage.is_fitted());
    }
}
