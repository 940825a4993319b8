//! Baseline Classification Pipeline Library
//!
//! A preprocessing + logistic regression baseline for tabular data with
//! mixed numeric and categorical columns, built with Rust and Polars.
//!
//! # Overview
//!
//! - **Transformers**: dtype-based column selection, standard scaling,
//!   categorical imputation and one-hot encoding, each with fit-time state
//! - **Preprocessing Pipeline**: numeric and categorical branches whose
//!   outputs are concatenated into one numeric feature frame
//! - **Classifier**: L1/L2 regularized logistic regression
//! - **Model Selection**: stratified cross-validation and grid search over
//!   penalty and regularization strength
//! - **Persistence**: fitted pipelines saved as versioned JSON
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_baseline::{FullPipeline, GridSearch, PipelineConfig, SearchConfig};
//! use lex_baseline::data::{read_csv, split_target, train_test_split};
//!
//! let df = read_csv("adult.csv")?;
//! let (features, labels) = split_target(&df, "income")?;
//! let split = train_test_split(&features, &labels, 0.75, 42)?;
//!
//! let config = PipelineConfig::builder()
//!     .impute_columns(["workclass", "occupation", "native-country"])
//!     .drop_first(true)
//!     .build()?;
//!
//! let mut pipeline = FullPipeline::new(config);
//! pipeline.fit(&split.train, &split.train_labels)?;
//! println!("accuracy: {:.3}", pipeline.score(&split.test, &split.test_labels)?);
//!
//! let mut search = GridSearch::new(pipeline, SearchConfig::default());
//! search.fit(&split.train, &split.train_labels)?;
//! println!("best: {:?} ({:.3})", search.best_params()?, search.best_score()?);
//!
//! search.best_pipeline()?.save("experiments/baseline_model.json")?;
//! ```
//!
//! # Configuration
//!
//! Use [`PipelineConfig`] for preprocessing and classifier settings and
//! [`SearchConfig`] for the grid search:
//!
//! ```rust,ignore
//! use lex_baseline::config::*;
//!
//! let search = SearchConfig::builder()
//!     .penalties([Penalty::L1, Penalty::L2])
//!     .strengths([1.0, 0.5, 0.1])
//!     .folds(10)
//!     .scoring(Scoring::RocAuc)
//!     .parallel(true)
//!     .build()?;
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod model;
pub mod persistence;
pub mod pipeline;
pub mod search;
pub mod transformers;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    ConfigValidationError, ImputeStrategy, LogisticParams, Penalty, PipelineConfig,
    PipelineConfigBuilder, Scoring, SearchConfig, SearchConfigBuilder,
};
pub use error::{PipelineError, Result as PipelineResult, ResultExt};
pub use metrics::{ConfusionMatrix, EvaluationReport, RocPoint};
pub use model::LogisticRegression;
pub use persistence::{FORMAT_VERSION, SavedPipeline};
pub use pipeline::{FullPipeline, PreprocessingPipeline};
pub use search::{CandidateResult, GridSearch, StratifiedKFold, cross_val_score};
pub use transformers::{
    CategoricalEncoder, CategoricalImputer, ColumnKind, ColumnSelector, Stage, StandardScaler,
    Transformer,
};
pub use utils::{is_categorical_dtype, is_numeric_dtype};
