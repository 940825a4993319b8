//! Configuration types for the baseline pipeline.
//!
//! This module provides configuration options using the builder pattern.
//! All selectors (imputation strategy, penalty, scoring) are closed enums,
//! so an invalid choice is rejected when the configuration is built rather
//! than when the pipeline runs.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Strategy for filling missing categorical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ImputeStrategy {
    /// Use the most frequent non-null value of the column
    #[default]
    MostFrequent,
    /// Use the literal "0"
    ZeroFill,
}

/// Regularization penalty applied to the logistic regression weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Penalty {
    /// Lasso penalty, sum of absolute weights
    L1,
    /// Ridge penalty, half the squared norm of the weights
    #[default]
    L2,
}

impl Penalty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Penalty::L1 => "l1",
            Penalty::L2 => "l2",
        }
    }
}

/// Metric used to rank candidates during cross-validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Scoring {
    /// Fraction of correctly classified rows
    Accuracy,
    /// Area under the ROC curve of the positive-class probability
    #[default]
    RocAuc,
}

impl Scoring {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scoring::Accuracy => "accuracy",
            Scoring::RocAuc => "roc_auc",
        }
    }
}

/// Hyperparameters of the logistic regression classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Penalty type.
    /// Default: L2
    pub penalty: Penalty,

    /// Inverse regularization strength; smaller values regularize more.
    /// Default: 1.0
    pub c: f64,

    /// Maximum number of coordinate descent rounds.
    /// Default: 200
    pub max_iter: usize,

    /// Convergence tolerance on the largest weight update of a round.
    /// Default: 1e-4
    pub tol: f64,

    /// Seed for the coordinate visiting order.
    /// Default: 42
    pub random_seed: u64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            penalty: Penalty::default(),
            c: 1.0,
            max_iter: 200,
            tol: 1e-4,
            random_seed: 42,
        }
    }
}

impl LogisticParams {
    /// Copy of these parameters with a different penalty and strength.
    pub fn with_regularization(self, penalty: Penalty, c: f64) -> Self {
        Self { penalty, c, ..self }
    }

    /// Validate the parameters and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(ConfigValidationError::InvalidStrength(self.c));
        }
        if self.max_iter == 0 {
            return Err(ConfigValidationError::InvalidMaxIter);
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(ConfigValidationError::InvalidTolerance(self.tol));
        }
        Ok(())
    }
}

/// Configuration for the full preprocessing + classifier pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_baseline::config::{PipelineConfig, ImputeStrategy, Penalty};
///
/// let config = PipelineConfig::builder()
///     .impute_columns(["workclass", "occupation", "native-country"])
///     .impute_strategy(ImputeStrategy::MostFrequent)
///     .drop_first(true)
///     .penalty(Penalty::L2)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Categorical columns to impute. `None` imputes every categorical column
    /// seen at fit time.
    /// Default: None
    pub impute_columns: Option<Vec<String>>,

    /// Strategy for filling missing categorical values.
    /// Default: MostFrequent
    pub impute_strategy: ImputeStrategy,

    /// Whether to drop the first (most frequent) indicator of each
    /// categorical column.
    /// Default: true
    pub drop_first: bool,

    /// Classifier hyperparameters.
    pub classifier: LogisticParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            impute_columns: None,
            impute_strategy: ImputeStrategy::default(),
            drop_first: true,
            classifier: LogisticParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if let Some(columns) = &self.impute_columns {
            if columns.is_empty() {
                return Err(ConfigValidationError::EmptyImputeColumns);
            }
        }
        self.classifier.validate()
    }
}

/// Configuration for the cross-validated grid search.
///
/// The default grid mirrors the classic baseline: penalty in {L1, L2}
/// crossed with C in {1.0, 0.5, 0.1}, scored by ROC AUC over 10 folds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Penalties to try.
    /// Default: [L1, L2]
    pub penalties: Vec<Penalty>,

    /// Regularization strengths (C) to try.
    /// Default: [1.0, 0.5, 0.1]
    pub strengths: Vec<f64>,

    /// Number of cross-validation folds.
    /// Default: 10
    pub folds: usize,

    /// Metric maximized by the search.
    /// Default: RocAuc
    pub scoring: Scoring,

    /// Shuffle rows (per class) before dealing them into folds.
    /// Default: false
    pub shuffle: bool,

    /// Seed used when `shuffle` is set.
    /// Default: 42
    pub seed: u64,

    /// Evaluate (candidate, fold) jobs on the rayon thread pool.
    /// Default: false
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            penalties: vec![Penalty::L1, Penalty::L2],
            strengths: vec![1.0, 0.5, 0.1],
            folds: 10,
            scoring: Scoring::default(),
            shuffle: false,
            seed: 42,
            parallel: false,
        }
    }
}

impl SearchConfig {
    /// Create a new search configuration builder.
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.penalties.is_empty() {
            return Err(ConfigValidationError::EmptyGrid("penalties"));
        }
        if self.strengths.is_empty() {
            return Err(ConfigValidationError::EmptyGrid("strengths"));
        }
        if let Some(&c) = self.strengths.iter().find(|c| !(c.is_finite() && **c > 0.0)) {
            return Err(ConfigValidationError::InvalidStrength(c));
        }
        if self.folds < 2 {
            return Err(ConfigValidationError::InvalidFolds(self.folds));
        }
        Ok(())
    }

    /// Every (penalty, C) combination, penalties varying slowest.
    pub fn candidates(&self) -> Vec<(Penalty, f64)> {
        self.penalties
            .iter()
            .flat_map(|&penalty| self.strengths.iter().map(move |&c| (penalty, c)))
            .collect()
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid regularization strength: {0} (must be finite and > 0)")]
    InvalidStrength(f64),

    #[error("Invalid tolerance: {0} (must be finite and > 0)")]
    InvalidTolerance(f64),

    #[error("Invalid max_iter: must be at least 1")]
    InvalidMaxIter,

    #[error("Invalid number of folds: {0} (must be at least 2)")]
    InvalidFolds(usize),

    #[error("Search grid has no {0}")]
    EmptyGrid(&'static str),

    #[error("impute_columns was set to an empty list")]
    EmptyImputeColumns,
}

impl From<ConfigValidationError> for PipelineError {
    fn from(err: ConfigValidationError) -> Self {
        PipelineError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    impute_columns: Option<Vec<String>>,
    impute_strategy: Option<ImputeStrategy>,
    drop_first: Option<bool>,
    penalty: Option<Penalty>,
    c: Option<f64>,
    max_iter: Option<usize>,
    tol: Option<f64>,
    random_seed: Option<u64>,
}

impl PipelineConfigBuilder {
    /// Restrict imputation to the given categorical columns.
    pub fn impute_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.impute_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the categorical imputation strategy.
    pub fn impute_strategy(mut self, strategy: ImputeStrategy) -> Self {
        self.impute_strategy = Some(strategy);
        self
    }

    /// Enable or disable dropping the first indicator of each categorical column.
    pub fn drop_first(mut self, drop_first: bool) -> Self {
        self.drop_first = Some(drop_first);
        self
    }

    /// Set the regularization penalty.
    pub fn penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = Some(penalty);
        self
    }

    /// Set the inverse regularization strength.
    pub fn c(mut self, c: f64) -> Self {
        self.c = Some(c);
        self
    }

    /// Set the maximum number of solver rounds.
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    /// Set the solver convergence tolerance.
    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = Some(tol);
        self
    }

    /// Set the classifier random seed.
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = LogisticParams::default();
        let config = PipelineConfig {
            impute_columns: self.impute_columns,
            impute_strategy: self.impute_strategy.unwrap_or_default(),
            drop_first: self.drop_first.unwrap_or(true),
            classifier: LogisticParams {
                penalty: self.penalty.unwrap_or(defaults.penalty),
                c: self.c.unwrap_or(defaults.c),
                max_iter: self.max_iter.unwrap_or(defaults.max_iter),
                tol: self.tol.unwrap_or(defaults.tol),
                random_seed: self.random_seed.unwrap_or(defaults.random_seed),
            },
        };

        config.validate()?;
        Ok(config)
    }
}

/// Builder for [`SearchConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct SearchConfigBuilder {
    penalties: Option<Vec<Penalty>>,
    strengths: Option<Vec<f64>>,
    folds: Option<usize>,
    scoring: Option<Scoring>,
    shuffle: Option<bool>,
    seed: Option<u64>,
    parallel: Option<bool>,
}

impl SearchConfigBuilder {
    /// Set the penalties to search over.
    pub fn penalties(mut self, penalties: impl Into<Vec<Penalty>>) -> Self {
        self.penalties = Some(penalties.into());
        self
    }

    /// Set the regularization strengths (C) to search over.
    pub fn strengths(mut self, strengths: impl Into<Vec<f64>>) -> Self {
        self.strengths = Some(strengths.into());
        self
    }

    /// Set the number of cross-validation folds.
    pub fn folds(mut self, folds: usize) -> Self {
        self.folds = Some(folds);
        self
    }

    /// Set the metric to maximize.
    pub fn scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = Some(scoring);
        self
    }

    /// Shuffle rows before assigning folds, using `seed`.
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = Some(shuffle);
        self
    }

    /// Set the fold shuffling seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Evaluate folds in parallel.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<SearchConfig, ConfigValidationError> {
        let defaults = SearchConfig::default();
        let config = SearchConfig {
            penalties: self.penalties.unwrap_or(defaults.penalties),
            strengths: self.strengths.unwrap_or(defaults.strengths),
            folds: self.folds.unwrap_or(defaults.folds),
            scoring: self.scoring.unwrap_or(defaults.scoring),
            shuffle: self.shuffle.unwrap_or(defaults.shuffle),
            seed: self.seed.unwrap_or(defaults.seed),
            parallel: self.parallel.unwrap_or(defaults.parallel),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.impute_columns, None);
        assert_eq!(config.impute_strategy, ImputeStrategy::MostFrequent);
        assert!(config.drop_first);
        assert_eq!(config.classifier.penalty, Penalty::L2);
        assert_eq!(config.classifier.c, 1.0);
        assert_eq!(config.classifier.random_seed, 42);
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .impute_columns(["workclass", "occupation"])
            .impute_strategy(ImputeStrategy::ZeroFill)
            .drop_first(false)
            .penalty(Penalty::L1)
            .c(0.5)
            .random_seed(7)
            .build()
            .unwrap();

        assert_eq!(
            config.impute_columns,
            Some(vec!["workclass".to_string(), "occupation".to_string()])
        );
        assert_eq!(config.impute_strategy, ImputeStrategy::ZeroFill);
        assert!(!config.drop_first);
        assert_eq!(config.classifier.penalty, Penalty::L1);
        assert_eq!(config.classifier.c, 0.5);
        assert_eq!(config.classifier.random_seed, 7);
    }

    #[test]
    fn test_validation_rejects_non_positive_strength() {
        let result = PipelineConfig::builder().c(0.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidStrength(_)
        ));
    }

    #[test]
    fn test_validation_rejects_empty_impute_columns() {
        let result = PipelineConfig::builder()
            .impute_columns(Vec::<String>::new())
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyImputeColumns
        ));
    }

    #[test]
    fn test_search_defaults() {
        let config = SearchConfig::builder().build().unwrap();
        assert_eq!(config.folds, 10);
        assert_eq!(config.scoring, Scoring::RocAuc);
        assert_eq!(config.candidates().len(), 6);
        assert_eq!(config.candidates()[0], (Penalty::L1, 1.0));
        assert_eq!(config.candidates()[5], (Penalty::L2, 0.1));
    }

    #[test]
    fn test_search_validation() {
        assert!(matches!(
            SearchConfig::builder().folds(1).build().unwrap_err(),
            ConfigValidationError::InvalidFolds(1)
        ));
        assert!(matches!(
            SearchConfig::builder()
                .penalties(Vec::<Penalty>::new())
                .build()
                .unwrap_err(),
            ConfigValidationError::EmptyGrid("penalties")
        ));
        assert!(matches!(
            SearchConfig::builder()
                .strengths(vec![1.0, -0.5])
                .build()
                .unwrap_err(),
            ConfigValidationError::InvalidStrength(_)
        ));
    }

    #[test]
    fn test_config_error_converts_to_pipeline_error() {
        let err: PipelineError = ConfigValidationError::InvalidMaxIter.into();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_config_serialization() {
        let config = PipelineConfig::builder()
            .impute_columns(["workclass"])
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_search_config_from_json() {
        let json = r#"{
            "penalties": ["L2"],
            "strengths": [0.1],
            "folds": 3,
            "scoring": "Accuracy",
            "shuffle": true,
            "seed": 1,
            "parallel": true
        }"#;

        let config: SearchConfig = serde_json::from_str(json).expect("valid search config");
        assert_eq!(config.penalties, vec![Penalty::L2]);
        assert_eq!(config.folds, 3);
        assert_eq!(config.scoring, Scoring::Accuracy);
        assert!(config.parallel);
    }
}
