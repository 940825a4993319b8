//! Error types for the baseline pipeline.
//!
//! This module provides the error hierarchy using `thiserror`. Every
//! transformer, the classifier, the search and persistence layers return
//! [`PipelineError`]; a stage error aborts the whole fit/transform call and
//! is left to the caller to report.
//!
//! Errors are serializable as `{code, message}` so a caller can forward
//! them as structured output.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the baseline pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// `transform`/`predict` was called on a component that has not been fit.
    #[error("{0} has not been fit; call fit() before transform() or predict()")]
    NotFitted(&'static str),

    /// Input frame does not match the schema the component was fit on.
    #[error("Schema mismatch in {component}: {reason}")]
    SchemaMismatch {
        component: &'static str,
        reason: String,
    },

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// No valid values found in a column for computation.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input data cannot be used (row mismatch, nulls in features, label arity).
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A persisted pipeline file does not exist.
    #[error("Model not found: {path}")]
    ModelNotFound { path: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Shorthand for a [`PipelineError::SchemaMismatch`].
    pub fn schema_mismatch(component: &'static str, reason: impl Into<String>) -> Self {
        PipelineError::SchemaMismatch {
            component,
            reason: reason.into(),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for structured reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFitted(_) => "NOT_FITTED",
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error means a component was used before `fit`.
    pub fn is_not_fitted(&self) -> bool {
        match self {
            Self::NotFitted(_) => true,
            Self::WithContext { source, .. } => source.is_not_fitted(),
            _ => false,
        }
    }

    /// Check if this error is a schema mismatch between fit and transform input.
    pub fn is_schema_mismatch(&self) -> bool {
        match self {
            Self::SchemaMismatch { .. } => true,
            Self::WithContext { source, .. } => source.is_schema_mismatch(),
            _ => false,
        }
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
