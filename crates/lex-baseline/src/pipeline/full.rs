//! Preprocessing followed by the logistic regression classifier.

use super::preprocessing::PreprocessingPipeline;
use crate::config::{LogisticParams, PipelineConfig, Scoring};
use crate::error::{PipelineError, Result};
use crate::metrics::{self, EvaluationReport};
use crate::model::{LogisticRegression, class_labels, feature_matrix};
use crate::transformers::Transformer;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Name of the prediction Series when the label name is unknown.
const DEFAULT_PREDICTION_NAME: &str = "prediction";

/// The fitted unit of the baseline: preprocessing plus classifier.
///
/// `fit` fits both parts on the same frame; every prediction method runs the
/// frame through the fitted preprocessing first, so validation data is
/// always transformed with training-time state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullPipeline {
    config: PipelineConfig,
    preprocessing: PreprocessingPipeline,
    classifier: LogisticRegression,
    target: Option<String>,
}

static_assertions::assert_impl_all!(FullPipeline: Send, Sync, Clone);

impl FullPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            preprocessing: PreprocessingPipeline::new(&config),
            classifier: LogisticRegression::new(config.classifier),
            config,
            target: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn preprocessing(&self) -> &PreprocessingPipeline {
        &self.preprocessing
    }

    pub fn classifier(&self) -> &LogisticRegression {
        &self.classifier
    }

    pub fn is_fitted(&self) -> bool {
        self.preprocessing.is_fitted() && self.classifier.is_fitted()
    }

    /// Replace the classifier hyperparameters; the pipeline must be refit.
    pub fn set_params(&mut self, params: LogisticParams) {
        self.config.classifier = params;
        self.classifier.set_params(params);
    }

    /// Fit preprocessing and classifier on `df` with one label per row.
    pub fn fit(&mut self, df: &DataFrame, labels: &Series) -> Result<&mut Self> {
        self.config.validate()?;
        if df.height() != labels.len() {
            return Err(PipelineError::InvalidData(format!(
                "{} feature rows but {} labels",
                df.height(),
                labels.len()
            )));
        }

        // Both parts are fitted on copies and swapped in together
        let y = class_labels(labels)?;
        let mut preprocessing = self.preprocessing.clone();
        let mut classifier = self.classifier.clone();
        let features = preprocessing.fit_transform(df)?;
        let x = feature_matrix(&features, df.height())?;
        classifier.fit(x.view(), &y)?;

        self.preprocessing = preprocessing;
        self.classifier = classifier;
        self.target = Some(labels.name().to_string());

        info!(
            "Pipeline fitted on {} rows, {} features (penalty={}, C={})",
            x.nrows(),
            x.ncols(),
            self.config.classifier.penalty.as_str(),
            self.config.classifier.c
        );
        Ok(self)
    }

    /// The preprocessed feature matrix of `df`.
    pub fn features(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.classifier.is_fitted() {
            return Err(PipelineError::NotFitted("FullPipeline"));
        }
        let features = self.preprocessing.transform(df)?;
        feature_matrix(&features, df.height())
    }

    /// Margins `w.x + b`, one per row.
    pub fn decision_function(&self, df: &DataFrame) -> Result<Vec<f64>> {
        let x = self.features(df)?;
        Ok(self.classifier.decision_function(x.view())?.to_vec())
    }

    /// Probability of the positive class, one per row.
    pub fn predict_proba(&self, df: &DataFrame) -> Result<Vec<f64>> {
        let x = self.features(df)?;
        Ok(self.classifier.predict_proba(x.view())?.to_vec())
    }

    /// Predicted class labels, named after the training label Series.
    pub fn predict(&self, df: &DataFrame) -> Result<Series> {
        let name = self.target.as_deref().unwrap_or(DEFAULT_PREDICTION_NAME);
        Ok(Series::new(name.into(), self.predict_labels(df)?))
    }

    fn predict_labels(&self, df: &DataFrame) -> Result<Vec<String>> {
        let x = self.features(df)?;
        self.classifier.predict(x.view())
    }

    /// Accuracy of the predictions on `df`.
    pub fn score(&self, df: &DataFrame, labels: &Series) -> Result<f64> {
        self.score_with(Scoring::Accuracy, df, labels)
    }

    /// Score `df` against `labels` with the given metric.
    pub fn score_with(&self, scoring: Scoring, df: &DataFrame, labels: &Series) -> Result<f64> {
        let y = class_labels(labels)?;
        match scoring {
            Scoring::Accuracy => metrics::accuracy(&y, &self.predict_labels(df)?),
            Scoring::RocAuc => {
                let mask = self.positive_mask(&y)?;
                metrics::roc_auc(&mask, &self.predict_proba(df)?)
            }
        }
    }

    /// Accuracy, ROC AUC, confusion matrix and ROC curve on labelled data.
    pub fn evaluate(&self, df: &DataFrame, labels: &Series) -> Result<EvaluationReport> {
        let y = class_labels(labels)?;
        let x = self.features(df)?;
        let predicted = self.classifier.predict(x.view())?;
        let proba = self.classifier.predict_proba(x.view())?.to_vec();
        let mask = self.positive_mask(&y)?;

        Ok(EvaluationReport {
            n_samples: y.len(),
            accuracy: metrics::accuracy(&y, &predicted)?,
            roc_auc: metrics::roc_auc(&mask, &proba)?,
            confusion_matrix: metrics::confusion_matrix(&y, &predicted, self.classifier.classes()?)?,
            roc_curve: metrics::roc_curve(&mask, &proba)?,
        })
    }

    /// Output feature names of the fitted preprocessing.
    pub fn feature_names(&self) -> Result<&[String]> {
        self.preprocessing.feature_names()
    }

    /// Fitted weights paired with their feature names, in feature order.
    pub fn coefficients(&self) -> Result<Vec<(String, f64)>> {
        let fitted = self
            .classifier
            .fitted()
            .ok_or(PipelineError::NotFitted("FullPipeline"))?;
        Ok(self
            .feature_names()?
            .iter()
            .cloned()
            .zip(fitted.weights.iter().copied())
            .collect())
    }

    fn positive_mask(&self, y: &[String]) -> Result<Vec<bool>> {
        let [_, positive] = self.classifier.classes()?;
        Ok(y.iter().map(|label| label == positive).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Penalty;
    use pretty_assertions::assert_eq;

    fn frame() -> DataFrame {
        df![
            "age" => [22i64, 25, 30, 35, 41, 47, 52, 58, 61, 28, 39, 45],
            "workclass" => [
                Some("private"), Some("private"), None, Some("private"),
                Some("gov"), Some("self"), Some("gov"), None,
                Some("self"), Some("private"), Some("gov"), Some("self"),
            ],
            "hours" => [20.0, 35.0, 40.0, 38.0, 45.0, 50.0, 55.0, 60.0, 48.0, 30.0, 52.0, 44.0],
        ]
        .unwrap()
    }

    fn labels() -> Series {
        Series::new(
            "income".into(),
            &[0i64, 0, 0, 0, 1, 1, 1, 1, 1, 0, 1, 0],
        )
    }

    #[test]
    fn test_fit_predict() {
        let mut pipeline = FullPipeline::new(PipelineConfig::default());
        pipeline.fit(&frame(), &labels()).unwrap();

        let predictions = pipeline.predict(&frame()).unwrap();
        assert_eq!(predictions.name().as_str(), "income");
        assert_eq!(predictions.len(), 12);
        assert!(predictions
            .str()
            .unwrap()
            .into_no_null_iter()
            .all(|label| label == "0" || label == "1"));
        assert!(pipeline.score(&frame(), &labels()).unwrap() >= 0.75);
    }

    #[test]
    fn test_failed_refit_keeps_previous_model() {
        let mut pipeline = FullPipeline::new(PipelineConfig::default());
        pipeline.fit(&frame(), &labels()).unwrap();
        let before = pipeline.predict_proba(&frame()).unwrap();

        let shifted = df![
            "age" => [100i64, 200, 300, 400],
            "workclass" => ["private", "gov", "self", "private"],
            "hours" => [100.0, 200.0, 300.0, 400.0],
        ]
        .unwrap();
        let single_class = Series::new("income".into(), &[1i64, 1, 1, 1]);
        let err = pipeline.fit(&shifted, &single_class).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA");

        assert!(pipeline.is_fitted());
        assert_eq!(pipeline.predict_proba(&frame()).unwrap(), before);
    }

    #[test]
    fn test_proba_matches_decision_function() {
        let mut pipeline = FullPipeline::new(PipelineConfig::default());
        pipeline.fit(&frame(), &labels()).unwrap();

        let proba = pipeline.predict_proba(&frame()).unwrap();
        let margins = pipeline.decision_function(&frame()).unwrap();
        for (p, m) in proba.iter().zip(&margins) {
            assert!((0.0..=1.0).contains(p));
            assert_eq!(*p > 0.5, *m > 0.0);
        }
    }

    #[test]
    fn test_evaluate_report() {
        let mut pipeline = FullPipeline::new(PipelineConfig::default());
        pipeline.fit(&frame(), &labels()).unwrap();
        let report = pipeline.evaluate(&frame(), &labels()).unwrap();

        assert_eq!(report.n_samples, 12);
        assert_eq!(report.confusion_matrix.classes, ["0".to_string(), "1".to_string()]);
        let total: usize = report.confusion_matrix.counts.iter().flatten().sum();
        assert_eq!(total, 12);
        assert!(report.roc_auc > 0.8);
        assert_eq!(
            report.accuracy,
            pipeline.score(&frame(), &labels()).unwrap()
        );
    }

    #[test]
    fn test_coefficients_follow_feature_names() {
        let mut pipeline = FullPipeline::new(PipelineConfig::default());
        pipeline.fit(&frame(), &labels()).unwrap();

        let coefficients = pipeline.coefficients().unwrap();
        let names: Vec<&str> = coefficients.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["age", "hours", "workclass_gov", "workclass_self"]);
    }

    #[test]
    fn test_row_mismatch() {
        let mut pipeline = FullPipeline::new(PipelineConfig::default());
        let short = Series::new("income".into(), &[0i64, 1]);
        let err = pipeline.fit(&frame(), &short).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA");
    }

    #[test]
    fn test_predict_before_fit() {
        let pipeline = FullPipeline::new(PipelineConfig::default());
        assert!(pipeline.predict(&frame()).unwrap_err().is_not_fitted());
        assert!(pipeline.predict_proba(&frame()).unwrap_err().is_not_fitted());
    }

    #[test]
    fn test_set_params_requires_refit() {
        let mut pipeline = FullPipeline::new(PipelineConfig::default());
        pipeline.fit(&frame(), &labels()).unwrap();

        let params = LogisticParams::default().with_regularization(Penalty::L1, 0.5);
        pipeline.set_params(params);
        assert!(!pipeline.is_fitted());
        assert_eq!(pipeline.config().classifier, params);

        pipeline.fit(&frame(), &labels()).unwrap();
        assert!(pipeline.is_fitted());
    }

    #[test]
    fn test_fit_does_not_mutate_input() {
        let df = frame();
        let mut pipeline = FullPipeline::new(PipelineConfig::default());
        pipeline.fit(&df, &labels()).unwrap();

        assert_eq!(df.column("workclass").unwrap().null_count(), 2);
        assert_eq!(df.width(), 3);
    }
}
