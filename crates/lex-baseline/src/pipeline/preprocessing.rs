//! Two-branch preprocessing: scaled numeric columns next to one-hot
//! encoded categorical columns.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::transformers::{
    CategoricalEncoder, CategoricalImputer, ColumnKind, ColumnSelector, Stage, StandardScaler,
    Transformer,
};
use crate::utils::find_name_collision;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Ordered list of stages, each fed the previous stage's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    name: String,
    stages: Vec<Stage>,
}

impl Branch {
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            name: name.into(),
            stages,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        let mut current = df.clone();
        for stage in &mut self.stages {
            current = stage.fit_transform(&current)?;
            debug!(
                "Branch '{}': {} -> {} columns",
                self.name,
                stage.name(),
                current.width()
            );
        }
        Ok(current)
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut current = df.clone();
        for stage in &self.stages {
            current = stage.transform(&current)?;
        }
        Ok(current)
    }

    fn is_fitted(&self) -> bool {
        self.stages.iter().all(Stage::is_fitted)
    }
}

/// A column the pipeline was fitted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputColumn {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedSchema {
    inputs: Vec<InputColumn>,
    features: Vec<String>,
}

/// Preprocessing pipeline producing an all-numeric feature frame.
///
/// - numeric branch: select numeric columns, then standard-scale them
/// - categorical branch: select categorical columns, impute, then one-hot encode
///
/// Output columns are the numeric features in input order followed by the
/// indicator columns. Input columns that belong to neither branch, and
/// columns not present at fit time, are ignored by `transform`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingPipeline {
    numeric: Branch,
    categorical: Branch,
    fitted: Option<FittedSchema>,
}

impl PreprocessingPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        let numeric = Branch::new(
            "numeric",
            vec![
                ColumnSelector::new(ColumnKind::Numeric).into(),
                StandardScaler::new().into(),
            ],
        );
        let categorical = Branch::new(
            "categorical",
            vec![
                ColumnSelector::new(ColumnKind::Categorical).into(),
                CategoricalImputer::from_config(config).into(),
                CategoricalEncoder::new(config.drop_first).into(),
            ],
        );

        Self {
            numeric,
            categorical,
            fitted: None,
        }
    }

    pub fn numeric_branch(&self) -> &Branch {
        &self.numeric
    }

    pub fn categorical_branch(&self) -> &Branch {
        &self.categorical
    }

    /// Columns recorded at fit time with their kind.
    pub fn input_columns(&self) -> Result<&[InputColumn]> {
        Ok(&self.schema()?.inputs)
    }

    /// Names of the output feature columns, in order.
    pub fn feature_names(&self) -> Result<&[String]> {
        Ok(&self.schema()?.features)
    }

    fn schema(&self) -> Result<&FittedSchema> {
        self.fitted
            .as_ref()
            .ok_or(PipelineError::NotFitted("PreprocessingPipeline"))
    }

    /// The fitted input columns of `df`, checked against the recorded schema.
    fn fitted_inputs(&self, df: &DataFrame, inputs: &[InputColumn]) -> Result<DataFrame> {
        for input in inputs {
            let col = df.column(&input.name).map_err(|_| {
                PipelineError::schema_mismatch(
                    self.name(),
                    format!("missing input column '{}'", input.name),
                )
            })?;
            if !input.kind.matches(col.dtype()) {
                return Err(PipelineError::schema_mismatch(
                    self.name(),
                    format!(
                        "column '{}' was {:?} at fit time but is {}",
                        input.name,
                        input.kind,
                        col.dtype()
                    ),
                ));
            }
        }

        Ok(df.select(inputs.iter().map(|input| input.name.as_str()))?)
    }

    /// Output feature names paired with the input column each comes from.
    fn feature_sources(numeric: &DataFrame, categorical: &Branch) -> Vec<(String, String)> {
        let mut sources: Vec<(String, String)> = numeric
            .get_column_names_str()
            .into_iter()
            .map(|name| (name.to_string(), name.to_string()))
            .collect();
        for stage in categorical.stages() {
            if let Stage::Encode(encoder) = stage {
                for vocab in encoder.vocabulary().unwrap_or_default() {
                    sources.extend(
                        vocab
                            .indicator_names(encoder.drop_first())
                            .into_iter()
                            .map(|name| (name, vocab.column.clone())),
                    );
                }
            }
        }
        sources
    }

    fn concat(numeric: DataFrame, categorical: DataFrame) -> Result<DataFrame> {
        let columns: Vec<Column> = numeric
            .get_columns()
            .iter()
            .chain(categorical.get_columns())
            .cloned()
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

impl Transformer for PreprocessingPipeline {
    fn name(&self) -> &'static str {
        "PreprocessingPipeline"
    }

    fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let inputs: Vec<InputColumn> = df
            .get_columns()
            .iter()
            .filter_map(|col| {
                ColumnKind::of(col.dtype()).map(|kind| InputColumn {
                    name: col.name().to_string(),
                    kind,
                })
            })
            .collect();

        for col in df.get_columns() {
            if ColumnKind::of(col.dtype()).is_none() {
                debug!(
                    "Ignoring '{}': {} is neither numeric nor categorical",
                    col.name(),
                    col.dtype()
                );
            }
        }

        // Branches are fitted on copies so a failure keeps the previous fit
        let mut numeric = self.numeric.clone();
        let mut categorical = self.categorical.clone();
        let numeric_out = numeric.fit_transform(df)?;
        categorical.fit_transform(df)?;

        let sources = Self::feature_sources(&numeric_out, &categorical);
        if let Some((name, first, second)) = find_name_collision(
            sources
                .iter()
                .map(|(feature, source)| (feature.as_str(), source.as_str())),
        ) {
            return Err(PipelineError::InvalidData(format!(
                "feature column '{}' is produced by both '{}' and '{}'",
                name, first, second
            )));
        }
        let features: Vec<String> = sources.into_iter().map(|(feature, _)| feature).collect();

        info!(
            "Preprocessing fitted: {} input columns -> {} features",
            inputs.len(),
            features.len()
        );

        self.numeric = numeric;
        self.categorical = categorical;
        self.fitted = Some(FittedSchema { inputs, features });
        Ok(self)
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let schema = self.schema()?;
        let inputs = self.fitted_inputs(df, &schema.inputs)?;

        let numeric = self.numeric.transform(&inputs)?;
        let categorical = self.categorical.transform(&inputs)?;
        Self::concat(numeric, categorical)
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some() && self.numeric.is_fitted() && self.categorical.is_fitted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImputeStrategy;
    use crate::utils::f64_values;
    use pretty_assertions::assert_eq;

    fn frame() -> DataFrame {
        df![
            "age" => [25i64, 35, 45, 55],
            "workclass" => [Some("private"), None, Some("private"), Some("gov")],
            "hours" => [40.0, 50.0, 40.0, 30.0],
            "sex" => ["m", "f", "m", "m"],
        ]
        .unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig::builder()
            .impute_columns(["workclass"])
            .impute_strategy(ImputeStrategy::MostFrequent)
            .drop_first(true)
            .build()
            .unwrap()
    }

    #[test]
    fn test_numeric_first_then_indicators() {
        let mut pipeline = PreprocessingPipeline::new(&config());
        let out = pipeline.fit_transform(&frame()).unwrap();

        let expected = vec!["age", "hours", "workclass_gov", "sex_f"];
        assert_eq!(out.get_column_names_str(), expected);
        assert_eq!(pipeline.feature_names().unwrap(), expected.as_slice());
    }

    #[test]
    fn test_imputed_value_is_encoded() {
        let mut pipeline = PreprocessingPipeline::new(&config());
        let out = pipeline.fit_transform(&frame()).unwrap();

        // The null workclass becomes "private", the dropped first category
        let gov = f64_values(out.column("workclass_gov").unwrap().as_materialized_series()).unwrap();
        assert_eq!(gov, vec![Some(0.0), Some(0.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let mut pipeline = PreprocessingPipeline::new(&config());
        let fitted = pipeline.fit_transform(&frame()).unwrap();

        let mut with_label = frame();
        with_label
            .with_column(Series::new("income".into(), &["0", "1", "0", "1"]))
            .unwrap();
        let out = pipeline.transform(&with_label).unwrap();

        assert_eq!(out.get_column_names(), fitted.get_column_names());
    }

    #[test]
    fn test_missing_input_column_fails() {
        let mut pipeline = PreprocessingPipeline::new(&config());
        pipeline.fit(&frame()).unwrap();

        let dropped = frame().drop("hours").unwrap();
        assert!(pipeline.transform(&dropped).unwrap_err().is_schema_mismatch());
    }

    #[test]
    fn test_changed_kind_fails() {
        let mut pipeline = PreprocessingPipeline::new(&config());
        pipeline.fit(&frame()).unwrap();

        let mut changed = frame();
        changed
            .replace("age", Series::new("age".into(), &["25", "35", "45", "55"]))
            .unwrap();
        assert!(pipeline.transform(&changed).unwrap_err().is_schema_mismatch());
    }

    #[test]
    fn test_validation_rows_use_fit_time_state() {
        let mut pipeline = PreprocessingPipeline::new(&config());
        pipeline.fit(&frame()).unwrap();

        let validation = df![
            "age" => [40i64],
            "workclass" => [Option::<&str>::None],
            "hours" => [40.0],
            "sex" => ["x"],
        ]
        .unwrap();
        let out = pipeline.transform(&validation).unwrap();

        assert_eq!(out.width(), 4);
        assert_eq!(out.height(), 1);
        let age = f64_values(out.column("age").unwrap().as_materialized_series()).unwrap();
        assert_eq!(age, vec![Some(0.0)]);
        let sex_f = f64_values(out.column("sex_f").unwrap().as_materialized_series()).unwrap();
        assert_eq!(sex_f, vec![Some(0.0)]);
    }

    #[test]
    fn test_only_numeric_columns() {
        let df = df!["x" => [1.0, 2.0, 3.0]].unwrap();
        let mut pipeline = PreprocessingPipeline::new(&PipelineConfig::default());
        let out = pipeline.fit_transform(&df).unwrap();

        assert_eq!(out.get_column_names_str(), vec!["x"]);
    }

    #[test]
    fn test_numeric_name_clashing_with_indicator() {
        let df = df![
            "sex_f" => [1.0, 2.0, 3.0],
            "sex" => ["m", "f", "m"],
        ]
        .unwrap();
        let mut pipeline = PreprocessingPipeline::new(&PipelineConfig::default());
        let err = pipeline.fit(&df).unwrap_err();

        assert_eq!(err.error_code(), "INVALID_DATA");
        assert!(err.to_string().contains("'sex_f' and 'sex'"), "{}", err);
        assert!(!pipeline.is_fitted());
    }

    #[test]
    fn test_failed_refit_keeps_previous_state() {
        let mut pipeline = PreprocessingPipeline::new(&config());
        pipeline.fit(&frame()).unwrap();
        let before = pipeline.clone();

        let mut clashing = frame();
        clashing
            .with_column(Series::new("sex_f".into(), &[1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        assert!(pipeline.fit(&clashing).is_err());

        assert_eq!(pipeline, before);
        assert!(pipeline.is_fitted());
    }

    #[test]
    fn test_transform_before_fit() {
        let pipeline = PreprocessingPipeline::new(&config());
        assert!(!pipeline.is_fitted());
        assert!(pipeline.transform(&frame()).unwrap_err().is_not_fitted());
        assert!(pipeline.feature_names().unwrap_err().is_not_fitted());
    }

    #[test]
    fn test_input_not_mutated() {
        let df = frame();
        let mut pipeline = PreprocessingPipeline::new(&config());
        pipeline.fit_transform(&df).unwrap();

        assert_eq!(df.column("workclass").unwrap().null_count(), 1);
        assert_eq!(df.width(), 4);
    }
}
