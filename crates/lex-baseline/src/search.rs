//! Cross-validation and grid search over classifier hyperparameters.
//!
//! Every (candidate, fold) job clones the template pipeline and fits its
//! own copy, so jobs share nothing mutable and can run on the rayon pool.

use crate::config::{LogisticParams, Scoring, SearchConfig};
use crate::error::{PipelineError, Result};
use crate::model::class_labels;
use crate::pipeline::FullPipeline;
use polars::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Row indices of one cross-validation fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<IdxSize>,
    pub test: Vec<IdxSize>,
}

/// K-fold splitter that keeps class proportions in every fold.
///
/// Rows of each class are dealt round-robin over the folds, in row order or
/// in a seeded shuffled order. The deal continues across classes, so fold
/// sizes differ by at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            seed: 0,
        }
    }

    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            n_splits: config.folds,
            shuffle: config.shuffle,
            seed: config.seed,
        }
    }

    /// Split rows by their labels.
    ///
    /// Every class needs at least `n_splits` rows, so each training fold
    /// still contains every class.
    pub fn split(&self, labels: &[String]) -> Result<Vec<Fold>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "need at least 2 folds, got {}",
                k
            )));
        }

        let mut by_class: BTreeMap<&str, Vec<IdxSize>> = BTreeMap::new();
        for (row, label) in labels.iter().enumerate() {
            by_class.entry(label.as_str()).or_default().push(row as IdxSize);
        }
        if let Some((label, rows)) = by_class.iter().find(|(_, rows)| rows.len() < k) {
            return Err(PipelineError::InvalidData(format!(
                "class '{}' has {} rows, fewer than {} folds",
                label,
                rows.len(),
                k
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut assignment = vec![0usize; labels.len()];
        let mut dealt = 0;
        for rows in by_class.values_mut() {
            if self.shuffle {
                rows.shuffle(&mut rng);
            }
            for &row in rows.iter() {
                assignment[row as usize] = dealt % k;
                dealt += 1;
            }
        }

        Ok((0..k)
            .map(|fold| {
                let (test, train): (Vec<IdxSize>, Vec<IdxSize>) = (0..labels.len() as IdxSize)
                    .partition(|&row| assignment[row as usize] == fold);
                Fold { train, test }
            })
            .collect())
    }
}

/// Materialized training and test frames of one fold.
struct FoldData {
    train: DataFrame,
    train_labels: Series,
    test: DataFrame,
    test_labels: Series,
}

impl FoldData {
    fn take(df: &DataFrame, labels: &Series, fold: &Fold) -> Result<Self> {
        let train_idx = IdxCa::from_vec("train".into(), fold.train.clone());
        let test_idx = IdxCa::from_vec("test".into(), fold.test.clone());
        Ok(Self {
            train: df.take(&train_idx)?,
            train_labels: labels.take(&train_idx)?,
            test: df.take(&test_idx)?,
            test_labels: labels.take(&test_idx)?,
        })
    }

    fn score(&self, template: &FullPipeline, params: LogisticParams, scoring: Scoring) -> Result<f64> {
        let mut pipeline = template.clone();
        pipeline.set_params(params);
        pipeline.fit(&self.train, &self.train_labels)?;
        pipeline.score_with(scoring, &self.test, &self.test_labels)
    }
}

fn fold_data(df: &DataFrame, labels: &Series, splitter: &StratifiedKFold) -> Result<Vec<FoldData>> {
    if df.height() != labels.len() {
        return Err(PipelineError::InvalidData(format!(
            "{} feature rows but {} labels",
            df.height(),
            labels.len()
        )));
    }
    splitter
        .split(&class_labels(labels)?)?
        .iter()
        .map(|fold| FoldData::take(df, labels, fold))
        .collect()
}

/// Score `template` with its own parameters on each stratified fold.
pub fn cross_val_score(
    template: &FullPipeline,
    df: &DataFrame,
    labels: &Series,
    splitter: &StratifiedKFold,
    scoring: Scoring,
) -> Result<Vec<f64>> {
    let params = template.config().classifier;
    let scores = fold_data(df, labels, splitter)?
        .iter()
        .map(|fold| fold.score(template, params, scoring))
        .collect::<Result<Vec<f64>>>()?;

    debug!("Cross-validation {} scores: {:?}", scoring.as_str(), scores);
    Ok(scores)
}

/// Mean and population standard deviation.
fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Cross-validation result of one grid candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub params: LogisticParams,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// 1 for the best mean score; tied means share a rank.
    pub rank: usize,
}

#[derive(Debug, Clone)]
struct SearchOutcome {
    results: Vec<CandidateResult>,
    best: usize,
    best_pipeline: FullPipeline,
}

/// Exhaustive search over penalty x C with stratified cross-validation.
///
/// The best candidate is the highest mean fold score; on ties the earliest
/// candidate in grid order wins. After the search the template is refit
/// with the best parameters on the full data.
#[derive(Debug, Clone)]
pub struct GridSearch {
    config: SearchConfig,
    template: FullPipeline,
    outcome: Option<SearchOutcome>,
}

impl GridSearch {
    pub fn new(template: FullPipeline, config: SearchConfig) -> Self {
        Self {
            config,
            template,
            outcome: None,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn fit(&mut self, df: &DataFrame, labels: &Series) -> Result<&mut Self> {
        self.config.validate()?;

        let candidates: Vec<LogisticParams> = self
            .config
            .candidates()
            .into_iter()
            .map(|(penalty, c)| self.template.config().classifier.with_regularization(penalty, c))
            .collect();
        let folds = fold_data(df, labels, &StratifiedKFold::from_config(&self.config))?;

        info!(
            "Grid search: {} candidates x {} folds, scoring={}",
            candidates.len(),
            folds.len(),
            self.config.scoring.as_str()
        );

        let jobs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();
        let run = |&(c, f): &(usize, usize)| {
            folds[f].score(&self.template, candidates[c], self.config.scoring)
        };
        let scores: Vec<f64> = if self.config.parallel {
            jobs.par_iter().map(run).collect::<Result<_>>()?
        } else {
            jobs.iter().map(run).collect::<Result<_>>()?
        };

        let mut results: Vec<CandidateResult> = candidates
            .iter()
            .zip(scores.chunks(folds.len()))
            .map(|(params, fold_scores)| {
                let (mean_score, std_score) = mean_std(fold_scores);
                info!(
                    "  penalty={} C={}: {:.4} (+/- {:.4})",
                    params.penalty.as_str(),
                    params.c,
                    mean_score,
                    std_score
                );
                CandidateResult {
                    params: *params,
                    fold_scores: fold_scores.to_vec(),
                    mean_score,
                    std_score,
                    rank: 0,
                }
            })
            .collect();

        let means: Vec<f64> = results.iter().map(|r| r.mean_score).collect();
        for result in &mut results {
            result.rank = 1 + means.iter().filter(|&&m| m > result.mean_score).count();
        }

        let mut best = 0;
        for (i, result) in results.iter().enumerate() {
            if result.mean_score > results[best].mean_score {
                best = i;
            }
        }

        let mut best_pipeline = self.template.clone();
        best_pipeline.set_params(results[best].params);
        best_pipeline.fit(df, labels)?;

        info!(
            "Best: penalty={} C={} ({}={:.4})",
            results[best].params.penalty.as_str(),
            results[best].params.c,
            self.config.scoring.as_str(),
            results[best].mean_score
        );

        self.outcome = Some(SearchOutcome {
            results,
            best,
            best_pipeline,
        });
        Ok(self)
    }

    fn outcome(&self) -> Result<&SearchOutcome> {
        self.outcome
            .as_ref()
            .ok_or(PipelineError::NotFitted("GridSearch"))
    }

    pub fn best_params(&self) -> Result<LogisticParams> {
        let outcome = self.outcome()?;
        Ok(outcome.results[outcome.best].params)
    }

    /// Mean cross-validation score of the best candidate.
    pub fn best_score(&self) -> Result<f64> {
        let outcome = self.outcome()?;
        Ok(outcome.results[outcome.best].mean_score)
    }

    /// Per-candidate results in grid order.
    pub fn cv_results(&self) -> Result<&[CandidateResult]> {
        Ok(&self.outcome()?.results)
    }

    /// The template refit on the full data with the best parameters.
    pub fn best_pipeline(&self) -> Result<&FullPipeline> {
        Ok(&self.outcome()?.best_pipeline)
    }

    pub fn into_best_pipeline(self) -> Result<FullPipeline> {
        self.outcome
            .map(|outcome| outcome.best_pipeline)
            .ok_or(PipelineError::NotFitted("GridSearch"))
    }
}
