//! Binary logistic regression trained by cyclic coordinate descent.
//!
//! The objective is
//!
//! ```text
//! C * sum_i logloss(y_i, w.x_i + b) + penalty(w)
//! ```
//!
//! with `penalty(w) = |w|_1` for L1 and `0.5 * |w|_2^2` for L2. The
//! intercept is not penalized. Dividing through by `C` gives the form that
//! is minimized here: unit-weight log loss plus `1/C` times the penalty.
//!
//! Each round updates the intercept and then every weight in a shuffled
//! order. A weight update is a Newton step on the coordinate's second-order
//! approximation; for L1 the step is soft-thresholded, which is what drives
//! weights exactly to zero. Steps are halved until the objective does not
//! increase, so every round is monotone.

use crate::config::{LogisticParams, Penalty};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Hessians below this are treated as zero and the coordinate is skipped.
const MIN_HESSIAN: f64 = 1e-12;

/// Maximum number of step halvings in the line search.
const MAX_HALVINGS: usize = 30;

/// Logistic function, split by sign so `exp` never overflows.
#[inline]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + exp(z))` without overflow.
#[inline]
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Log loss of one row given its margin and 0/1 target.
#[inline]
fn log_loss(margin: f64, target: f64) -> f64 {
    softplus(margin) - target * margin
}

/// Soft-thresholding operator used for L1 updates.
#[inline]
fn soft_threshold(x: f64, threshold: f64) -> f64 {
    if x > threshold {
        x - threshold
    } else if x < -threshold {
        x + threshold
    } else {
        0.0
    }
}

/// Learned weights of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedLogistic {
    /// Sorted class labels; `classes[1]` is the positive class.
    pub classes: [String; 2],
    pub weights: Array1<f64>,
    pub intercept: f64,
    /// Rounds of coordinate descent that were run.
    pub n_iter: usize,
    pub converged: bool,
}

/// Penalty weights after dividing the objective by `C`.
#[derive(Debug, Clone, Copy)]
struct Regularization {
    l1: f64,
    l2: f64,
}

impl Regularization {
    fn from_params(params: &LogisticParams) -> Self {
        let strength = 1.0 / params.c;
        match params.penalty {
            Penalty::L1 => Self {
                l1: strength,
                l2: 0.0,
            },
            Penalty::L2 => Self {
                l1: 0.0,
                l2: strength,
            },
        }
    }

    #[inline]
    fn penalty(&self, w: f64) -> f64 {
        self.l1 * w.abs() + 0.5 * self.l2 * w * w
    }
}

/// Binary logistic regression classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    params: LogisticParams,
    fitted: Option<FittedLogistic>,
}

impl LogisticRegression {
    pub fn new(params: LogisticParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    pub fn params(&self) -> &LogisticParams {
        &self.params
    }

    /// Replace the hyperparameters. Any learned weights are discarded.
    pub fn set_params(&mut self, params: LogisticParams) {
        self.params = params;
        self.fitted = None;
    }

    pub fn fitted(&self) -> Option<&FittedLogistic> {
        self.fitted.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Sorted class labels of the fitted model.
    pub fn classes(&self) -> Result<&[String; 2]> {
        Ok(&self.state()?.classes)
    }

    fn state(&self) -> Result<&FittedLogistic> {
        self.fitted
            .as_ref()
            .ok_or(PipelineError::NotFitted("LogisticRegression"))
    }

    /// Fit on a feature matrix and one label per row.
    ///
    /// Exactly two distinct labels are required. They are sorted, and the
    /// larger one is the positive class.
    pub fn fit(&mut self, x: ArrayView2<f64>, labels: &[String]) -> Result<&mut Self> {
        self.params.validate()?;

        if x.nrows() != labels.len() {
            return Err(PipelineError::InvalidData(format!(
                "feature matrix has {} rows but {} labels were given",
                x.nrows(),
                labels.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(PipelineError::InvalidData(
                "cannot fit on an empty training set".to_string(),
            ));
        }

        let classes = binary_classes(labels)?;
        let targets: Array1<f64> = labels
            .iter()
            .map(|label| if *label == classes[1] { 1.0 } else { 0.0 })
            .collect();

        let fitted = self.solve(x, targets.view(), classes);
        debug!(
            "LogisticRegression fit: penalty={}, C={}, n_iter={}, converged={}, nonzero={}/{}",
            self.params.penalty.as_str(),
            self.params.c,
            fitted.n_iter,
            fitted.converged,
            fitted.weights.iter().filter(|w| **w != 0.0).count(),
            fitted.weights.len()
        );
        if !fitted.converged {
            warn!(
                "LogisticRegression did not converge in {} iterations (tol={})",
                self.params.max_iter, self.params.tol
            );
        }

        self.fitted = Some(fitted);
        Ok(self)
    }

    fn solve(&self, x: ArrayView2<f64>, y: ArrayView1<f64>, classes: [String; 2]) -> FittedLogistic {
        let n_features = x.ncols();
        let reg = Regularization::from_params(&self.params);

        let mut weights = Array1::<f64>::zeros(n_features);
        let mut intercept = 0.0;
        let mut margin = Array1::<f64>::zeros(x.nrows());

        let mut order: Vec<usize> = (0..n_features).collect();
        let mut rng = StdRng::seed_from_u64(self.params.random_seed);

        let mut n_iter = 0;
        let mut converged = false;
        while n_iter < self.params.max_iter {
            n_iter += 1;
            order.shuffle(&mut rng);

            let delta = intercept_step(margin.view(), y);
            intercept += delta;
            margin += delta;
            let mut max_delta = delta.abs();

            for &j in &order {
                let column = x.column(j);
                let w_old = weights[j];
                let delta = weight_step(margin.view(), y, column, w_old, reg);
                if delta != 0.0 {
                    weights[j] = w_old + delta;
                    margin.scaled_add(delta, &column);
                }
                max_delta = max_delta.max(delta.abs());
            }

            if max_delta < self.params.tol {
                converged = true;
                break;
            }
        }

        FittedLogistic {
            classes,
            weights,
            intercept,
            n_iter,
            converged,
        }
    }

    /// Raw margins `w.x + b`, one per row.
    pub fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let state = self.state()?;
        if x.ncols() != state.weights.len() {
            return Err(PipelineError::schema_mismatch(
                "LogisticRegression",
                format!(
                    "expected {} features, got {}",
                    state.weights.len(),
                    x.ncols()
                ),
            ));
        }
        Ok(x.dot(&state.weights) + state.intercept)
    }

    /// Probability of the positive class, one per row.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// Predicted class label per row; positive when the margin is above zero.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<String>> {
        let margins = self.decision_function(x)?;
        let [negative, positive] = &self.state()?.classes;
        Ok(margins
            .iter()
            .map(|&m| if m > 0.0 { positive.clone() } else { negative.clone() })
            .collect())
    }
}

/// The two sorted distinct labels.
pub(crate) fn binary_classes(labels: &[String]) -> Result<[String; 2]> {
    let mut distinct: Vec<&String> = labels.iter().collect();
    distinct.sort();
    distinct.dedup();

    match distinct.as_slice() {
        [negative, positive] => Ok([(*negative).clone(), (*positive).clone()]),
        other => Err(PipelineError::InvalidData(format!(
            "binary classification needs exactly 2 classes, found {}",
            other.len()
        ))),
    }
}

/// Newton step for the unpenalized intercept, line-searched.
fn intercept_step(margin: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    let (mut grad, mut hess) = (0.0, 0.0);
    for (&m, &t) in margin.iter().zip(y.iter()) {
        let p = sigmoid(m);
        grad += p - t;
        hess += p * (1.0 - p);
    }
    if hess < MIN_HESSIAN {
        return 0.0;
    }

    let base: f64 = margin.iter().zip(y.iter()).map(|(&m, &t)| log_loss(m, t)).sum();
    let mut step = -grad / hess;
    for _ in 0..MAX_HALVINGS {
        let trial: f64 = margin
            .iter()
            .zip(y.iter())
            .map(|(&m, &t)| log_loss(m + step, t))
            .sum();
        if trial <= base {
            return step;
        }
        step *= 0.5;
    }
    0.0
}

/// Proximal Newton step for one weight, line-searched.
fn weight_step(
    margin: ArrayView1<f64>,
    y: ArrayView1<f64>,
    column: ArrayView1<f64>,
    w_old: f64,
    reg: Regularization,
) -> f64 {
    let (mut grad, mut hess) = (0.0, 0.0);
    for ((&m, &t), &xij) in margin.iter().zip(y.iter()).zip(column.iter()) {
        let p = sigmoid(m);
        grad += (p - t) * xij;
        hess += p * (1.0 - p) * xij * xij;
    }
    grad += reg.l2 * w_old;
    hess += reg.l2;
    if hess < MIN_HESSIAN {
        return 0.0;
    }

    let w_new = soft_threshold(w_old - grad / hess, reg.l1 / hess);
    let mut step = w_new - w_old;
    if step == 0.0 {
        return 0.0;
    }

    let objective = |delta: f64| -> f64 {
        let loss: f64 = margin
            .iter()
            .zip(y.iter())
            .zip(column.iter())
            .map(|((&m, &t), &xij)| log_loss(m + delta * xij, t))
            .sum();
        loss + reg.penalty(w_old + delta)
    };

    let base = objective(0.0);
    for _ in 0..MAX_HALVINGS {
        if objective(step) <= base {
            return step;
        }
        step *= 0.5;
    }
    0.0
}
