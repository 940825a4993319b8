//! Classification metrics.
//!
//! Binary metrics take a positive-class mask instead of label strings so
//! they work for any pair of class labels.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

fn check_lengths(a: usize, b: usize, what: &str) -> Result<()> {
    if a != b {
        return Err(PipelineError::InvalidData(format!(
            "{}: length mismatch ({} vs {})",
            what, a, b
        )));
    }
    if a == 0 {
        return Err(PipelineError::InvalidData(format!("{}: no samples", what)));
    }
    Ok(())
}

/// Fraction of predictions equal to the true label.
pub fn accuracy(y_true: &[String], y_pred: &[String]) -> Result<f64> {
    check_lengths(y_true.len(), y_pred.len(), "accuracy")?;
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Tied scores get their average rank, so a tie between a positive and a
/// negative counts as half a concordant pair. Returns 0.5 when only one
/// class is present.
pub fn roc_auc(is_positive: &[bool], scores: &[f64]) -> Result<f64> {
    check_lengths(is_positive.len(), scores.len(), "roc_auc")?;

    let n_pos = is_positive.iter().filter(|&&p| p).count();
    let n_neg = is_positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Ok(0.5);
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Sum of 1-based ranks of the positives, ties sharing their mean rank
    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let mean_rank = (start + 1 + end) as f64 / 2.0;
        let positives = order[start..end].iter().filter(|&&i| is_positive[i]).count();
        rank_sum += mean_rank * positives as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let u = rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * n_neg as f64))
}

/// 2x2 confusion matrix; `counts[true][predicted]`, negative class first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub classes: [String; 2],
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn true_negatives(&self) -> usize {
        self.counts[0][0]
    }

    pub fn false_positives(&self) -> usize {
        self.counts[0][1]
    }

    pub fn false_negatives(&self) -> usize {
        self.counts[1][0]
    }

    pub fn true_positives(&self) -> usize {
        self.counts[1][1]
    }
}

/// Count predictions per (true, predicted) class pair.
///
/// Labels outside `classes` are rejected.
pub fn confusion_matrix(
    y_true: &[String],
    y_pred: &[String],
    classes: &[String; 2],
) -> Result<ConfusionMatrix> {
    check_lengths(y_true.len(), y_pred.len(), "confusion_matrix")?;

    let index = |label: &String| {
        classes.iter().position(|c| c == label).ok_or_else(|| {
            PipelineError::InvalidData(format!(
                "label '{}' is not one of {:?}",
                label, classes
            ))
        })
    };

    let mut counts = [[0usize; 2]; 2];
    for (t, p) in y_true.iter().zip(y_pred) {
        counts[index(t)?][index(p)?] += 1;
    }

    Ok(ConfusionMatrix {
        classes: classes.clone(),
        counts,
    })
}

/// One operating point of the ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
    /// Rows scoring at or above this are predicted positive.
    pub threshold: f64,
}

/// ROC curve points from the strictest threshold to the loosest.
///
/// The first point is `(0, 0)` at an infinite threshold; one point follows
/// per distinct score. Rates are 0 for a class that is absent.
pub fn roc_curve(is_positive: &[bool], scores: &[f64]) -> Result<Vec<RocPoint>> {
    check_lengths(is_positive.len(), scores.len(), "roc_curve")?;

    let n_pos = is_positive.iter().filter(|&&p| p).count() as f64;
    let n_neg = is_positive.len() as f64 - n_pos;
    let rate = |count: usize, total: f64| {
        if total > 0.0 { count as f64 / total } else { 0.0 }
    };

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = vec![RocPoint {
        fpr: 0.0,
        tpr: 0.0,
        threshold: f64::INFINITY,
    }];
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]] == threshold {
            if is_positive[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            fpr: rate(fp, n_neg),
            tpr: rate(tp, n_pos),
            threshold,
        });
    }

    Ok(points)
}

/// Evaluation of a fitted pipeline on labelled data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub n_samples: usize,
    pub accuracy: f64,
    pub roc_auc: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub roc_curve: Vec<RocPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_accuracy() {
        let t = labels(&["a", "b", "b", "a"]);
        let p = labels(&["a", "b", "a", "a"]);
        assert_eq!(accuracy(&t, &p).unwrap(), 0.75);
    }

    #[test]
    fn test_accuracy_length_mismatch() {
        let err = accuracy(&labels(&["a"]), &labels(&["a", "b"])).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA");
        assert!(accuracy(&[], &[]).is_err());
    }

    #[test]
    fn test_auc_perfect_and_worst() {
        let mask = [false, false, true, true];
        assert_eq!(roc_auc(&mask, &[0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_eq!(roc_auc(&mask, &[0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
    }

    #[test]
    fn test_auc_counts_ties_as_half() {
        let mask = [false, true];
        assert_eq!(roc_auc(&mask, &[0.5, 0.5]).unwrap(), 0.5);

        // pairs: (0.4>0.1) (0.4<0.6) (0.6 tie 0.6 counted half) (0.6>0.1) -> 2.5/4
        let mask = [false, true, false, true];
        let auc = roc_auc(&mask, &[0.1, 0.4, 0.6, 0.6]).unwrap();
        assert_abs_diff_eq!(auc, 0.625, epsilon = 1e-12);
    }

    #[test]
    fn test_auc_single_class() {
        assert_eq!(roc_auc(&[true, true], &[0.1, 0.9]).unwrap(), 0.5);
    }

    #[test]
    fn test_confusion_matrix() {
        let classes = ["0".to_string(), "1".to_string()];
        let t = labels(&["0", "0", "1", "1", "1"]);
        let p = labels(&["0", "1", "1", "1", "0"]);
        let cm = confusion_matrix(&t, &p, &classes).unwrap();

        assert_eq!(cm.counts, [[1, 1], [1, 2]]);
        assert_eq!(cm.true_positives(), 2);
        assert_eq!(cm.false_positives(), 1);
        assert_eq!(cm.false_negatives(), 1);
        assert_eq!(cm.true_negatives(), 1);
    }

    #[test]
    fn test_confusion_matrix_unknown_label() {
        let classes = ["0".to_string(), "1".to_string()];
        assert!(confusion_matrix(&labels(&["2"]), &labels(&["0"]), &classes).is_err());
    }

    #[test]
    fn test_roc_curve_points() {
        let mask = [false, true, false, true];
        let points = roc_curve(&mask, &[0.1, 0.4, 0.35, 0.8]).unwrap();

        let rates: Vec<(f64, f64)> = points.iter().map(|p| (p.fpr, p.tpr)).collect();
        assert_eq!(
            rates,
            vec![(0.0, 0.0), (0.0, 0.5), (0.0, 1.0), (0.5, 1.0), (1.0, 1.0)]
        );
        assert_eq!(points[1].threshold, 0.8);
        assert!(points[0].threshold.is_infinite());
    }

    #[test]
    fn test_roc_curve_groups_ties() {
        let points = roc_curve(&[false, true], &[0.5, 0.5]).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!((points[1].fpr, points[1].tpr), (1.0, 1.0));
    }
}
