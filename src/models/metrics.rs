//! Validation metrics computed on the training set.

use super::distinct_labels;
use std::collections::BTreeMap;

pub fn accuracy(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

fn class_scores(y_true: &[f64], y_pred: &[f64], class: f64) -> (ClassScores, usize) {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t == class, p == class) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    (ClassScores { precision, recall, f1 }, tp + fn_)
}

/// Precision, recall and F1. With exactly two classes the larger label is the
/// positive class; otherwise scores are averaged weighted by class support.
pub fn precision_recall_f1(y_true: &[f64], y_pred: &[f64]) -> ClassScores {
    let mut labels = distinct_labels(y_true);
    labels.extend(distinct_labels(y_pred));
    let labels = distinct_labels(&labels);

    if labels.len() == 2 {
        return class_scores(y_true, y_pred, labels[1]).0;
    }

    let total = y_true.len() as f64;
    if total == 0.0 {
        return ClassScores {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }
    labels.iter().fold(
        ClassScores {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        },
        |acc, &class| {
            let (scores, support) = class_scores(y_true, y_pred, class);
            let w = support as f64 / total;
            ClassScores {
                precision: acc.precision + w * scores.precision,
                recall: acc.recall + w * scores.recall,
                f1: acc.f1 + w * scores.f1,
            }
        },
    )
}

pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum::<f64>()
        / y_true.len() as f64
}

/// Coefficient of determination; 1.0 for a perfect fit of a constant target.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p) * (t - p)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn classification_report(y_true: &[f64], y_pred: &[f64]) -> BTreeMap<String, f64> {
    let scores = precision_recall_f1(y_true, y_pred);
    BTreeMap::from([
        ("accuracy".to_string(), accuracy(y_true, y_pred)),
        ("precision".to_string(), scores.precision),
        ("recall".to_string(), scores.recall),
        ("f1_score".to_string(), scores.f1),
    ])
}

pub fn regression_report(y_true: &[f64], y_pred: &[f64]) -> BTreeMap<String, f64> {
    let mse = mean_squared_error(y_true, y_pred);
    BTreeMap::from([
        ("r2_score".to_string(), r2_score(y_true, y_pred)),
        ("mean_squared_error".to_string(), mse),
        ("root_mean_squared_error".to_string(), mse.sqrt()),
    ])
}
