//! Scoring of chord estimations
//!
//! Estimations are per-track mappings from a reference chord label to a count
//! vector over estimated classes. Tracks are collapsed into a single mapping,
//! accumulated into a confusion matrix (rows are reference classes, columns
//! estimated classes), and summarized as precision/recall/F1 plus a ranked
//! confusion report per chord quality.

use crate::error::{ChordError, Result as ChordResult};
use crate::labels::{ChordVocabulary, NO_CHORD};
use crate::util::normalize;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Track identifier → chord label → class counts
pub type Estimations = BTreeMap<String, LabelCounts>;

/// Chord label → class counts
pub type LabelCounts = BTreeMap<String, Vec<f64>>;

const RULE_WIDTH: usize = 60;

/// Load estimations from a JSON file of the form
/// `{track_id: {chord_label: [count, ...]}}`.
pub fn load_estimations(path: &Path) -> ChordResult<Estimations> {
    let text = fs::read_to_string(path).map_err(|e| {
        ChordError::EstimationFileError(format!("{}: {}", path.display(), e))
    })?;
    let estimations: Estimations = serde_json::from_str(&text)?;
    log::info!(
        "Loaded estimations for {} tracks from {}",
        estimations.len(),
        path.display()
    );
    Ok(estimations)
}

/// Sum per-track estimations into a single label → counts mapping.
///
/// Any label starting with `N` (e.g. `N:maj`) is folded into `N`.
pub fn collapse_estimations(estimations: &Estimations) -> ChordResult<LabelCounts> {
    let mut total: LabelCounts = BTreeMap::new();
    for (track, results) in estimations {
        for (label, counts) in results {
            let label = if label.starts_with(NO_CHORD) {
                NO_CHORD.to_string()
            } else {
                label.clone()
            };
            match total.get_mut(&label) {
                Some(acc) => {
                    if acc.len() != counts.len() {
                        return Err(ChordError::ShapeMismatch(format!(
                            "track '{}': counts for '{}' have length {}, expected {}",
                            track,
                            label,
                            counts.len(),
                            acc.len()
                        )));
                    }
                    acc.iter_mut().zip(counts).for_each(|(a, c)| *a += c);
                }
                None => {
                    total.insert(label, counts.clone());
                }
            }
        }
    }
    Ok(total)
}

/// Rotate a class count vector so that `root` moves to C.
///
/// Entry `n` of the output is entry `(n + root) % 12 + 12 * (n / 12)` of the
/// input; the trailing no-chord entry is kept in place.
pub fn rotate(counts: &[f64], root: usize) -> Vec<f64> {
    let Some((&last, body)) = counts.split_last() else {
        return Vec::new();
    };
    (0..body.len())
        .map(|n| counts[(n + root) % 12 + 12 * (n / 12)])
        .chain(std::iter::once(last))
        .collect()
}

fn check_length(label: &str, counts: &[f64], num_classes: usize) -> ChordResult<()> {
    if counts.len() != num_classes {
        return Err(ChordError::ShapeMismatch(format!(
            "counts for '{}' have length {}, expected {}",
            label,
            counts.len(),
            num_classes
        )));
    }
    Ok(())
}

/// Class-level confusion matrix: row = reference class, column = estimate.
///
/// Labels outside the vocabulary are ignored.
pub fn confusion_matrix<V: ChordVocabulary>(
    results: &LabelCounts,
    vocab: &V,
) -> ChordResult<Array2<f64>> {
    let num_classes = vocab.vocab_dim();
    let mut confusions = Array2::<f64>::zeros((num_classes, num_classes));
    for (label, counts) in results {
        let Some(idx) = vocab.class_index(label) else {
            log::debug!("Ignoring unmapped reference label '{}'", label);
            continue;
        };
        check_length(label, counts, num_classes)?;
        let mut row = confusions.row_mut(idx);
        row += &Array1::from_vec(counts.clone());
    }
    Ok(confusions)
}

/// Quality-level confusion matrix.
///
/// Each label's counts are rotated to a C root and added to the row of its
/// quality's C-rooted class; no-chord counts go to the no-chord row as is.
///
/// The matrix is `vocab_dim x vocab_dim`: 157 x 157 for the default
/// vocabulary, smaller when scoring against a 25- or 61-class one. Count
/// vectors must have `vocab_dim` entries.
pub fn quality_confusion_matrix<V: ChordVocabulary>(
    results: &LabelCounts,
    vocab: &V,
) -> ChordResult<Array2<f64>> {
    let num_classes = vocab.vocab_dim();
    let mut confusions = Array2::<f64>::zeros((num_classes, num_classes));
    for (label, counts) in results {
        let Some(idx) = vocab.class_index(label) else {
            log::debug!("Ignoring unmapped reference label '{}'", label);
            continue;
        };
        check_length(label, counts, num_classes)?;
        let (row_idx, row_counts) = if idx == vocab.no_chord_index() {
            (idx, counts.clone())
        } else {
            ((idx / 12) * 12, rotate(counts, idx % 12))
        };
        let mut row = confusions.row_mut(row_idx);
        row += &Array1::from_vec(row_counts);
    }
    Ok(confusions)
}

/// Expand a confusion matrix into parallel reference/estimate class lists,
/// one entry per (rounded) unit count.
pub fn confusions_to_comparisons(confusions: &Array2<f64>) -> (Vec<usize>, Vec<usize>) {
    let mut y_true = Vec::new();
    let mut y_pred = Vec::new();
    for ((i, j), &count) in confusions.indexed_iter() {
        let count = count.round().max(0.0) as usize;
        y_true.extend(std::iter::repeat(i).take(count));
        y_pred.extend(std::iter::repeat(j).take(count));
    }
    (y_true, y_pred)
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of reference entries of this class
    pub support: usize,
    /// Number of estimates of this class
    pub predicted: usize,
}

/// Per-class metrics over `num_classes` classes; undefined ratios are 0.
pub fn class_metrics(y_true: &[usize], y_pred: &[usize], num_classes: usize) -> Vec<ClassMetrics> {
    let mut true_pos = vec![0usize; num_classes];
    let mut support = vec![0usize; num_classes];
    let mut predicted = vec![0usize; num_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t < num_classes {
            support[t] += 1;
        }
        if p < num_classes {
            predicted[p] += 1;
        }
        if t == p && t < num_classes {
            true_pos[t] += 1;
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    (0..num_classes)
        .map(|class| {
            let precision = ratio(true_pos[class], predicted[class]);
            let recall = ratio(true_pos[class], support[class]);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                class,
                precision,
                recall,
                f1,
                support: support[class],
                predicted: predicted[class],
            }
        })
        .collect()
}

/// Aggregate precision/recall/F1
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Weighted and quality-averaged scores of a quality confusion matrix
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scores {
    /// Support-weighted over all classes
    pub weighted: Summary,
    /// Mean over the C-rooted class of each quality (and no-chord), counting
    /// only classes that occur as a reference or an estimate
    pub averaged: Summary,
}

/// Score a quality-level confusion matrix.
pub fn score_confusions(confusions: &Array2<f64>) -> Scores {
    let (y_true, y_pred) = confusions_to_comparisons(confusions);
    let metrics = class_metrics(&y_true, &y_pred, confusions.nrows());

    let total_support: usize = metrics.iter().map(|m| m.support).sum();
    let weighted = if total_support == 0 {
        Summary::default()
    } else {
        let weigh = |f: fn(&ClassMetrics) -> f64| {
            metrics
                .iter()
                .map(|m| f(m) * m.support as f64)
                .sum::<f64>()
                / total_support as f64
        };
        Summary {
            precision: weigh(|m| m.precision),
            recall: weigh(|m| m.recall),
            f1: weigh(|m| m.f1),
        }
    };

    let representatives: Vec<&ClassMetrics> = metrics
        .iter()
        .step_by(12)
        .filter(|m| m.support > 0 || m.predicted > 0)
        .collect();
    let averaged = if representatives.is_empty() {
        Summary::default()
    } else {
        let n = representatives.len() as f64;
        Summary {
            precision: representatives.iter().map(|m| m.precision).sum::<f64>() / n,
            recall: representatives.iter().map(|m| m.recall).sum::<f64>() / n,
            f1: representatives.iter().map(|m| m.f1).sum::<f64>() / n,
        }
    };

    Scores { weighted, averaged }
}

/// Ranked confusion report, one line per C-rooted quality class.
///
/// Each line shows the class and its self-match percentage, followed by the
/// `top_k` most frequent other estimates. Ties keep the lower class first.
pub fn compute_confusions<V: ChordVocabulary>(
    quality_confusions: &Array2<f64>,
    vocab: &V,
    top_k: usize,
) -> String {
    let num_classes = quality_confusions.ncols();
    let label = |idx: usize| vocab.index_to_label(idx).unwrap_or_else(|| idx.to_string());

    let mut lines = Vec::new();
    for idx in (0..quality_confusions.nrows()).step_by(12) {
        let row = normalize(&quality_confusions.index_axis(Axis(0), idx), None);
        let mut line = format!("{:>7} ({:7.4}) ||", label(idx), row[idx] * 100.0);

        let mut order: Vec<usize> = (0..num_classes).collect();
        order.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
        for other in order.into_iter().filter(|&j| j != idx).take(top_k) {
            line.push_str(&format!(" {:>7} ({:7.4}) |", label(other), row[other] * 100.0));
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Render scores as the statistics block written by the `score` command.
pub fn format_scores(scores: &Scores) -> String {
    let stat_line = |s: &Summary| {
        format!(
            "  Precision: {:0.4}\t Recall: {:0.4}\tf1: {:0.4}",
            100.0 * s.precision,
            100.0 * s.recall,
            100.0 * s.f1
        )
    };
    let rule = "-".repeat(RULE_WIDTH);
    [
        rule.clone(),
        format!("Weighted: {}", stat_line(&scores.weighted)),
        format!("Averaged: {}", stat_line(&scores.averaged)),
        rule,
    ]
    .join("\n")
}

/// Score estimations: collapse, build the quality confusion matrix, and
/// return the statistics block followed by the confusion report.
pub fn compute_scores<V: ChordVocabulary>(
    estimations: &Estimations,
    vocab: &V,
    top_k: usize,
) -> ChordResult<(Scores, String)> {
    let results = collapse_estimations(estimations)?;
    let quality_confusions = quality_confusion_matrix(&results, vocab)?;
    let scores = score_confusions(&quality_confusions);
    log::info!(
        "Scored {} labels: weighted f1 {:.4}, averaged f1 {:.4}",
        results.len(),
        scores.weighted.f1,
        scores.averaged.f1
    );
    let report = format!(
        "{}\n{}",
        format_scores(&scores),
        compute_confusions(&quality_confusions, vocab, top_k)
    );
    Ok((scores, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_moves_root_to_c() {
        let mut counts = vec![0.0; 25];
        counts[14] = 1.0; // D:min
        counts[24] = 5.0;
        let rotated = rotate(&counts, 2);
        assert_eq!(rotated[12], 1.0);
        assert_eq!(rotated[24], 5.0);
        assert_eq!(rotated.iter().sum::<f64>(), 6.0);
    }

    #[test]
    fn test_class_metrics_zero_division() {
        let metrics = class_metrics(&[0, 0, 1], &[0, 2, 1], 3);
        assert_eq!(metrics[0].recall, 0.5);
        assert_eq!(metrics[0].precision, 1.0);
        assert_eq!(metrics[2].precision, 0.0);
        assert_eq!(metrics[2].recall, 0.0);
        assert_eq!(metrics[2].f1, 0.0);
    }
}
