//! Holdout classification metrics

use std::collections::BTreeMap;

/// Accuracy plus macro-averaged precision, recall and F1 over class indices.
///
/// Classes are the union of those present in `y_true` and `y_pred`; a class
/// with no predicted (or no true) samples contributes 0 precision (or recall).
pub fn classification_metrics(y_true: &[usize], y_pred: &[usize]) -> BTreeMap<String, f64> {
    let mut metrics = BTreeMap::new();
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        metrics.insert("accuracy".to_string(), 0.0);
        return metrics;
    }

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    metrics.insert("accuracy".to_string(), correct as f64 / n as f64);

    let mut classes: Vec<usize> = y_true.iter().chain(y_pred.iter()).copied().collect();
    classes.sort_unstable();
    classes.dedup();

    let mut precision_sum = 0.0;
    let mut recall_sum = 0.0;
    let mut f1_sum = 0.0;

    for &class in &classes {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t == class, p == class) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }

        let precision = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
        let recall = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        precision_sum += precision;
        recall_sum += recall;
        f1_sum += f1;
    }

    let k = classes.len() as f64;
    metrics.insert("precision".to_string(), precision_sum / k);
    metrics.insert("recall".to_string(), recall_sum / k);
    metrics.insert("f1".to_string(), f1_sum / k);
    metrics
}
