//! Decision tree classifier used as the base learner of the forest

use crate::error::{MlopsError, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node holding the index of the majority class
    Leaf {
        class_idx: usize,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity
    Gini,
    /// Entropy
    Entropy,
}

/// CART classification tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features drawn at random at every split (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for the per-split feature draw
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-fit scratch state shared by the recursive builder.
struct BuildContext<'a> {
    x: &'a Array2<f64>,
    y_idx: &'a [usize],
    n_classes: usize,
    rng: ChaCha8Rng,
    importances: Vec<f64>,
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: 0,
            n_features: 0,
            feature_importances: None,
            classes: Vec::new(),
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set the number of candidate features per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(MlopsError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(MlopsError::ValidationError(
                "cannot fit a tree on zero samples".to_string(),
            ));
        }

        let mut classes: Vec<f64> = y.iter().copied().collect();
        classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        classes.dedup();
        let y_idx: Vec<usize> = y
            .iter()
            .map(|v| classes.iter().position(|c| c == v).unwrap_or(0))
            .collect();

        self.n_features = n_features;
        self.classes = classes;

        let mut ctx = BuildContext {
            x,
            y_idx: &y_idx,
            n_classes: self.classes.len(),
            rng: ChaCha8Rng::seed_from_u64(self.random_state),
            importances: vec![0.0; n_features],
        };

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(&mut ctx, &indices, 0);
        self.root = Some(root);

        let mut importances = ctx.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn class_counts(&self, ctx: &BuildContext<'_>, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; ctx.n_classes];
        for &i in indices {
            counts[ctx.y_idx[i]] += 1;
        }
        counts
    }

    fn build_tree(&self, ctx: &mut BuildContext<'_>, indices: &[usize], depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let counts = self.class_counts(ctx, indices);
        let majority = majority_class(&counts);

        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_pure;

        if should_stop {
            return TreeNode::Leaf { class_idx: majority, n_samples };
        }

        let parent_impurity = self.impurity(&counts, n_samples);
        let candidates = self.draw_features(ctx);

        let Some((feature_idx, threshold, gain)) =
            self.find_best_split(ctx, indices, &candidates, parent_impurity)
        else {
            return TreeNode::Leaf { class_idx: majority, n_samples };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| ctx.x[[i, feature_idx]] <= threshold);

        ctx.importances[feature_idx] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(ctx, &left_indices, depth + 1));
        let right = Box::new(self.build_tree(ctx, &right_indices, depth + 1));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    fn draw_features(&self, ctx: &mut BuildContext<'_>) -> Vec<usize> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        match self.max_features {
            Some(k) if k < self.n_features => {
                features.shuffle(&mut ctx.rng);
                features.truncate(k.max(1));
                features.sort_unstable();
                features
            }
            _ => features,
        }
    }

    /// Sweep every candidate feature in sorted order, keeping running class
    /// counts on both sides of the threshold.
    fn find_best_split(
        &self,
        ctx: &BuildContext<'_>,
        indices: &[usize],
        candidates: &[usize],
        parent_impurity: f64,
    ) -> Option<(usize, f64, f64)> {
        let n = indices.len();
        let total_counts = self.class_counts(ctx, indices);
        let mut best: Option<(usize, f64, f64)> = None;

        for &feature_idx in candidates {
            let mut sorted: Vec<usize> = indices.to_vec();
            sorted.sort_by(|&a, &b| {
                ctx.x[[a, feature_idx]]
                    .partial_cmp(&ctx.x[[b, feature_idx]])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left_counts = vec![0usize; ctx.n_classes];
            for pos in 0..n - 1 {
                let i = sorted[pos];
                left_counts[ctx.y_idx[i]] += 1;

                let current = ctx.x[[i, feature_idx]];
                let next = ctx.x[[sorted[pos + 1], feature_idx]];
                if next <= current {
                    continue;
                }

                let left_n = pos + 1;
                let right_n = n - left_n;
                if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                    continue;
                }

                let right_counts: Vec<usize> = total_counts
                    .iter()
                    .zip(&left_counts)
                    .map(|(t, l)| t - l)
                    .collect();
                let weighted = (left_n as f64 * self.impurity(&left_counts, left_n)
                    + right_n as f64 * self.impurity(&right_counts, right_n))
                    / n as f64;
                let gain = parent_impurity - weighted;

                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature_idx, (current + next) / 2.0, gain));
                }
            }
        }

        best
    }

    fn impurity(&self, counts: &[usize], n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let n = n as f64;
        match self.criterion {
            Criterion::Gini => {
                1.0 - counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(MlopsError::ModelNotFitted)?;

        if x.ncols() != self.n_features {
            return Err(MlopsError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let sample = row.to_vec();
                self.classes[Self::leaf_class(root, &sample)]
            })
            .collect())
    }

    fn leaf_class(node: &TreeNode, sample: &[f64]) -> usize {
        match node {
            TreeNode::Leaf { class_idx, .. } => *class_idx,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    Self::leaf_class(left, sample)
                } else {
                    Self::leaf_class(right, sample)
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }
}

/// Most frequent class index; the lowest index wins ties.
fn majority_class(counts: &[usize]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 3);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new().with_criterion(Criterion::Entropy);
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_class_values_preserved() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![3.0, 7.0, 9.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&array![[2.0]]).unwrap()[0], 9.0);
    }

    #[test]
    fn test_feature_count_mismatch() {
        let mut tree = DecisionTree::new();
        tree.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]).unwrap();
        assert!(matches!(
            tree.predict(&array![[0.0, 1.0]]),
            Err(MlopsError::ShapeError { .. })
        ));
    }
}
