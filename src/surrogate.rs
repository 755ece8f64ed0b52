//! Gradient-boosted regression trees used as a surrogate of the solver's objective.
//!
//! Trees are grown greedily on the squared-error gradient with L2-regularized leaf
//! weights; each tree's output is shrunk by the learning rate before being added to
//! the ensemble.

use crate::config::SurrogateConfig;
use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Smallest split gain considered an improvement.
const MIN_SPLIT_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single regression tree; samples with `x[feature] < threshold` go left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct GrowContext<'a> {
    features: &'a [Vec<f64>],
    gradients: &'a [f64],
    config: &'a SurrogateConfig,
}

impl RegressionTree {
    fn grow(ctx: &GrowContext, importance: &mut [(f64, usize)]) -> Self {
        let mut tree = RegressionTree { nodes: Vec::new() };
        let mut indices: Vec<usize> = (0..ctx.gradients.len()).collect();
        tree.build(ctx, &mut indices, 0, importance);
        tree
    }

    fn build(
        &mut self,
        ctx: &GrowContext,
        indices: &mut [usize],
        depth: usize,
        importance: &mut [(f64, usize)],
    ) -> usize {
        let grad_sum: f64 = indices.iter().map(|&i| ctx.gradients[i]).sum();
        let hess_sum = indices.len() as f64;
        let value = -grad_sum / (hess_sum + ctx.config.lambda) * ctx.config.learning_rate;

        let node = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value });

        if depth >= ctx.config.max_depth {
            return node;
        }
        let Some(split) = Self::best_split(ctx, indices, grad_sum) else {
            return node;
        };

        // Partition with the same predicate used at prediction time
        let mut left_len = 0;
        for k in 0..indices.len() {
            if ctx.features[indices[k]][split.feature] < split.threshold {
                indices.swap(k, left_len);
                left_len += 1;
            }
        }
        if left_len == 0 || left_len == indices.len() {
            return node;
        }

        let (left_indices, right_indices) = indices.split_at_mut(left_len);
        let left = self.build(ctx, left_indices, depth + 1, importance);
        let right = self.build(ctx, right_indices, depth + 1, importance);

        importance[split.feature].0 += split.gain;
        importance[split.feature].1 += 1;

        self.nodes[node] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node
    }

    /// Exact greedy search over all features and distinct thresholds.
    fn best_split(ctx: &GrowContext, indices: &[usize], grad_sum: f64) -> Option<SplitCandidate> {
        let lambda = ctx.config.lambda;
        let min_child = ctx.config.min_child_weight;
        let total = indices.len() as f64;
        let parent_score = grad_sum * grad_sum / (total + lambda);
        let n_features = ctx.features.first().map_or(0, |row| row.len());

        let mut best: Option<SplitCandidate> = None;
        let mut order = indices.to_vec();

        for feature in 0..n_features {
            order.sort_by(|&a, &b| ctx.features[a][feature].total_cmp(&ctx.features[b][feature]));

            let mut left_grad = 0.0;
            for k in 1..order.len() {
                left_grad += ctx.gradients[order[k - 1]];

                let lo = ctx.features[order[k - 1]][feature];
                let hi = ctx.features[order[k]][feature];
                if lo == hi {
                    continue;
                }

                let left_hess = k as f64;
                let right_hess = total - left_hess;
                if left_hess < min_child || right_hess < min_child {
                    continue;
                }

                let right_grad = grad_sum - left_grad;
                let gain = left_grad * left_grad / (left_hess + lambda)
                    + right_grad * right_grad / (right_hess + lambda)
                    - parent_score;

                if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Check that every split reads an existing feature and points forward to
    /// existing children, so prediction always terminates in a leaf.
    fn validate(&self, tree: usize, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::precondition(format!("tree {} has no nodes", tree)));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= n_features {
                    return Err(Error::precondition(format!(
                        "tree {} node {} splits on feature {} but the model has {} features",
                        tree, index, feature, n_features
                    )));
                }
                for child in [*left, *right] {
                    if child <= index || child >= self.nodes.len() {
                        return Err(Error::precondition(format!(
                            "tree {} node {} has invalid child {} (tree size {})",
                            tree,
                            index,
                            child,
                            self.nodes.len()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// A fitted boosted ensemble mapping a feature vector to a predicted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurrogateModel {
    feature_names: Vec<String>,
    base_score: f64,
    trees: Vec<RegressionTree>,
    /// Average split gain per feature, normalized to sum to one
    feature_importance: Vec<f64>,
}

impl SurrogateModel {
    /// Fit an ensemble on rows of `features` against `targets`.
    pub fn fit(
        feature_names: &[&str],
        features: &[Vec<f64>],
        targets: &[f64],
        config: &SurrogateConfig,
    ) -> Result<Self> {
        if features.is_empty() {
            return Err(Error::precondition("no training samples"));
        }
        if features.len() != targets.len() {
            return Err(Error::precondition(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        if features.iter().any(|row| row.len() != feature_names.len()) {
            return Err(Error::precondition(format!(
                "every feature row must have {} values",
                feature_names.len()
            )));
        }
        if targets.iter().any(|t| !t.is_finite()) {
            return Err(Error::precondition("training targets must be finite"));
        }

        let base_score = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut predictions = vec![base_score; targets.len()];
        let mut importance = vec![(0.0, 0usize); feature_names.len()];
        let mut trees = Vec::with_capacity(config.n_estimators);

        for _ in 0..config.n_estimators {
            let gradients: Vec<f64> = predictions
                .iter()
                .zip(targets)
                .map(|(p, y)| p - y)
                .collect();

            let ctx = GrowContext {
                features,
                gradients: &gradients,
                config,
            };
            let tree = RegressionTree::grow(&ctx, &mut importance);

            for (prediction, row) in predictions.iter_mut().zip(features) {
                *prediction += tree.predict(row);
            }
            trees.push(tree);
        }

        let average_gain: Vec<f64> = importance
            .iter()
            .map(|&(gain, splits)| if splits > 0 { gain / splits as f64 } else { 0.0 })
            .collect();
        let total: f64 = average_gain.iter().sum();
        let feature_importance = if total > 0.0 {
            average_gain.iter().map(|g| g / total).collect()
        } else {
            vec![0.0; feature_names.len()]
        };

        Ok(SurrogateModel {
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
            base_score,
            trees,
            feature_importance,
        })
    }

    /// Predict the target for one feature vector.
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }

    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict(row)).collect()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Features paired with their importance, most important first.
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let mut ranking: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(self.feature_importance.iter().copied())
            .collect();
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranking
    }

    /// Persist the model as JSON, creating parent directories as needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Load a persisted model; a missing file is [`Error::ModelNotFound`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::ModelNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let model: SurrogateModel = serde_json::from_str(&text)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        let n_features = self.feature_names.len();
        if self.feature_importance.len() != n_features {
            return Err(Error::precondition(format!(
                "model has {} feature names but {} importance values",
                n_features,
                self.feature_importance.len()
            )));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i, n_features)?;
        }
        Ok(())
    }
}

/// Coefficient of determination of `predicted` against `actual`.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        // Constant targets: only a perfect fit explains them
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Mean absolute error of `predicted` against `actual`.
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Shuffle `items` with a fixed seed and hold out `ceil(test_size * n)` of them.
///
/// With two or more items both partitions are non-empty.
pub fn train_test_split<T: Clone>(items: &[T], test_size: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let n = items.len();
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut n_test = (test_size * n as f64).ceil() as usize;
    if n >= 2 {
        n_test = n_test.clamp(1, n - 1);
    } else {
        n_test = 0;
    }

    let test = indices[..n_test].iter().map(|&i| items[i].clone()).collect();
    let train = indices[n_test..].iter().map(|&i| items[i].clone()).collect();
    (train, test)
}
