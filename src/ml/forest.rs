//! Bagged regression trees with MSE splits.

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ForecastError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split; `max(1, p / 3)` when `None`.
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    /// Tree `i` is grown from `seed + i`.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 8,
            min_samples_split: 4,
            min_samples_leaf: 2,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    fn fit(x: &Array2<f64>, y: &Array1<f64>, indices: Vec<usize>, config: &ForestConfig, rng: &mut StdRng) -> Self {
        let max_features = config
            .max_features
            .unwrap_or(x.ncols() / 3)
            .clamp(1, x.ncols().max(1));
        let grower = TreeGrower {
            x,
            y,
            config,
            max_features,
        };
        Self {
            root: grower.grow(indices, 0, rng),
        }
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}

struct TreeGrower<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    config: &'a ForestConfig,
    max_features: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl TreeGrower<'_> {
    fn grow(&self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> Node {
        let mean = self.mean(&indices);
        if depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split
            || self.sse(&indices, mean) < 1e-12
        {
            return Node::Leaf(mean);
        }

        let Some(split) = self.best_split(&indices, rng) else {
            return Node::Leaf(mean);
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[[i, split.feature]] <= split.threshold);

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.grow(left, depth + 1, rng)),
            right: Box::new(self.grow(right, depth + 1, rng)),
        }
    }

    /// Lowest total squared error over a random feature subset, honoring the leaf minimum.
    fn best_split(&self, indices: &[usize], rng: &mut StdRng) -> Option<BestSplit> {
        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(rng);
        features.truncate(self.max_features);

        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let total_sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n as f64;

        let mut best: Option<BestSplit> = None;
        for feature in features {
            let mut order: Vec<usize> = indices.to_vec();
            order.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let (mut left_sum, mut left_sq) = (0.0, 0.0);
            for k in 0..n - 1 {
                let yi = self.y[order[k]];
                left_sum += yi;
                left_sq += yi * yi;

                let left_n = k + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }
                let here = self.x[[order[k], feature]];
                let next = self.x[[order[k + 1], feature]];
                if here == next {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let score = (left_sq - left_sum * left_sum / left_n as f64)
                    + (right_sq - right_sum * right_sum / right_n as f64);

                if score < parent_sse - 1e-12 && best.as_ref().map_or(true, |b| score < b.score) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (here + next) / 2.0,
                        score,
                    });
                }
            }
        }
        best
    }

    fn mean(&self, indices: &[usize]) -> f64 {
        if indices.is_empty() {
            return 0.0;
        }
        indices.iter().map(|&i| self.y[i]).sum::<f64>() / indices.len() as f64
    }

    fn sse(&self, indices: &[usize], mean: f64) -> f64 {
        indices.iter().map(|&i| (self.y[i] - mean).powi(2)).sum()
    }
}

#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    config: ForestConfig,
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, config: ForestConfig) -> Result<Self> {
        let n = x.nrows();
        if n == 0 || n != y.len() {
            return Err(ForecastError::ModelFit(format!("forest fit on {} rows with {} targets", n, y.len())));
        }
        if config.n_trees == 0 {
            return Err(ForecastError::InvalidModelConfig("forest needs at least one tree".to_string()));
        }

        let trees = (0..config.n_trees)
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(t as u64));
                let indices: Vec<usize> = if config.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(x, y, indices, &config, &mut rng)
            })
            .collect::<Vec<RegressionTree>>();

        debug!(
            "Forest grown: {} trees on {} rows, deepest {}",
            trees.len(),
            n,
            trees.iter().map(RegressionTree::depth).max().unwrap_or(0)
        );
        Ok(Self { config, trees })
    }

    /// Mean of the per-tree predictions.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        sum / self.trees.len() as f64
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let n = 40;
        let mut x = Array2::<f64>::zeros((n, 3));
        let mut y = Array1::<f64>::zeros(n);
        for i in 0..n {
            x[[i, 0]] = i as f64;
            x[[i, 1]] = (i % 7) as f64;
            x[[i, 2]] = ((i * 13) % 5) as f64;
            y[i] = if i < 20 { 10.0 } else { 20.0 };
        }
        (x, y)
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (x, y) = step_data();
        let a = RandomForestRegressor::fit(&x, &y, ForestConfig::default()).unwrap();
        let b = RandomForestRegressor::fit(&x, &y, ForestConfig::default()).unwrap();
        let row = array![25.0, 3.0, 1.0];
        assert_eq!(a.predict_row(row.view()), b.predict_row(row.view()));
        assert_eq!(a.trees().len(), 100);
    }

    #[test]
    fn test_forest_learns_step() {
        let (x, y) = step_data();
        let config = ForestConfig {
            max_features: Some(3),
            ..ForestConfig::default()
        };
        let forest = RandomForestRegressor::fit(&x, &y, config).unwrap();
        assert!(forest.predict_row(array![2.0, 2.0, 1.0].view()) < 12.0);
        assert!(forest.predict_row(array![38.0, 3.0, 4.0].view()) > 18.0);
    }

    #[test]
    fn test_predictions_stay_within_target_range() {
        let (x, y) = step_data();
        let forest = RandomForestRegressor::fit(&x, &y, ForestConfig::default()).unwrap();
        for i in 0..x.nrows() {
            let p = forest.predict_row(x.row(i));
            assert!((10.0..=20.0).contains(&p));
        }
    }

    #[test]
    fn test_depth_limit() {
        let (x, y) = step_data();
        let config = ForestConfig {
            n_trees: 5,
            max_depth: 1,
            ..ForestConfig::default()
        };
        let forest = RandomForestRegressor::fit(&x, &y, config).unwrap();
        assert!(forest.trees().iter().all(|t| t.depth() <= 1));
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![7.0, 7.0, 7.0, 7.0, 7.0];
        let forest = RandomForestRegressor::fit(&x, &y, ForestConfig::default()).unwrap();
        assert_eq!(forest.predict_row(array![9.0].view()), 7.0);
        assert!(forest.trees().iter().all(|t| t.depth() == 0));
    }
}
