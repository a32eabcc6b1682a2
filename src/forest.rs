//! Bagged ensemble of CART regression trees.
//!
//! Trees are grown to purity on bootstrap samples, considering every feature
//! at every split, and the ensemble prediction is the mean over trees. Each
//! tree's seed is drawn from the master seed before fitting starts, so the
//! parallel fit is reproducible.

use crate::errors::{ForecastError, Result};
use crate::features::{FeatureVector, FEATURE_COUNT};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, RngCore, SeedableRng};
use rayon::prelude::*;
use std::cmp::Ordering;

pub const FORECAST_TREES: usize = 500;
pub const BACKTEST_TREES: usize = 300;
pub const FOREST_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub seed: u64,
}

impl ForestConfig {
    pub fn forecast() -> Self {
        Self {
            n_trees: FORECAST_TREES,
            seed: FOREST_SEED,
        }
    }

    pub fn backtest() -> Self {
        Self {
            n_trees: BACKTEST_TREES,
            seed: FOREST_SEED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(features: &[FeatureVector], targets: &[f64], config: ForestConfig) -> Result<Self> {
        if features.len() != targets.len() {
            return Err(ForecastError::InvalidInput(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        if targets.is_empty() || config.n_trees == 0 {
            return Err(ForecastError::ModelFitFailure(
                "random forest needs at least one sample and one tree".to_string(),
            ));
        }
        if targets.iter().any(|t| !t.is_finite())
            || features.iter().flatten().any(|x| !x.is_finite())
        {
            return Err(ForecastError::ModelFitFailure(
                "training data contains non-finite values".to_string(),
            ));
        }

        let mut master = StdRng::seed_from_u64(config.seed);
        let seeds: Vec<u64> = (0..config.n_trees).map(|_| master.next_u64()).collect();

        let trees = seeds
            .into_par_iter()
            .map(|seed| RegressionTree::fit(features, targets, seed))
            .collect();

        Ok(Self { trees })
    }

    pub fn predict(&self, x: &FeatureVector) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.predict(x)).sum();
        total / self.trees.len() as f64
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct RegressionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    fn fit(features: &[FeatureVector], targets: &[f64], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = targets.len();
        let mut sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

        let mut tree = Self { nodes: Vec::new() };
        tree.grow(features, targets, &mut sample, &mut rng);
        tree
    }

    fn predict(&self, x: &FeatureVector) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Grows the subtree for `sample` and returns its root index.
    fn grow(
        &mut self,
        features: &[FeatureVector],
        targets: &[f64],
        sample: &mut [usize],
        rng: &mut StdRng,
    ) -> usize {
        let node_idx = self.nodes.len();
        let mean = sample.iter().map(|&i| targets[i]).sum::<f64>() / sample.len() as f64;
        self.nodes.push(Node::Leaf(mean));

        let pure = sample.iter().all(|&i| targets[i] == targets[sample[0]]);
        if sample.len() < 2 || pure {
            return node_idx;
        }

        let Some(split) = best_split(features, targets, sample, rng) else {
            return node_idx;
        };

        sample.sort_by_key(|&i| features[i][split.feature] > split.threshold);
        let cut = sample
            .iter()
            .position(|&i| features[i][split.feature] > split.threshold)
            .unwrap_or(sample.len());
        let (left_sample, right_sample) = sample.split_at_mut(cut);

        let left = self.grow(features, targets, left_sample, rng);
        let right = self.grow(features, targets, right_sample, rng);
        self.nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }
}

/// Best squared-error split, maximising `S_l^2/n_l + S_r^2/n_r`.
fn best_split(
    features: &[FeatureVector],
    targets: &[f64],
    sample: &[usize],
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let mut order: Vec<usize> = (0..FEATURE_COUNT).collect();
    order.shuffle(rng);

    let n = sample.len();
    let total: f64 = sample.iter().map(|&i| targets[i]).sum();
    let mut sorted = sample.to_vec();
    let mut best: Option<SplitCandidate> = None;

    for feature in order {
        sorted.sort_by(|&a, &b| {
            features[a][feature]
                .partial_cmp(&features[b][feature])
                .unwrap_or(Ordering::Equal)
        });

        let mut left_sum = 0.0;
        for pos in 1..n {
            left_sum += targets[sorted[pos - 1]];
            let lo = features[sorted[pos - 1]][feature];
            let hi = features[sorted[pos]][feature];
            if lo >= hi {
                continue;
            }

            let n_left = pos as f64;
            let n_right = (n - pos) as f64;
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left + right_sum * right_sum / n_right;

            if best.as_ref().is_none_or(|b| score > b.score) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<FeatureVector>, Vec<f64>) {
        let features = (0..40)
            .map(|i| {
                let mut x = [1.0; FEATURE_COUNT];
                x[0] = i as f64;
                x
            })
            .collect();
        let targets = (0..40).map(|i| if i < 20 { 0.0 } else { 10.0 }).collect();
        (features, targets)
    }

    fn point(v: f64) -> FeatureVector {
        let mut x = [1.0; FEATURE_COUNT];
        x[0] = v;
        x
    }

    #[test]
    fn learns_step_function() {
        let (features, targets) = step_data();
        let config = ForestConfig { n_trees: 50, seed: 7 };
        let forest = RandomForest::fit(&features, &targets, config).unwrap();
        assert_eq!(forest.trees.len(), 50);
        assert_eq!(forest.predict(&point(0.0)), 0.0);
        assert_eq!(forest.predict(&point(39.0)), 10.0);
        let mid = forest.predict(&point(19.5));
        assert!((0.0..=10.0).contains(&mid));
    }

    #[test]
    fn same_seed_gives_identical_predictions() {
        let features: Vec<FeatureVector> = (0..30)
            .map(|i| {
                let mut x = [0.0; FEATURE_COUNT];
                for (j, slot) in x.iter_mut().enumerate() {
                    *slot = ((i * (j + 3)) % 11) as f64;
                }
                x
            })
            .collect();
        let targets: Vec<f64> = (0..30).map(|i| ((i * 7) % 13) as f64).collect();
        let config = ForestConfig { n_trees: 40, seed: FOREST_SEED };

        let a = RandomForest::fit(&features, &targets, config).unwrap();
        let b = RandomForest::fit(&features, &targets, config).unwrap();
        for x in &features {
            assert_eq!(a.predict(x).to_bits(), b.predict(x).to_bits());
        }
    }

    #[test]
    fn constant_target_predicts_constant() {
        let (features, _) = step_data();
        let targets = vec![4.0; features.len()];
        let forest = RandomForest::fit(&features, &targets, ForestConfig::backtest()).unwrap();
        assert_eq!(forest.trees.len(), BACKTEST_TREES);
        assert_eq!(forest.predict(&point(12.0)), 4.0);
    }

    #[test]
    fn rejects_empty_training_set() {
        let err = RandomForest::fit(&[], &[], ForestConfig::forecast()).unwrap_err();
        assert!(matches!(err, ForecastError::ModelFitFailure(_)));
    }
}
