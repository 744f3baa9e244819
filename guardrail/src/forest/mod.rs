//! Random forest: bootstrap-aggregated CART trees with per-node feature
//! subsampling and majority voting.

mod tree;

pub use tree::{DecisionTree, Node};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::guardrail_error::GuardrailError;
use crate::featurizer::FeatureVector;
use crate::structs::guardrail_config::ForestConfig;
use crate::structs::prediction::Prediction;
use tree::TreeParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree>,
    params: ForestConfig,
}

impl RandomForest {
    /// Train on `rows` / `labels` (same length, every row of one dimension).
    pub fn fit(
        rows: &[FeatureVector],
        labels: &[bool],
        cfg: &ForestConfig,
    ) -> Result<Self, GuardrailError> {
        if rows.is_empty() {
            return Err(GuardrailError::EmptyTrainingSet);
        }
        if rows.len() != labels.len() {
            return Err(GuardrailError::InvalidInput(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        let n_features = rows[0].dim();
        if let Some(bad) = rows.iter().find(|r| r.dim() != n_features) {
            return Err(GuardrailError::ModelVersionMismatch {
                expected: format!("dimension {n_features}"),
                found: format!("dimension {}", bad.dim()),
            });
        }

        let params = TreeParams {
            max_depth: cfg.max_depth,
            min_samples_split: cfg.min_samples_split,
            min_samples_leaf: cfg.min_samples_leaf,
            max_features: cfg.max_features.resolve(n_features),
        };
        let mut master = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let n = rows.len();
        let mut trees = Vec::with_capacity(cfg.n_trees);
        for t in 0..cfg.n_trees {
            let mut rng = StdRng::seed_from_u64(master.r#gen::<u64>());
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let tree = DecisionTree::grow(rows, labels, sample, &params, &mut rng);
            debug!(
                target: "guardrail::train",
                tree = t,
                nodes = tree.nodes().len(),
                depth = tree.depth(),
                "tree grown"
            );
            trees.push(tree);
        }

        info!(
            target: "guardrail::train",
            trees = trees.len(),
            n_features,
            max_features = params.max_features,
            seeded = cfg.seed.is_some(),
            "forest trained"
        );

        Ok(Self {
            n_features,
            trees,
            params: cfg.clone(),
        })
    }

    /// Majority vote over all trees.
    pub fn predict(&self, x: &FeatureVector) -> Result<Prediction, GuardrailError> {
        if x.dim() != self.n_features {
            return Err(GuardrailError::ModelVersionMismatch {
                expected: format!("dimension {}", self.n_features),
                found: format!("dimension {}", x.dim()),
            });
        }
        let yes = self.trees.iter().filter(|t| t.predict(x)).count() as u32;
        Ok(Prediction::from_votes(yes, self.trees.len() as u32))
    }

    /// Mean normalised impurity decrease per feature; sums to 1 unless every
    /// tree is a single leaf.
    pub fn feature_importances(&self) -> Vec<f32> {
        let mut acc = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            tree.add_importances(&mut acc);
        }
        let k = self.trees.len().max(1) as f64;
        acc.into_iter().map(|v| (v / k) as f32).collect()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn params(&self) -> &ForestConfig {
        &self.params
    }

    /// Structural check run after decoding an artifact.
    pub(crate) fn validate(&self) -> Result<(), GuardrailError> {
        if self.trees.is_empty() {
            return Err(GuardrailError::InvalidInput("ensemble has no trees".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            let out_of_range = tree
                .max_feature()
                .is_some_and(|f| f as usize >= self.n_features);
            if !tree.is_well_formed() || out_of_range {
                return Err(GuardrailError::InvalidInput(format!(
                    "tree {i} is malformed"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::guardrail_config::MaxFeatures;

    fn data() -> (Vec<FeatureVector>, Vec<bool>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..6u32 {
            let w = 0.5 + i as f32 * 0.05;
            // Features 2 and 3 are shared noise.
            let noise = 2 + i % 2;
            rows.push(FeatureVector::from_sparse(4, vec![(0, w), (noise, 0.1)]));
            labels.push(true);
            rows.push(FeatureVector::from_sparse(4, vec![(1, w), (noise, 0.1)]));
            labels.push(false);
        }
        (rows, labels)
    }

    fn cfg(seed: u64) -> ForestConfig {
        ForestConfig {
            n_trees: 15,
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            seed: Some(seed),
        }
    }

    #[test]
    fn same_seed_same_forest() {
        let (rows, labels) = data();
        let a = RandomForest::fit(&rows, &labels, &cfg(42)).unwrap();
        let b = RandomForest::fit(&rows, &labels, &cfg(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn confidence_is_within_unit_interval() {
        let (rows, labels) = data();
        let forest = RandomForest::fit(&rows, &labels, &cfg(1)).unwrap();
        for x in &rows {
            let p = forest.predict(x).unwrap();
            assert!((0.0..=1.0).contains(&p.confidence));
            assert!(p.confidence >= 0.5);
            assert_eq!(p.votes_total, 15);
        }
        let p = forest.predict(&rows[0]).unwrap();
        assert!(p.in_scope);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let (rows, labels) = data();
        let forest = RandomForest::fit(&rows, &labels, &cfg(1)).unwrap();
        let wrong = FeatureVector::zeros(7);
        assert!(matches!(
            forest.predict(&wrong),
            Err(GuardrailError::ModelVersionMismatch { .. })
        ));
    }

    #[test]
    fn importances_favor_discriminative_features() {
        let (rows, labels) = data();
        let forest = RandomForest::fit(&rows, &labels, &cfg(5)).unwrap();
        let imp = forest.feature_importances();
        assert_eq!(imp.len(), 4);
        let sum: f32 = imp.iter().sum();
        assert!(sum > 0.9 && sum <= 1.0 + 1e-4);
        assert_eq!(imp[2] + imp[3], 0.0);
    }

    #[test]
    fn empty_training_set_is_rejected() {
        assert!(matches!(
            RandomForest::fit(&[], &[], &cfg(1)),
            Err(GuardrailError::EmptyTrainingSet)
        ));
    }
}
