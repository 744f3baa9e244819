//! CART decision tree over sparse TF-IDF vectors, stored as a flat node arena.

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::featurizer::FeatureVector;

/// Tree node. Children are indices into the owning tree's arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: u32,
        /// Samples with `value <= threshold` go left.
        threshold: f32,
        left: u32,
        right: u32,
        /// Weighted Gini decrease achieved by this split.
        gain: f32,
    },
    Leaf {
        in_scope: bool,
        samples: u32,
    },
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Non-constant features to examine per node.
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Grow a tree on `sample` (row indices into `rows`, repeats allowed).
    pub(crate) fn grow(
        rows: &[FeatureVector],
        labels: &[bool],
        sample: Vec<usize>,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut builder = Builder {
            rows,
            labels,
            params,
            rng,
            nodes: Vec::new(),
            root_size: sample.len().max(1) as f32,
        };
        builder.grow(sample, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    /// Leaf label reached by `x`.
    pub fn predict(&self, x: &FeatureVector) -> bool {
        let mut at = 0usize;
        loop {
            match &self.nodes[at] {
                Node::Leaf { in_scope, .. } => return *in_scope,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    at = if x.get(*feature) <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], at: usize) -> usize {
            match &nodes[at] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + walk(nodes, *left as usize).max(walk(nodes, *right as usize))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Accumulate this tree's impurity decrease per feature into `out`,
    /// normalised so the tree contributes a total of 1 (or 0 for a stump).
    pub(crate) fn add_importances(&self, out: &mut [f64]) {
        let total: f64 = self
            .nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { gain, .. } => Some(*gain as f64),
                Node::Leaf { .. } => None,
            })
            .sum();
        if total <= 0.0 {
            return;
        }
        for node in &self.nodes {
            if let Node::Split { feature, gain, .. } = node {
                if let Some(slot) = out.get_mut(*feature as usize) {
                    *slot += *gain as f64 / total;
                }
            }
        }
    }

    /// Highest feature index referenced by a split, if any.
    pub(crate) fn max_feature(&self) -> Option<u32> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }

    /// Every child index points inside the arena and after its parent.
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(i, n)| match n {
                Node::Split { left, right, .. } => {
                    let (l, r) = (*left as usize, *right as usize);
                    l > i && r > i && l < self.nodes.len() && r < self.nodes.len()
                }
                Node::Leaf { .. } => true,
            })
    }
}

struct Builder<'a> {
    rows: &'a [FeatureVector],
    labels: &'a [bool],
    params: &'a TreeParams,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
    root_size: f32,
}

struct BestSplit {
    feature: u32,
    threshold: f32,
    impurity: f32,
}

impl Builder<'_> {
    fn grow(&mut self, sample: Vec<usize>, depth: usize) -> u32 {
        let n = sample.len();
        let positives = sample.iter().filter(|&&s| self.labels[s]).count();
        let id = self.nodes.len() as u32;

        let pure = positives == 0 || positives == n;
        if pure || depth >= self.params.max_depth || n < self.params.min_samples_split {
            return self.leaf(positives, n);
        }

        let Some(best) = self.best_split(&sample, positives) else {
            return self.leaf(positives, n);
        };

        let parent = gini(positives, n);
        let gain = (n as f32 / self.root_size) * (parent - best.impurity);

        let (left, right): (Vec<usize>, Vec<usize>) = sample
            .into_iter()
            .partition(|&s| self.rows[s].get(best.feature) <= best.threshold);

        // Reserve the slot; children are appended after it.
        self.nodes.push(Node::Leaf {
            in_scope: false,
            samples: n as u32,
        });
        let l = self.grow(left, depth + 1);
        let r = self.grow(right, depth + 1);
        self.nodes[id as usize] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: l,
            right: r,
            gain,
        };
        id
    }

    fn leaf(&mut self, positives: usize, n: usize) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(Node::Leaf {
            // Ties resolve to out of scope.
            in_scope: positives * 2 > n,
            samples: n as u32,
        });
        id
    }

    /// Examine features in random order until `max_features` non-constant
    /// ones have been evaluated. Features absent from every sampled row are
    /// constant zero and are skipped without cost.
    fn best_split(&mut self, sample: &[usize], positives: usize) -> Option<BestSplit> {
        let mut active: Vec<u32> = sample
            .iter()
            .flat_map(|&s| self.rows[s].entries().iter().map(|(i, _)| *i))
            .collect();
        active.sort_unstable();
        active.dedup();

        let n = sample.len();
        let min_leaf = self.params.min_samples_leaf;
        let mut best: Option<BestSplit> = None;
        let mut examined = 0usize;
        let mut values: Vec<(f32, bool)> = Vec::with_capacity(n);

        // Partial Fisher-Yates over the active features.
        for i in 0..active.len() {
            if examined >= self.params.max_features {
                break;
            }
            let j = self.rng.gen_range(i..active.len());
            active.swap(i, j);
            let feature = active[i];

            values.clear();
            values.extend(sample.iter().map(|&s| (self.rows[s].get(feature), self.labels[s])));
            values.sort_by(|a, b| a.0.total_cmp(&b.0));
            if values[0].0 == values[n - 1].0 {
                continue;
            }
            examined += 1;

            let mut left_pos = 0usize;
            for k in 1..n {
                if values[k - 1].1 {
                    left_pos += 1;
                }
                if values[k - 1].0 == values[k].0 {
                    continue;
                }
                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let right_pos = positives - left_pos;
                let impurity = (k as f32 / n as f32) * gini(left_pos, k)
                    + ((n - k) as f32 / n as f32) * gini(right_pos, n - k);
                if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                    let (lo, hi) = (values[k - 1].0, values[k].0);
                    let mid = lo + (hi - lo) / 2.0;
                    let threshold = if mid >= hi { lo } else { mid };
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }
        best
    }
}

fn gini(positives: usize, n: usize) -> f32 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f32 / n as f32;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn params() -> TreeParams {
        TreeParams {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 2,
        }
    }

    #[test]
    fn separable_data_is_fit_exactly() {
        let rows = vec![
            FeatureVector::from_sparse(2, vec![(0, 1.0)]),
            FeatureVector::from_sparse(2, vec![(0, 0.9)]),
            FeatureVector::from_sparse(2, vec![(1, 1.0)]),
            FeatureVector::from_sparse(2, vec![(1, 0.8)]),
        ];
        let labels = vec![true, true, false, false];
        let mut rng = StdRng::seed_from_u64(7);
        let tree = DecisionTree::grow(&rows, &labels, vec![0, 1, 2, 3], &params(), &mut rng);

        assert!(tree.is_well_formed());
        for (x, y) in rows.iter().zip(&labels) {
            assert_eq!(tree.predict(x), *y);
        }
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn pure_sample_is_a_single_leaf() {
        let rows = vec![FeatureVector::from_sparse(1, vec![(0, 1.0)]); 3];
        let labels = vec![true; 3];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::grow(&rows, &labels, vec![0, 1, 2], &params(), &mut rng);
        assert_eq!(
            tree.nodes(),
            &[Node::Leaf {
                in_scope: true,
                samples: 3
            }]
        );
        let mut imp = vec![0.0; 1];
        tree.add_importances(&mut imp);
        assert_eq!(imp, vec![0.0]);
    }

    #[test]
    fn min_samples_leaf_blocks_small_children() {
        let rows = vec![
            FeatureVector::from_sparse(1, vec![(0, 1.0)]),
            FeatureVector::zeros(1),
            FeatureVector::zeros(1),
        ];
        let labels = vec![true, false, false];
        let p = TreeParams {
            min_samples_leaf: 2,
            ..params()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let tree = DecisionTree::grow(&rows, &labels, vec![0, 1, 2], &p, &mut rng);
        assert_eq!(tree.nodes().len(), 1);
        assert!(!tree.predict(&rows[0]));
    }

    #[test]
    fn importances_sum_to_one_per_tree() {
        let rows = vec![
            FeatureVector::from_sparse(3, vec![(0, 1.0)]),
            FeatureVector::from_sparse(3, vec![(0, 1.0), (2, 0.5)]),
            FeatureVector::from_sparse(3, vec![(1, 1.0)]),
            FeatureVector::from_sparse(3, vec![(1, 1.0), (2, 0.5)]),
        ];
        let labels = vec![true, true, false, false];
        let mut rng = StdRng::seed_from_u64(11);
        let tree = DecisionTree::grow(&rows, &labels, vec![0, 1, 2, 3], &params(), &mut rng);
        let mut imp = vec![0.0; 3];
        tree.add_importances(&mut imp);
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(imp[2], 0.0);
    }
}
