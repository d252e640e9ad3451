//! Tree Explainer - exact Shapley attributions for the random forest
//!
//! For a coalition S of features, the expected tree output given x_S follows
//! x on features in S and averages both children by training cover
//! otherwise. With 8 features all 256 coalitions are enumerated, so the
//! values are exact and additive:
//! `base_value + Σ contributions == output_value`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::classifier::Explainer;
use super::forest::{DecisionTree, Node, RandomForest};
use super::layout::{FEATURE_COUNT, FEATURE_LAYOUT};
use super::vector::FeatureVector;

const COALITIONS: usize = 1 << FEATURE_COUNT;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttributionError {
    #[error("model has no trees to explain")]
    EmptyModel,

    #[error("attribution produced a non-finite value")]
    NonFinite,

    #[error("attribution engine failed: {0}")]
    Engine(String),
}

/// Contribution of one feature to one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub key: String,
    pub label: String,
    /// Submitted feature value
    pub value: f64,
    /// Signed push away from the base value
    pub contribution: f64,
}

/// Attribution record for the positive class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    /// Expected model output over the training distribution, E[f(X)]
    pub base_value: f64,
    /// Model output for this instance, f(x)
    pub output_value: f64,
    /// One entry per feature, in layout order
    pub contributions: Vec<FeatureContribution>,
}

impl Attribution {
    pub fn new(features: &FeatureVector, base_value: f64, output_value: f64, phi: &[f64; FEATURE_COUNT]) -> Self {
        let contributions = FEATURE_LAYOUT
            .iter()
            .zip(features.as_array().iter())
            .zip(phi.iter())
            .map(|((spec, value), contribution)| FeatureContribution {
                key: spec.key.to_string(),
                label: spec.label.to_string(),
                value: *value,
                contribution: *contribution,
            })
            .collect();

        Self { base_value, output_value, contributions }
    }

    /// Contributions by descending magnitude; ties keep layout order
    pub fn ranked(&self) -> Vec<&FeatureContribution> {
        let mut ranked: Vec<&FeatureContribution> = self.contributions.iter().collect();
        ranked.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    pub fn total(&self) -> f64 {
        self.contributions.iter().map(|c| c.contribution).sum()
    }
}

/// Exact path-dependent Shapley explainer over a shared forest
#[derive(Debug, Clone)]
pub struct TreeExplainer {
    forest: Arc<RandomForest>,
    weights: [f64; FEATURE_COUNT],
}

impl TreeExplainer {
    pub fn new(forest: Arc<RandomForest>) -> Result<Self, AttributionError> {
        if forest.trees().is_empty() {
            return Err(AttributionError::EmptyModel);
        }
        Ok(Self { forest, weights: shapley_weights() })
    }

    /// Expected model output with no feature known
    pub fn expected_value(&self) -> f64 {
        let x = [0.0; FEATURE_COUNT];
        self.mean_over_trees(|tree| conditional_expectation(tree, 0, &x, 0))
    }

    fn mean_over_trees(&self, f: impl Fn(&DecisionTree) -> f64) -> f64 {
        let trees = self.forest.trees();
        trees.iter().map(f).sum::<f64>() / trees.len() as f64
    }

    fn coalition_values(&self, x: &[f64; FEATURE_COUNT]) -> Vec<f64> {
        let mut values = vec![0.0; COALITIONS];
        for tree in self.forest.trees() {
            for (mask, value) in values.iter_mut().enumerate() {
                *value += conditional_expectation(tree, 0, x, mask);
            }
        }
        let n = self.forest.trees().len() as f64;
        values.iter_mut().for_each(|v| *v /= n);
        values
    }
}

impl Explainer for TreeExplainer {
    fn explain(&self, features: &FeatureVector) -> Result<Attribution, AttributionError> {
        let x = features.as_array();
        let values = self.coalition_values(x);

        let mut phi = [0.0f64; FEATURE_COUNT];
        for (i, slot) in phi.iter_mut().enumerate() {
            let bit = 1usize << i;
            *slot = (0..COALITIONS)
                .filter(|mask| mask & bit == 0)
                .map(|mask| {
                    let size = mask.count_ones() as usize;
                    self.weights[size] * (values[mask | bit] - values[mask])
                })
                .sum();
        }

        let base_value = values[0];
        let output_value = values[COALITIONS - 1];

        if !base_value.is_finite() || !output_value.is_finite() || phi.iter().any(|p| !p.is_finite()) {
            return Err(AttributionError::NonFinite);
        }

        Ok(Attribution::new(features, base_value, output_value, &phi))
    }
}

/// E[tree(x) | x_S] where S is the set bits of `mask`
fn conditional_expectation(tree: &DecisionTree, index: usize, x: &[f64; FEATURE_COUNT], mask: usize) -> f64 {
    let nodes = tree.nodes();
    match &nodes[index] {
        Node::Leaf { value, .. } => *value,
        Node::Split { feature, threshold, left, right, .. } => {
            if mask & (1 << feature) != 0 {
                let next = if x[*feature] <= *threshold { *left } else { *right };
                conditional_expectation(tree, next, x, mask)
            } else {
                let (lc, rc) = (nodes[*left].cover(), nodes[*right].cover());
                let total = lc + rc;
                if total <= 0.0 {
                    return 0.5
                        * (conditional_expectation(tree, *left, x, mask)
                            + conditional_expectation(tree, *right, x, mask));
                }
                (lc * conditional_expectation(tree, *left, x, mask)
                    + rc * conditional_expectation(tree, *right, x, mask))
                    / total
            }
        }
    }
}

/// `|S|! (M - |S| - 1)! / M!` indexed by coalition size
fn shapley_weights() -> [f64; FEATURE_COUNT] {
    let factorial = |n: usize| (1..=n).map(|k| k as f64).product::<f64>();
    let m = FEATURE_COUNT;
    let mut weights = [0.0; FEATURE_COUNT];
    for (s, w) in weights.iter_mut().enumerate() {
        *w = factorial(s) * factorial(m - s - 1) / factorial(m);
    }
    weights
}
