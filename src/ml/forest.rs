//! Random Forest - bagged CART trees with balanced class weights
//!
//! Trees split on weighted Gini impurity. Each node draws a random subset of
//! `max_features` candidate features and keeps drawing until a valid split is
//! found or every feature has been tried. Samples go left when
//! `x[feature] <= threshold`. Leaves hold the weighted positive-class
//! fraction, and the forest probability is the mean over trees.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::classifier::Classifier;
use super::layout::FEATURE_COUNT;
use super::training::TrainingError;
use super::vector::FeatureVector;

// ============================================================================
// HYPERPARAMETERS
// ============================================================================

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,

    /// Maximum tree depth (root is depth 0)
    pub max_depth: usize,

    /// Minimum number of distinct samples required to split a node
    pub min_samples_split: usize,

    /// Candidate features drawn per split
    pub max_features: usize,

    /// Reweight classes inversely to their frequency
    pub balanced: bool,

    /// Seed for bootstrap sampling and feature draws
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: 6,
            min_samples_split: 2,
            max_features: (FEATURE_COUNT as f64).sqrt().floor() as usize,
            balanced: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.n_estimators == 0 {
            return Err(TrainingError::InvalidParams("n_estimators must be at least 1".into()));
        }
        if self.max_depth == 0 {
            return Err(TrainingError::InvalidParams("max_depth must be at least 1".into()));
        }
        if self.min_samples_split < 2 {
            return Err(TrainingError::InvalidParams("min_samples_split must be at least 2".into()));
        }
        if self.max_features == 0 || self.max_features > FEATURE_COUNT {
            return Err(TrainingError::InvalidParams(format!(
                "max_features must be in 1..={}",
                FEATURE_COUNT
            )));
        }
        Ok(())
    }
}

// ============================================================================
// TREE
// ============================================================================

/// Tree node; children are indices into the owning tree's node list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Weighted training samples that reached this node
        cover: f64,
    },
    Leaf {
        /// Weighted positive-class fraction
        value: f64,
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

/// Single CART tree, root at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Positive-class probability of the leaf `x` lands in
    pub fn predict_value(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value, .. } => return *value,
                Node::Split { feature, threshold, left, right, .. } => {
                    index = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match &nodes[index] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Structural sanity check used when loading artifacts
    pub fn is_well_formed(&self) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        self.nodes.iter().enumerate().all(|(i, node)| match node {
            Node::Leaf { value, cover } => value.is_finite() && (0.0..=1.0).contains(value) && *cover >= 0.0,
            Node::Split { feature, threshold, left, right, cover } => {
                *feature < FEATURE_COUNT
                    && threshold.is_finite()
                    && *cover >= 0.0
                    // children are always appended after their parent
                    && *left > i
                    && *right > i
                    && *left < self.nodes.len()
                    && *right < self.nodes.len()
            }
        })
    }
}

struct TreeBuilder<'a> {
    x: &'a [[f64; FEATURE_COUNT]],
    y: &'a [u8],
    weights: Vec<f64>,
    params: &'a ForestParams,
    rng: StdRng,
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl<'a> TreeBuilder<'a> {
    fn build(mut self, indices: Vec<usize>) -> DecisionTree {
        self.grow(indices, 0);
        DecisionTree { nodes: self.nodes }
    }

    fn class_totals(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(w0, w1), &i| {
            if self.y[i] == 1 {
                (w0, w1 + self.weights[i])
            } else {
                (w0 + self.weights[i], w1)
            }
        })
    }

    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let (w0, w1) = self.class_totals(&indices);
        let total = w0 + w1;
        let value = if total > 0.0 { w1 / total } else { 0.0 };

        let index = self.nodes.len();
        self.nodes.push(Node::Leaf { value, cover: total });

        let pure = w0 <= 0.0 || w1 <= 0.0;
        if pure || depth >= self.params.max_depth || indices.len() < self.params.min_samples_split {
            return index;
        }

        let Some(split) = self.best_split(&indices) else {
            return index;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);

        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            cover: total,
        };
        index
    }

    fn best_split(&mut self, indices: &[usize]) -> Option<SplitCandidate> {
        let mut features: Vec<usize> = (0..FEATURE_COUNT).collect();
        features.shuffle(&mut self.rng);

        let mut best: Option<SplitCandidate> = None;
        for (tried, &feature) in features.iter().enumerate() {
            if tried >= self.params.max_features && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_split_on(indices, feature) {
                let better = best.as_ref().map_or(true, |b| candidate.impurity < b.impurity);
                if better {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn best_split_on(&self, indices: &[usize], feature: usize) -> Option<SplitCandidate> {
        let mut sorted = indices.to_vec();
        sorted.sort_by(|&a, &b| {
            self.x[a][feature]
                .partial_cmp(&self.x[b][feature])
                .unwrap_or(Ordering::Equal)
        });

        let (total0, total1) = self.class_totals(&sorted);
        let (mut left0, mut left1) = (0.0, 0.0);
        let mut best: Option<SplitCandidate> = None;

        for pair in sorted.windows(2) {
            let (i, next) = (pair[0], pair[1]);
            if self.y[i] == 1 {
                left1 += self.weights[i];
            } else {
                left0 += self.weights[i];
            }

            let (lo, hi) = (self.x[i][feature], self.x[next][feature]);
            if lo >= hi {
                continue;
            }

            let (right0, right1) = (total0 - left0, total1 - left1);
            let impurity = gini(left0, left1) * (left0 + left1) + gini(right0, right1) * (right0 + right1);

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = (lo + hi) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(SplitCandidate { feature, threshold, impurity });
            }
        }
        best
    }
}

fn gini(w0: f64, w1: f64) -> f64 {
    let total = w0 + w1;
    if total <= 0.0 {
        return 0.0;
    }
    let (p0, p1) = (w0 / total, w1 / total);
    1.0 - p0 * p0 - p1 * p1
}

// ============================================================================
// FOREST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a forest; deterministic for identical inputs and params
    pub fn fit(
        x: &[[f64; FEATURE_COUNT]],
        y: &[u8],
        params: &ForestParams,
    ) -> Result<Self, TrainingError> {
        params.validate()?;

        if x.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }
        if x.len() != y.len() {
            return Err(TrainingError::InvalidParams(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        if let Some(bad) = y.iter().find(|&&label| label > 1) {
            return Err(TrainingError::InvalidLabel(*bad));
        }

        let class_weight = class_weights(y, params.balanced);
        let n = x.len();
        let mut master = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(master.gen());

            let mut counts = vec![0u32; n];
            for _ in 0..n {
                counts[rng.gen_range(0..n)] += 1;
            }

            let weights: Vec<f64> = counts
                .iter()
                .zip(y.iter())
                .map(|(&c, &label)| c as f64 * class_weight[label as usize])
                .collect();
            let indices: Vec<usize> = (0..n).filter(|&i| counts[i] > 0).collect();

            let builder = TreeBuilder {
                x,
                y,
                weights,
                params,
                rng,
                nodes: Vec::new(),
            };
            trees.push(builder.build(indices));
        }

        tracing::debug!(
            trees = trees.len(),
            max_depth = trees.iter().map(|t| t.depth()).max().unwrap_or(0),
            "Random forest fitted"
        );

        Ok(Self { params: params.clone(), trees })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Mean positive-class probability over all trees
    pub fn positive_probability(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict_value(x)).sum();
        sum / self.trees.len() as f64
    }

    pub fn is_well_formed(&self) -> bool {
        !self.trees.is_empty() && self.trees.iter().all(DecisionTree::is_well_formed)
    }
}

impl Classifier for RandomForest {
    fn predict(&self, features: &FeatureVector) -> u8 {
        let [p0, p1] = self.predict_proba(features);
        u8::from(p1 > p0)
    }

    fn predict_proba(&self, features: &FeatureVector) -> [f64; 2] {
        let p1 = self.positive_probability(features.as_array()).clamp(0.0, 1.0);
        [1.0 - p1, p1]
    }

    fn describe(&self) -> String {
        format!(
            "random forest ({} trees, max depth {})",
            self.trees.len(),
            self.params.max_depth
        )
    }
}

/// `n / (2 * n_class)` per class when balanced, otherwise 1.0
fn class_weights(y: &[u8], balanced: bool) -> [f64; 2] {
    if !balanced {
        return [1.0, 1.0];
    }
    let positives = y.iter().filter(|&&l| l == 1).count();
    let negatives = y.len() - positives;
    let n = y.len() as f64;
    let weight = |count: usize| if count == 0 { 1.0 } else { n / (2.0 * count as f64) };
    [weight(negatives), weight(positives)]
}
