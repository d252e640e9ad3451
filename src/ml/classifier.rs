//! Classifier and explainer capabilities
//!
//! The scoring pipeline only sees these two traits, so any model that can
//! produce class probabilities can be plugged in behind it.

use super::explain::{Attribution, AttributionError};
use super::vector::FeatureVector;

/// Binary classifier: `predict` + `predict_proba`
pub trait Classifier: Send + Sync {
    /// Discrete class label (0 = negative, 1 = positive)
    fn predict(&self, features: &FeatureVector) -> u8;

    /// Class probabilities `[p(negative), p(positive)]`
    fn predict_proba(&self, features: &FeatureVector) -> [f64; 2];

    /// Short description for status endpoints and logs
    fn describe(&self) -> String;
}

/// Per-feature attribution for a single prediction
pub trait Explainer: Send + Sync {
    fn explain(&self, features: &FeatureVector) -> Result<Attribution, AttributionError>;
}
