//! Model Module - classifier, attribution and training
//!
//! Training and serving share the feature layout defined here, so the order
//! of inputs at prediction time always matches the order used for fitting.

pub mod layout;
pub mod vector;
pub mod classifier;
pub mod forest;
pub mod explain;
pub mod dataset;
pub mod artifact;
pub mod training;

// Re-export common types
pub use layout::{FeatureSpec, FEATURE_COUNT, FEATURE_LAYOUT};
pub use vector::{FeatureVector, FieldError, RawFields, RawValue};
pub use classifier::{Classifier, Explainer};
pub use forest::{ForestParams, RandomForest};
pub use explain::{Attribution, AttributionError, FeatureContribution, TreeExplainer};
pub use dataset::{Dataset, DatasetError};
pub use artifact::{ArtifactError, ModelArtifact};
pub use training::{train, TrainingConfig, TrainingError};
