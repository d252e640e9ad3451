//! Classifier artifact - the serialized model file
//!
//! JSON document carrying the fitted forest plus the metadata needed to
//! decide whether this binary can serve it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::forest::{ForestParams, RandomForest};
use super::layout::{LayoutInfo, LayoutMismatchError};

/// Artifact format version
pub const ARTIFACT_FORMAT: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("model artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported artifact format {0}")]
    UnsupportedFormat(u32),

    #[error(transparent)]
    Layout(#[from] LayoutMismatchError),

    #[error("model artifact contains a malformed forest")]
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format: u32,
    pub layout: LayoutInfo,
    pub created_at: DateTime<Utc>,
    pub params: ForestParams,
    pub split_seed: u64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub holdout_accuracy: f64,
    pub forest: RandomForest,
}

impl ModelArtifact {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec(self)?;
        std::fs::write(path, bytes)?;
        tracing::info!("Model artifact saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)?;

        if artifact.format != ARTIFACT_FORMAT {
            return Err(ArtifactError::UnsupportedFormat(artifact.format));
        }
        artifact.layout.validate()?;
        if !artifact.forest.is_well_formed() {
            return Err(ArtifactError::Malformed);
        }

        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::Classifier;
    use crate::ml::layout::FEATURE_COUNT;
    use crate::ml::vector::FeatureVector;

    fn artifact() -> ModelArtifact {
        let x: Vec<[f64; FEATURE_COUNT]> = (0..30)
            .map(|i| [0.0, 80.0 + i as f64 * 4.0, 70.0, 20.0, 0.0, 30.0, 0.5, 40.0])
            .collect();
        let y: Vec<u8> = (0..30).map(|i| u8::from(i >= 15)).collect();
        let params = ForestParams { n_estimators: 5, ..ForestParams::default() };
        ModelArtifact {
            format: ARTIFACT_FORMAT,
            layout: LayoutInfo::current(),
            created_at: Utc::now(),
            forest: RandomForest::fit(&x, &y, &params).unwrap(),
            params,
            split_seed: 42,
            train_rows: 30,
            test_rows: 0,
            holdout_accuracy: 1.0,
        }
    }

    #[test]
    fn test_save_and_load_preserves_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let original = artifact();
        original.save(&path).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded, original);

        let x = FeatureVector::from_values([1.0, 150.0, 70.0, 20.0, 0.0, 30.0, 0.5, 40.0]);
        assert_eq!(loaded.forest.predict_proba(&x), original.forest.predict_proba(&x));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifact::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[test]
    fn test_trained_artifact_reloads_bit_for_bit() {
        let trained = crate::test_support::artifact();
        let bytes = serde_json::to_vec(trained).unwrap();
        let reloaded = ModelArtifact::from_slice(&bytes).unwrap();

        assert_eq!(reloaded.holdout_accuracy.to_bits(), trained.holdout_accuracy.to_bits());
        assert_eq!(reloaded.forest, trained.forest);
        assert_eq!(&reloaded, trained);
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(ModelArtifact::from_slice(b"not json"), Err(ArtifactError::Parse(_))));
    }

    #[test]
    fn test_layout_mismatch_rejected() {
        let mut a = artifact();
        a.layout.hash = a.layout.hash.wrapping_add(1);
        let bytes = serde_json::to_vec(&a).unwrap();
        assert!(matches!(ModelArtifact::from_slice(&bytes), Err(ArtifactError::Layout(_))));
    }

    #[test]
    fn test_format_mismatch_rejected() {
        let mut a = artifact();
        a.format = ARTIFACT_FORMAT + 1;
        let bytes = serde_json::to_vec(&a).unwrap();
        assert!(matches!(ModelArtifact::from_slice(&bytes), Err(ArtifactError::UnsupportedFormat(_))));
    }
}
