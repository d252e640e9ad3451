//! Offline training: dataset → fitted forest → artifact

use chrono::Utc;

use super::artifact::{ModelArtifact, ARTIFACT_FORMAT};
use super::classifier::Classifier;
use super::dataset::{accuracy, Dataset};
use super::forest::{ForestParams, RandomForest};
use super::layout::LayoutInfo;
use super::vector::FeatureVector;

/// Default held-out fraction
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Default train/test split seed
pub const DEFAULT_SPLIT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrainingError {
    #[error("dataset is empty")]
    EmptyDataset,

    #[error("labels must be 0 or 1, got {0}")]
    InvalidLabel(u8),

    #[error("invalid training parameters: {0}")]
    InvalidParams(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub params: ForestParams,
    pub test_fraction: f64,
    pub split_seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            params: ForestParams::default(),
            test_fraction: DEFAULT_TEST_FRACTION,
            split_seed: DEFAULT_SPLIT_SEED,
        }
    }
}

/// Split, fit and evaluate. Same dataset + config → same artifact contents
/// (apart from `created_at`).
pub fn train(dataset: &Dataset, config: &TrainingConfig) -> Result<ModelArtifact, TrainingError> {
    if dataset.is_empty() {
        return Err(TrainingError::EmptyDataset);
    }
    if !(0.0..1.0).contains(&config.test_fraction) {
        return Err(TrainingError::InvalidParams(format!(
            "test fraction must be in [0, 1), got {}",
            config.test_fraction
        )));
    }

    let (train_set, test_set) = dataset.split(config.test_fraction, config.split_seed);
    if train_set.is_empty() {
        return Err(TrainingError::EmptyDataset);
    }

    tracing::info!(
        train_rows = train_set.len(),
        test_rows = test_set.len(),
        estimators = config.params.n_estimators,
        max_depth = config.params.max_depth,
        "Training random forest"
    );

    let forest = RandomForest::fit(&train_set.features, &train_set.labels, &config.params)?;

    let predicted: Vec<u8> = test_set
        .features
        .iter()
        .map(|row| forest.predict(&FeatureVector::from_values(*row)))
        .collect();
    let holdout_accuracy = accuracy(&predicted, &test_set.labels);

    tracing::info!("Model accuracy: {:.4}", holdout_accuracy);

    Ok(ModelArtifact {
        format: ARTIFACT_FORMAT,
        layout: LayoutInfo::current(),
        created_at: Utc::now(),
        params: config.params.clone(),
        split_seed: config.split_seed,
        train_rows: train_set.len(),
        test_rows: test_set.len(),
        holdout_accuracy,
        forest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::layout::FEATURE_COUNT;

    fn synthetic(n: usize) -> Dataset {
        let mut ds = Dataset::default();
        for i in 0..n {
            let glucose = 60.0 + ((i * 53) % 140) as f64;
            let bmi = 18.0 + ((i * 29) % 30) as f64;
            let age = 21.0 + ((i * 17) % 50) as f64;
            ds.features.push([(i % 9) as f64, glucose, 70.0, 25.0, 50.0, bmi, 0.4, age]);
            ds.labels.push(u8::from(glucose > 145.0 || (glucose > 120.0 && bmi > 33.0)));
        }
        ds
    }

    fn quick() -> TrainingConfig {
        TrainingConfig {
            params: ForestParams { n_estimators: 20, ..ForestParams::default() },
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_train_reports_holdout_accuracy() {
        let artifact = train(&synthetic(200), &quick()).unwrap();
        assert_eq!(artifact.train_rows, 160);
        assert_eq!(artifact.test_rows, 40);
        assert!(artifact.holdout_accuracy > 0.8);
        assert_eq!(artifact.forest.trees().len(), 20);
        assert_eq!(artifact.layout, LayoutInfo::current());
    }

    #[test]
    fn test_training_is_deterministic() {
        let ds = synthetic(150);
        let a = train(&ds, &quick()).unwrap();
        let b = train(&ds, &quick()).unwrap();
        assert_eq!(a.holdout_accuracy, b.holdout_accuracy);
        assert_eq!(a.forest, b.forest);
    }

    #[test]
    fn test_empty_dataset() {
        assert_eq!(train(&Dataset::default(), &quick()).unwrap_err(), TrainingError::EmptyDataset);
    }

    #[test]
    fn test_invalid_test_fraction() {
        let config = TrainingConfig { test_fraction: 1.0, ..quick() };
        assert!(matches!(train(&synthetic(10), &config), Err(TrainingError::InvalidParams(_))));
    }

    #[test]
    fn test_single_row_dataset_trains() {
        let ds = Dataset { features: vec![[1.0; FEATURE_COUNT]], labels: vec![1] };
        let config = TrainingConfig { test_fraction: 0.0, ..quick() };
        let artifact = train(&ds, &config).unwrap();
        assert_eq!(artifact.test_rows, 0);
    }
}
