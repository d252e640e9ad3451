//! Risk Scoring Service
//!
//! Built once at startup and shared read-only across requests. Holds the
//! classifier and, when available, the attribution engine. A service with no
//! classifier runs in degraded mode and rejects every scoring request.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::chart::{render_waterfall, ChartPayload};
use super::tier::{clinical_alert, RiskThresholds, RiskTier};
use crate::ml::{
    ArtifactError, Attribution, Classifier, Explainer, FeatureVector, FieldError, ModelArtifact,
    RawFields, TreeExplainer,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] FieldError),

    #[error("Model not loaded.")]
    ModelUnavailable,

    #[error("Error during prediction: {0}")]
    Internal(String),
}

impl ScoringError {
    /// Offending field for input errors
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ScoringError::InvalidInput(e) => Some(e.field()),
            _ => None,
        }
    }
}

/// Outcome of one scoring request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringResult {
    /// Positive-class probability as returned by the model
    pub probability: f64,
    /// Probability rounded to 2 decimals
    pub probability_rounded: f64,
    /// Probability as a percentage, rounded to 2 decimals
    pub percentage: f64,
    /// Discrete classifier output
    pub prediction: u8,
    pub tier: RiskTier,
    pub label: &'static str,
    pub color: &'static str,
    pub advice: &'static str,
    pub clinical_alert: bool,
    pub attribution: Option<Attribution>,
    pub chart: Option<ChartPayload>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Clone)]
pub struct RiskService {
    classifier: Option<Arc<dyn Classifier>>,
    explainer: Option<Arc<dyn Explainer>>,
    thresholds: RiskThresholds,
}

impl std::fmt::Debug for RiskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskService")
            .field("classifier", &self.classifier.as_ref().map(|c| c.describe()))
            .field("explainer", &self.explainer.is_some())
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

impl RiskService {
    pub fn new(classifier: Arc<dyn Classifier>, explainer: Option<Arc<dyn Explainer>>) -> Self {
        Self {
            classifier: Some(classifier),
            explainer,
            thresholds: RiskThresholds::CANONICAL,
        }
    }

    /// Degraded service: every request fails with `ModelUnavailable`
    pub fn unavailable() -> Self {
        Self {
            classifier: None,
            explainer: None,
            thresholds: RiskThresholds::CANONICAL,
        }
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        let forest = Arc::new(artifact.forest);

        let explainer: Option<Arc<dyn Explainer>> = match TreeExplainer::new(forest.clone()) {
            Ok(explainer) => Some(Arc::new(explainer)),
            Err(e) => {
                tracing::error!("Error initializing attribution engine: {}", e);
                None
            }
        };

        Self::new(forest, explainer)
    }

    /// Load the artifact at `path`; a missing or unreadable file yields a
    /// degraded service instead of an error
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match ModelArtifact::load(path) {
            Ok(artifact) => {
                tracing::info!(
                    trees = artifact.forest.trees().len(),
                    holdout_accuracy = artifact.holdout_accuracy,
                    trained_at = %artifact.created_at,
                    "Model loaded from {}",
                    path.display()
                );
                Self::from_artifact(artifact)
            }
            Err(ArtifactError::NotFound(p)) => {
                tracing::warn!("Warning: model artifact {} not found! Predictions are disabled", p.display());
                Self::unavailable()
            }
            Err(e) => {
                tracing::error!("Failed to load model artifact {}: {}", path.display(), e);
                Self::unavailable()
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn has_explainer(&self) -> bool {
        self.explainer.is_some()
    }

    pub fn describe(&self) -> String {
        self.classifier
            .as_ref()
            .map(|c| c.describe())
            .unwrap_or_else(|| "None".to_string())
    }

    /// Score one submission
    pub fn score(&self, raw: &RawFields) -> Result<ScoringResult, ScoringError> {
        let classifier = self.classifier.as_ref().ok_or(ScoringError::ModelUnavailable)?;

        let features = FeatureVector::from_raw(raw)?;

        let prediction = classifier.predict(&features);
        let probability = classifier.predict_proba(&features)[1];
        if !probability.is_finite() {
            return Err(ScoringError::Internal("classifier returned a non-finite probability".into()));
        }

        let tier = self.thresholds.classify(probability);

        let attribution = self.explain(&features);
        let chart = attribution.as_ref().and_then(|a| match render_waterfall(a) {
            Ok(chart) => Some(chart),
            Err(e) => {
                tracing::warn!("Attribution chart skipped: {}", e);
                None
            }
        });

        tracing::debug!(
            probability,
            prediction,
            tier = tier.label(),
            chart = chart.is_some(),
            "Scored submission"
        );

        Ok(ScoringResult {
            probability,
            probability_rounded: round2(probability),
            percentage: round2(probability * 100.0),
            prediction,
            tier,
            label: tier.label(),
            color: tier.color(),
            advice: tier.advice(),
            clinical_alert: clinical_alert(&features),
            attribution,
            chart,
        })
    }

    fn explain(&self, features: &FeatureVector) -> Option<Attribution> {
        let explainer = self.explainer.as_ref()?;
        match explainer.explain(features) {
            Ok(attribution) => Some(attribution),
            Err(e) => {
                tracing::warn!("Attribution failed, omitting chart: {}", e);
                None
            }
        }
    }

    /// Score on the blocking pool. A panic inside scoring is logged and
    /// reported as `Internal`.
    pub async fn score_blocking(self: Arc<Self>, raw: RawFields) -> Result<ScoringResult, ScoringError> {
        match tokio::task::spawn_blocking(move || self.score(&raw)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Scoring task failed: {}", e);
                Err(ScoringError::Internal("unexpected failure while scoring".into()))
            }
        }
    }
}
