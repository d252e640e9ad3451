//! Risk Tier - canonical probability thresholds
//!
//! Every entry point (web form, JSON API, CLI) maps probability to tier
//! through `RiskThresholds::CANONICAL`.

use serde::{Deserialize, Serialize};

use crate::ml::layout::{BMI, GLUCOSE};
use crate::ml::FeatureVector;

/// Tier boundaries: `p < moderate` → LOW, `moderate <= p < high` → MODERATE,
/// `p >= high` → HIGH
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub moderate: f64,
    pub high: f64,
}

impl RiskThresholds {
    pub const CANONICAL: RiskThresholds = RiskThresholds { moderate: 0.3, high: 0.6 };

    pub fn classify(&self, probability: f64) -> RiskTier {
        if probability >= self.high {
            RiskTier::High
        } else if probability >= self.moderate {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        }
    }
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self::CANONICAL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "LOW RISK",
            Self::Moderate => "MODERATE RISK",
            Self::High => "HIGH RISK",
        }
    }

    /// Display color class
    pub fn color(&self) -> &'static str {
        match self {
            Self::Low => "success",
            Self::Moderate => "warning",
            Self::High => "danger",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            Self::Low => "Healthy metabolic indicators. Maintain current lifestyle.",
            Self::Moderate => "Lifestyle modifications and monitoring recommended.",
            Self::High => "Strong indicators detected. Medical consultation advised.",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Glucose above this raises a clinical alert regardless of tier
pub const ALERT_GLUCOSE: f64 = 180.0;

/// BMI above this raises a clinical alert regardless of tier
pub const ALERT_BMI: f64 = 35.0;

pub const CLINICAL_ALERT_MESSAGE: &str =
    "Clinical Alert: Extremely high metabolic indicators detected. Immediate medical screening recommended.";

/// Hard clinical safety rule on raw measurements
pub fn clinical_alert(features: &FeatureVector) -> bool {
    let glucose = features.get(GLUCOSE).unwrap_or(0.0);
    let bmi = features.get(BMI).unwrap_or(0.0);
    glucose > ALERT_GLUCOSE || bmi > ALERT_BMI
}
