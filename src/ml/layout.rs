//! Feature Layout - Centralized Feature Definition
//!
//! **This file controls the feature schema shared by training and serving.**
//!
//! ## Rules:
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! Artifacts record the layout hash they were trained with; the server
//! refuses to load an artifact whose hash differs from the current one.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// One feature: form key, dataset column and display label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSpec {
    /// Key used by the HTML form and the JSON API
    pub key: &'static str,
    /// Header of the column in the training CSV
    pub column: &'static str,
    /// Label shown on charts and result pages
    pub label: &'static str,
}

/// Total number of features
pub const FEATURE_COUNT: usize = 8;

/// Features in the exact order they appear in the vector
pub const FEATURE_LAYOUT: [FeatureSpec; FEATURE_COUNT] = [
    FeatureSpec { key: "pregnancies", column: "Pregnancies", label: "Pregnancies" },
    FeatureSpec { key: "glucose", column: "Glucose", label: "Glucose" },
    FeatureSpec { key: "bp", column: "BloodPressure", label: "Blood Pressure" },
    FeatureSpec { key: "skin", column: "SkinThickness", label: "Skin Thickness" },
    FeatureSpec { key: "insulin", column: "Insulin", label: "Insulin" },
    FeatureSpec { key: "bmi", column: "BMI", label: "BMI" },
    FeatureSpec { key: "dpf", column: "DiabetesPedigreeFunction", label: "Diabetes Pedigree" },
    FeatureSpec { key: "age", column: "Age", label: "Age" },
];

/// Binary label column in the training CSV
pub const OUTCOME_COLUMN: &str = "Outcome";

pub const GLUCOSE: usize = 1;
pub const BMI: usize = 5;

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Compute CRC32 hash of the feature layout
pub fn layout_hash() -> u32 {
    let mut hasher = Hasher::new();

    hasher.update(&[FEATURE_VERSION]);

    for feature in FEATURE_LAYOUT.iter() {
        hasher.update(feature.key.as_bytes());
        hasher.update(&[0]);
        hasher.update(feature.column.as_bytes());
        hasher.update(&[0]);
    }

    hasher.finalize()
}

/// Layout information stored alongside model artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_keys: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_keys: FEATURE_LAYOUT.iter().map(|f| f.key.to_string()).collect(),
        }
    }

    /// Check this layout against the one compiled into the binary
    pub fn validate(&self) -> Result<(), LayoutMismatchError> {
        let current_hash = layout_hash();

        if self.version != FEATURE_VERSION || self.hash != current_hash {
            return Err(LayoutMismatchError {
                expected_version: FEATURE_VERSION,
                expected_hash: current_hash,
                actual_version: self.version,
                actual_hash: self.hash,
            });
        }

        Ok(())
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "Feature layout mismatch: expected v{expected_version} (hash: {expected_hash:08x}), got v{actual_version} (hash: {actual_hash:08x})"
)]
pub struct LayoutMismatchError {
    pub expected_version: u8,
    pub expected_hash: u32,
    pub actual_version: u8,
    pub actual_hash: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_count() {
        assert_eq!(FEATURE_LAYOUT.len(), FEATURE_COUNT);
        assert_eq!(FEATURE_LAYOUT[GLUCOSE].key, "glucose");
        assert_eq!(FEATURE_LAYOUT[BMI].key, "bmi");
    }

    #[test]
    fn test_layout_hash_consistency() {
        assert_eq!(layout_hash(), layout_hash());
        assert_ne!(layout_hash(), 0);
    }

    #[test]
    fn test_validate_layout() {
        assert!(LayoutInfo::current().validate().is_ok());

        let newer = LayoutInfo { version: FEATURE_VERSION + 1, ..LayoutInfo::current() };
        assert!(newer.validate().is_err());

        let other = LayoutInfo { hash: layout_hash().wrapping_add(1), ..LayoutInfo::current() };
        let err = other.validate().unwrap_err();
        assert_eq!(err.expected_hash, layout_hash());
    }
}
