//! Feature Vector - model input in layout order

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::layout::{FEATURE_COUNT, FEATURE_LAYOUT};

/// Raw submitted value: form fields arrive as text, JSON may carry numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    /// Any other JSON value (null, bool, array, object)
    Other(serde_json::Value),
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// Submitted fields keyed by form key
pub type RawFields = HashMap<String, RawValue>;

/// Why a field could not be coerced
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("field '{0}' is missing")]
    Missing(&'static str),

    #[error("field '{0}' is not a number")]
    NotNumeric(&'static str),

    #[error("field '{0}' must not be negative")]
    Negative(&'static str),
}

impl FieldError {
    /// Form key of the offending field
    pub fn field(&self) -> &'static str {
        match self {
            FieldError::Missing(f) | FieldError::NotNumeric(f) | FieldError::Negative(f) => f,
        }
    }
}

/// Fixed-order numeric feature vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Coerce raw fields in layout order; the first bad field wins
    pub fn from_raw(raw: &RawFields) -> Result<Self, FieldError> {
        let mut values = [0.0f64; FEATURE_COUNT];

        for (slot, feature) in values.iter_mut().zip(FEATURE_LAYOUT.iter()) {
            let value = match raw.get(feature.key) {
                None => return Err(FieldError::Missing(feature.key)),
                Some(RawValue::Number(n)) => *n,
                Some(RawValue::Text(s)) => {
                    let s = s.trim();
                    if s.is_empty() {
                        return Err(FieldError::Missing(feature.key));
                    }
                    s.parse::<f64>().map_err(|_| FieldError::NotNumeric(feature.key))?
                }
                Some(RawValue::Other(_)) => return Err(FieldError::NotNumeric(feature.key)),
            };

            if !value.is_finite() {
                return Err(FieldError::NotNumeric(feature.key));
            }
            if value < 0.0 {
                return Err(FieldError::Negative(feature.key));
            }

            *slot = value;
        }

        Ok(Self { values })
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Raw fields as the form would submit them
    pub fn to_raw(&self) -> RawFields {
        FEATURE_LAYOUT
            .iter()
            .zip(self.values.iter())
            .map(|(f, v)| (f.key.to_string(), RawValue::Number(*v)))
            .collect()
    }
}

impl From<[f64; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f64; FEATURE_COUNT]) -> Self {
        Self::from_values(values)
    }
}
