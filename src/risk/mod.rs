//! Risk scoring pipeline
//!
//! raw fields → feature vector → probability → tier → attribution → chart

pub mod tier;
pub mod chart;
pub mod service;


pub use tier::{clinical_alert, RiskThresholds, RiskTier, CLINICAL_ALERT_MESSAGE};
pub use chart::{render_waterfall, ChartError, ChartPayload};
pub use service::{RiskService, ScoringError, ScoringResult};
