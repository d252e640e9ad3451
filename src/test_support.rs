//! Shared fixtures for unit tests

use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ml::{train, Dataset, ForestParams, ModelArtifact, TrainingConfig, FEATURE_LAYOUT};
use crate::risk::RiskService;

/// Synthetic cohort in the layout of the diabetes CSV. The outcome depends
/// on glucose, BMI and age only.
pub fn synthetic_csv(rows: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut csv = FEATURE_LAYOUT.iter().map(|f| f.column).collect::<Vec<_>>().join(",");
    csv.push_str(",Outcome\n");

    for _ in 0..rows {
        let pregnancies = rng.gen_range(0..13) as f64;
        let glucose = rng.gen_range(60..200) as f64;
        let bp = rng.gen_range(40..100) as f64;
        let skin = rng.gen_range(0..50) as f64;
        let insulin = rng.gen_range(0..300) as f64;
        let bmi = (rng.gen_range(180..450) as f64) / 10.0;
        let dpf = (rng.gen_range(80..1500) as f64) / 1000.0;
        let age = rng.gen_range(21..71) as f64;

        let score = (glucose - 130.0) / 12.0 + (bmi - 32.0) / 10.0 + (age - 40.0) / 30.0;
        let outcome = u8::from(score > 0.0);

        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},{},{}",
            pregnancies, glucose, bp, skin, insulin, bmi, dpf, age, outcome
        );
    }
    csv
}

pub fn training_config() -> TrainingConfig {
    TrainingConfig {
        params: ForestParams { n_estimators: 100, ..ForestParams::default() },
        ..TrainingConfig::default()
    }
}

/// Artifact trained once per test binary
pub fn artifact() -> &'static ModelArtifact {
    static ARTIFACT: OnceLock<ModelArtifact> = OnceLock::new();
    ARTIFACT.get_or_init(|| {
        let dataset = Dataset::from_reader(synthetic_csv(600, 7).as_bytes()).expect("synthetic csv");
        train(&dataset, &training_config()).expect("training")
    })
}

pub fn trained_service() -> Arc<RiskService> {
    Arc::new(RiskService::from_artifact(artifact().clone()))
}
