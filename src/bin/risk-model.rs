//! Model operations: train the classifier artifact and score single patients
//! from the command line.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diabetes_risk::ml::{train, Dataset, ForestParams, ModelArtifact, RawFields, RawValue, TrainingConfig};
use diabetes_risk::risk::{RiskService, CLINICAL_ALERT_MESSAGE};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a random forest on a diabetes CSV and save the artifact
    Train {
        /// CSV with the eight feature columns and Outcome
        #[arg(long, default_value = "diabetes.csv")]
        data: PathBuf,

        /// Where to write the model artifact
        #[arg(long, default_value = "model.json")]
        out: PathBuf,

        #[arg(long, default_value_t = 300)]
        estimators: usize,

        #[arg(long, default_value_t = 6)]
        max_depth: usize,

        /// Seed for both the train/test split and the forest
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Score one patient and print the explanation
    Predict {
        #[arg(long, default_value = "model.json")]
        model: PathBuf,

        #[command(flatten)]
        patient: Patient,

        /// Also write the contribution chart as SVG
        #[arg(long)]
        chart: Option<PathBuf>,
    },
}

#[derive(Args)]
struct Patient {
    #[arg(long)]
    pregnancies: f64,
    #[arg(long)]
    glucose: f64,
    #[arg(long)]
    bp: f64,
    #[arg(long)]
    skin: f64,
    #[arg(long)]
    insulin: f64,
    #[arg(long)]
    bmi: f64,
    #[arg(long)]
    dpf: f64,
    #[arg(long)]
    age: f64,
}

impl Patient {
    fn to_raw(&self) -> RawFields {
        [
            ("pregnancies", self.pregnancies),
            ("glucose", self.glucose),
            ("bp", self.bp),
            ("skin", self.skin),
            ("insulin", self.insulin),
            ("bmi", self.bmi),
            ("dpf", self.dpf),
            ("age", self.age),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), RawValue::from(v)))
        .collect()
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "diabetes_risk=info,risk_model=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Command::Train { data, out, estimators, max_depth, seed } => {
            let dataset = Dataset::from_csv_path(&data)
                .with_context(|| format!("Failed to read dataset {}", data.display()))?;

            let config = TrainingConfig {
                params: ForestParams {
                    n_estimators: estimators,
                    max_depth,
                    seed,
                    ..ForestParams::default()
                },
                split_seed: seed,
                ..TrainingConfig::default()
            };

            let artifact = train(&dataset, &config).context("Training failed")?;
            artifact
                .save(&out)
                .with_context(|| format!("Failed to write {}", out.display()))?;

            println!("Model accuracy: {:.4}", artifact.holdout_accuracy);
            println!("Saved {} trees to {}", artifact.forest.trees().len(), out.display());
        }

        Command::Predict { model, patient, chart } => {
            let artifact = ModelArtifact::load(&model)
                .with_context(|| format!("Failed to load model {}", model.display()))?;
            let service = RiskService::from_artifact(artifact);

            let result = service.score(&patient.to_raw())?;

            println!("Probability: {:.2}%", result.percentage);
            println!("Risk: {}", result.label);
            println!("{}", result.advice);
            if result.clinical_alert {
                println!("ALERT: {}", CLINICAL_ALERT_MESSAGE);
            }

            match &result.attribution {
                Some(attribution) => {
                    println!();
                    println!("Base value: {:.4}", attribution.base_value);
                    for c in attribution.ranked() {
                        println!("  {:<28} {:>8} {:+.4}", c.label, c.value, c.contribution);
                    }
                }
                None => println!("Explanation unavailable."),
            }

            if let Some(path) = chart {
                let svg = result
                    .chart
                    .as_ref()
                    .and_then(|c| c.decode())
                    .context("No chart was produced for this prediction")?;
                std::fs::write(&path, svg)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Chart written to {}", path.display());
            }
        }
    }

    Ok(())
}
