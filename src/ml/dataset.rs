//! Training dataset loading and splitting

use std::io::Read;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;

use super::layout::{FEATURE_COUNT, FEATURE_LAYOUT, OUTCOME_COLUMN};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("cannot read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset is missing column '{0}'")]
    MissingColumn(&'static str),

    #[error("line {line}: outcome must be 0 or 1, got {value}")]
    InvalidOutcome { line: usize, value: f64 },

    #[error("line {line}: column '{column}' is not a finite number")]
    InvalidValue { line: usize, column: &'static str },
}

/// Patient record as it appears in the CSV.
/// Header names are spelled out for serde since they are capitalized.
#[derive(Debug, Clone, Deserialize)]
struct PatientRecord {
    #[serde(rename = "Pregnancies")]
    pregnancies: f64,

    #[serde(rename = "Glucose")]
    glucose: f64,

    #[serde(rename = "BloodPressure")]
    blood_pressure: f64,

    #[serde(rename = "SkinThickness")]
    skin_thickness: f64,

    #[serde(rename = "Insulin")]
    insulin: f64,

    #[serde(rename = "BMI")]
    bmi: f64,

    #[serde(rename = "DiabetesPedigreeFunction")]
    pedigree: f64,

    #[serde(rename = "Age")]
    age: f64,

    /// 1 = diabetic within five years
    #[serde(rename = "Outcome")]
    outcome: f64,
}

impl PatientRecord {
    fn features(&self) -> [f64; FEATURE_COUNT] {
        [
            self.pregnancies,
            self.glucose,
            self.blood_pressure,
            self.skin_thickness,
            self.insulin,
            self.bmi,
            self.pedigree,
            self.age,
        ]
    }
}

/// Feature rows with binary labels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub features: Vec<[f64; FEATURE_COUNT]>,
    pub labels: Vec<u8>,
}

impl Dataset {
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let headers = rdr.headers()?.clone();
        let has = |name: &str| headers.iter().any(|h| h == name);
        for feature in FEATURE_LAYOUT.iter() {
            if !has(feature.column) {
                return Err(DatasetError::MissingColumn(feature.column));
            }
        }
        if !has(OUTCOME_COLUMN) {
            return Err(DatasetError::MissingColumn(OUTCOME_COLUMN));
        }

        let mut dataset = Dataset::default();
        for (row, result) in rdr.deserialize::<PatientRecord>().enumerate() {
            // header is line 1
            let line = row + 2;
            let record = result?;

            let features = record.features();
            if let Some(i) = features.iter().position(|v| !v.is_finite()) {
                return Err(DatasetError::InvalidValue { line, column: FEATURE_LAYOUT[i].column });
            }

            let label = match record.outcome {
                o if o == 0.0 => 0,
                o if o == 1.0 => 1,
                value => return Err(DatasetError::InvalidOutcome { line, value }),
            };

            dataset.features.push(features);
            dataset.labels.push(label);
        }

        tracing::info!(rows = dataset.len(), positives = dataset.positives(), "Dataset loaded");
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    /// Seeded shuffle split; the held-out part gets `ceil(n * test_fraction)` rows
    pub fn split(&self, test_fraction: f64, seed: u64) -> (Dataset, Dataset) {
        let n = self.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));

        let n_test = ((n as f64) * test_fraction.clamp(0.0, 1.0)).ceil() as usize;
        let (test_idx, train_idx) = order.split_at(n_test.min(n));

        (self.subset(train_idx), self.subset(test_idx))
    }

    fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i]).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Fraction of matching labels
pub fn accuracy(predicted: &[u8], truth: &[u8]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = predicted.iter().zip(truth.iter()).filter(|(p, t)| p == t).count();
    correct as f64 / truth.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Pregnancies,Glucose,BloodPressure,SkinThickness,Insulin,BMI,DiabetesPedigreeFunction,Age,Outcome";

    #[test]
    fn test_load_csv() {
        let csv = format!(
            "{}\n6,148,72,35,0,33.6,0.627,50,1\n1,85,66,29,0,26.6,0.351,31,0\n",
            HEADER
        );
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.labels, vec![1, 0]);
        assert_eq!(ds.features[1], [1.0, 85.0, 66.0, 29.0, 0.0, 26.6, 0.351, 31.0]);
        assert_eq!(ds.positives(), 1);
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let csv = "Outcome,Age,DiabetesPedigreeFunction,BMI,Insulin,SkinThickness,BloodPressure,Glucose,Pregnancies\n1,50,0.627,33.6,0,35,72,148,6\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(ds.features[0], [6.0, 148.0, 72.0, 35.0, 0.0, 33.6, 0.627, 50.0]);
    }

    #[test]
    fn test_missing_column() {
        let csv = "Pregnancies,Glucose,BloodPressure,SkinThickness,Insulin,BMI,Age,Outcome\n1,2,3,4,5,6,7,0\n";
        let err = Dataset::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn("DiabetesPedigreeFunction")));
    }

    #[test]
    fn test_invalid_outcome_reports_line() {
        let csv = format!("{}\n1,85,66,29,0,26.6,0.351,31,0\n1,85,66,29,0,26.6,0.351,31,2\n", HEADER);
        let err = Dataset::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidOutcome { line: 3, .. }));
    }

    #[test]
    fn test_non_numeric_cell_is_error() {
        let csv = format!("{}\n1,high,66,29,0,26.6,0.351,31,0\n", HEADER);
        assert!(matches!(Dataset::from_reader(csv.as_bytes()), Err(DatasetError::Csv(_))));
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let ds = Dataset {
            features: (0..10).map(|i| [i as f64; FEATURE_COUNT]).collect(),
            labels: (0..10).map(|i| (i % 2) as u8).collect(),
        };

        let (train, test) = ds.split(0.2, 42);
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        let (train2, test2) = ds.split(0.2, 42);
        assert_eq!(train, train2);
        assert_eq!(test, test2);

        // every row lands in exactly one partition
        let mut seen: Vec<f64> = train.features.iter().chain(test.features.iter()).map(|r| r[0]).collect();
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, (0..10).map(|i| i as f64).collect::<Vec<_>>());

        // ceil(7 * 0.2) = 2
        let small = Dataset { features: ds.features[..7].to_vec(), labels: ds.labels[..7].to_vec() };
        assert_eq!(small.split(0.2, 1).1.len(), 2);
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[1, 0, 1, 1], &[1, 0, 0, 1]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }
}
