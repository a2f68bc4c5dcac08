//! Churn classifier: frozen logistic regression over scaled customer features.
//!
//! The model and scaler are shipped as JSON artifacts and loaded once at startup.
//! Inference is pure CPU work with no I/O, so handlers call it synchronously.
//!
//! Feature order is fixed: tenure, monthly charges, total charges, contract code,
//! payment code. Categorical attributes are mapped to integer codes with
//! [`encode_contract`] and [`encode_payment`] before scaling.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// Number of features the model consumes.
pub const FEATURE_COUNT: usize = 5;

/// Probability threshold above which a customer is classified as likely to churn.
pub const CHURN_THRESHOLD: f64 = 0.5;

/// Customer attributes submitted for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerProfile {
    pub tenure: f64,
    pub monthly_charges: f64,
    pub total_charges: f64,
    pub contract_type: String,
    pub payment_method: String,
}

/// Result of scoring a single customer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionOutcome {
    /// 1 = likely to churn, 0 = likely to stay
    pub prediction: i32,
    /// Churn probability in [0, 1]
    pub probability: f64,
    /// Derived risk score in [0, 100], see [`risk_score`]
    pub risk_score: i32,
}

/// Scoring seam. Handlers and the bulk importer depend on this trait rather
/// than the concrete model so tests can substitute deterministic classifiers.
pub trait Classifier: Send + Sync {
    fn predict(&self, profile: &CustomerProfile) -> PredictionOutcome;
}

/// The single place a probability becomes a risk score.
pub fn risk_score(probability: f64) -> i32 {
    (probability * 100.0).round() as i32
}

/// Map a contract label to its model code. Unknown labels fall back to 0
/// (month-to-month), matching how the model was trained.
pub fn encode_contract(label: &str) -> i32 {
    match label {
        "Month-to-month" => 0,
        "One year" => 1,
        "Two year" => 2,
        _ => 0,
    }
}

/// Map a payment method label to its model code. Unknown labels fall back to 0.
pub fn encode_payment(label: &str) -> i32 {
    match label {
        "Electronic check" => 0,
        "Mailed check" => 1,
        "Bank transfer (automatic)" => 2,
        "Credit card (automatic)" => 3,
        "UPI" => 4,
        "Net Banking" => 5,
        "Digital Wallet" => 6,
        _ => 0,
    }
}

/// Logistic regression weights, frozen at training time.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default)]
    pub feature_names: Vec<String>,
}

/// Standard scaler parameters, frozen at training time.
#[derive(Debug, Clone, Deserialize)]
pub struct ScalerArtifact {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Frozen logistic regression classifier.
#[derive(Debug, Clone)]
pub struct ChurnModel {
    coefficients: Vec<f64>,
    intercept: f64,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl ChurnModel {
    /// Load model and scaler artifacts from disk, validating dimensions.
    pub fn load(model_path: &Path, scaler_path: &Path) -> anyhow::Result<Self> {
        let model_raw = std::fs::read_to_string(model_path)
            .with_context(|| format!("reading model artifact {}", model_path.display()))?;
        let model: ModelArtifact =
            serde_json::from_str(&model_raw).with_context(|| format!("parsing model artifact {}", model_path.display()))?;

        let scaler_raw = std::fs::read_to_string(scaler_path)
            .with_context(|| format!("reading scaler artifact {}", scaler_path.display()))?;
        let scaler: ScalerArtifact =
            serde_json::from_str(&scaler_raw).with_context(|| format!("parsing scaler artifact {}", scaler_path.display()))?;

        Self::from_artifacts(model, scaler)
    }

    /// Build a classifier from already-parsed artifacts.
    pub fn from_artifacts(model: ModelArtifact, scaler: ScalerArtifact) -> anyhow::Result<Self> {
        if model.coefficients.len() != FEATURE_COUNT {
            anyhow::bail!(
                "model artifact has {} coefficients, expected {}",
                model.coefficients.len(),
                FEATURE_COUNT
            );
        }
        if scaler.mean.len() != FEATURE_COUNT || scaler.scale.len() != FEATURE_COUNT {
            anyhow::bail!(
                "scaler artifact has {} mean / {} scale entries, expected {}",
                scaler.mean.len(),
                scaler.scale.len(),
                FEATURE_COUNT
            );
        }
        if scaler.scale.iter().any(|s| *s == 0.0) {
            anyhow::bail!("scaler artifact contains a zero scale entry");
        }

        Ok(Self {
            coefficients: model.coefficients,
            intercept: model.intercept,
            mean: scaler.mean,
            scale: scaler.scale,
        })
    }

    fn features(profile: &CustomerProfile) -> [f64; FEATURE_COUNT] {
        [
            profile.tenure,
            profile.monthly_charges,
            profile.total_charges,
            f64::from(encode_contract(&profile.contract_type)),
            f64::from(encode_payment(&profile.payment_method)),
        ]
    }
}

impl Classifier for ChurnModel {
    fn predict(&self, profile: &CustomerProfile) -> PredictionOutcome {
        let features = Self::features(profile);

        let mut z = self.intercept;
        for (i, x) in features.iter().enumerate() {
            let scaled = (x - self.mean[i]) / self.scale[i];
            z += self.coefficients[i] * scaled;
        }

        let probability = sigmoid(z);
        let prediction = i32::from(probability >= CHURN_THRESHOLD);

        PredictionOutcome {
            prediction,
            probability,
            risk_score: risk_score(probability),
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
