//! Database models for prediction records.

use crate::ml::{CustomerProfile, PredictionOutcome};
use crate::types::{PredictionId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a prediction record.
///
/// `risk_score` is always derived from `probability` via [`crate::ml::risk_score`];
/// the constructor enforces this so no caller can invent a divergent score.
#[derive(Debug, Clone)]
pub struct PredictionCreateDBRequest {
    pub user_id: UserId,
    pub customer_name: String,
    pub tenure: f64,
    pub monthly_charges: f64,
    pub total_charges: f64,
    pub contract_type: String,
    pub payment_method: String,
    pub prediction: i32,
    pub probability: f64,
    pub risk_score: i32,
}

impl PredictionCreateDBRequest {
    pub fn new(user_id: UserId, customer_name: String, profile: CustomerProfile, outcome: PredictionOutcome) -> Self {
        Self {
            user_id,
            customer_name,
            tenure: profile.tenure,
            monthly_charges: profile.monthly_charges,
            total_charges: profile.total_charges,
            contract_type: profile.contract_type,
            payment_method: profile.payment_method,
            prediction: outcome.prediction,
            probability: outcome.probability,
            risk_score: outcome.risk_score,
        }
    }
}

/// Database response for a prediction record
#[derive(Debug, Clone)]
pub struct PredictionDBResponse {
    pub id: PredictionId,
    pub user_id: UserId,
    pub customer_name: String,
    pub tenure: f64,
    pub monthly_charges: f64,
    pub total_charges: f64,
    pub contract_type: String,
    pub payment_method: String,
    pub prediction: i32,
    pub probability: f64,
    pub risk_score: i32,
    pub created_at: DateTime<Utc>,
}
