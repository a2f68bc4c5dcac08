//! API request/response models for prediction records.

use crate::db::handlers::predictions::PredictionFilter;
use crate::db::models::predictions::PredictionDBResponse;
use crate::import::RowReport;
use crate::ml::CustomerProfile;
use crate::types::{PredictionId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Customer attributes submitted for a single prediction
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PredictionCreate {
    pub customer_name: String,
    pub tenure: f64,
    pub monthly_charges: f64,
    pub total_charges: f64,
    pub contract_type: String,
    pub payment_method: String,
}

impl PredictionCreate {
    pub fn profile(&self) -> CustomerProfile {
        CustomerProfile {
            tenure: self.tenure,
            monthly_charges: self.monthly_charges,
            total_charges: self.total_charges,
            contract_type: self.contract_type.clone(),
            payment_method: self.payment_method.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PredictionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PredictionId,
    pub customer_name: String,
    pub tenure: f64,
    pub monthly_charges: f64,
    pub total_charges: f64,
    pub contract_type: String,
    pub payment_method: String,
    /// 1 = likely to churn, 0 = likely to stay
    pub prediction: i32,
    pub probability: f64,
    pub risk_score: i32,
    pub created_at: DateTime<Utc>,
}

impl From<PredictionDBResponse> for PredictionResponse {
    fn from(db: PredictionDBResponse) -> Self {
        Self {
            id: db.id,
            customer_name: db.customer_name,
            tenure: db.tenure,
            monthly_charges: db.monthly_charges,
            total_charges: db.total_charges,
            contract_type: db.contract_type,
            payment_method: db.payment_method,
            prediction: db.prediction,
            probability: db.probability,
            risk_score: db.risk_score,
            created_at: db.created_at,
        }
    }
}

/// Query parameters for the history view
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct HistoryQuery {
    /// Requested page (1-based; out-of-range or non-numeric values are resolved, not rejected)
    #[param(value_type = Option<i64>)]
    pub page: Option<String>,
    /// Filter by outcome: "1" for churn, "0" for stay
    pub prediction: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`
    pub from_date: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`
    pub to_date: Option<String>,
}

impl HistoryQuery {
    /// The requested page, treating a missing or non-numeric value as page 1.
    pub fn page(&self) -> i64 {
        self.page.as_deref().and_then(|raw| raw.parse().ok()).unwrap_or(1)
    }

    /// Translate query parameters into a repository filter.
    ///
    /// Malformed dates are skipped with a warning rather than failing the
    /// request; an unrecognized prediction value is ignored.
    pub fn to_filter(&self, owner: UserId) -> (PredictionFilter, Vec<String>) {
        let mut warnings = Vec::new();

        let prediction = match self.prediction.as_deref() {
            Some("0") => Some(0),
            Some("1") => Some(1),
            _ => None,
        };

        let from_date = self.from_date.as_deref().and_then(|raw| match parse_day(raw) {
            Some(day) => Some(day),
            None => {
                warnings.push("Invalid from date format".to_string());
                None
            }
        });

        let to_date_exclusive = self.to_date.as_deref().and_then(|raw| match parse_day(raw) {
            // Inclusive upper bound: compare against the start of the next day
            Some(day) => Some(day + chrono::Duration::days(1)),
            None => {
                warnings.push("Invalid to date format".to_string());
                None
            }
        });

        let filter = PredictionFilter {
            user_id: Some(owner),
            prediction,
            from_date,
            to_date_exclusive,
            skip: 0,
            limit: 0,
        };
        (filter, warnings)
    }
}

fn parse_day(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// One page of prediction history
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub data: Vec<PredictionResponse>,
    /// The page actually served (after out-of-range resolution)
    pub page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    /// Non-fatal problems with the request, e.g. ignored malformed dates
    pub warnings: Vec<String>,
}

/// Result of a bulk CSV import
#[derive(Debug, Serialize, ToSchema)]
pub struct ImportResponse {
    pub success_count: usize,
    pub error_count: usize,
    /// Per-row results in input order
    pub rows: Vec<RowReport>,
}

/// Recipient for an emailed prediction report
#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailReportRequest {
    pub recipient: String,
}
