//! API response models for statistics and trends.

use crate::db::handlers::analytics::{DailyTrendRow, SystemOverview, UserActivityBreakdown};
use crate::db::handlers::model_metrics::ModelMetricsRow;
use crate::db::handlers::predictions::{MonthlyTrendRow, PredictionStats};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Per-user prediction stats
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PredictionStatsResponse {
    pub total_predictions: i64,
    pub churn_predictions: i64,
    pub no_churn_predictions: i64,
    pub avg_probability: f64,
}

impl From<PredictionStats> for PredictionStatsResponse {
    fn from(stats: PredictionStats) -> Self {
        Self {
            total_predictions: stats.total,
            churn_predictions: stats.churn,
            no_churn_predictions: stats.no_churn,
            avg_probability: stats.avg_probability,
        }
    }
}

/// One month's counts in a trend series
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonthlyTrendPoint {
    /// `YYYY-MM`
    pub month: String,
    pub total: i64,
    pub churn: i64,
}

impl From<MonthlyTrendRow> for MonthlyTrendPoint {
    fn from(row: MonthlyTrendRow) -> Self {
        Self {
            month: row.month,
            total: row.total,
            churn: row.churn,
        }
    }
}

/// One day's counts in a trend series
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DailyTrendPoint {
    pub day: NaiveDate,
    pub total: i64,
    pub churn: i64,
}

impl From<DailyTrendRow> for DailyTrendPoint {
    fn from(row: DailyTrendRow) -> Self {
        Self {
            day: row.day,
            total: row.total,
            churn: row.churn,
        }
    }
}

/// Evaluation metrics of the deployed classifier
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModelMetricsResponse {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub updated_at: DateTime<Utc>,
}

impl From<ModelMetricsRow> for ModelMetricsResponse {
    fn from(row: ModelMetricsRow) -> Self {
        Self {
            accuracy: row.accuracy,
            precision: row.precision_score,
            recall: row.recall,
            f1_score: row.f1_score,
            updated_at: row.updated_at,
        }
    }
}

/// Admin system overview
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOverviewResponse {
    pub total_users: i64,
    pub active_users: i64,
    pub total_predictions: i64,
    pub churn_predictions: i64,
    pub model_metrics: Option<ModelMetricsResponse>,
}

impl AdminOverviewResponse {
    pub fn new(overview: SystemOverview, metrics: Option<ModelMetricsRow>) -> Self {
        Self {
            total_users: overview.total_users,
            active_users: overview.active_users,
            total_predictions: overview.total_predictions,
            churn_predictions: overview.churn_predictions,
            model_metrics: metrics.map(ModelMetricsResponse::from),
        }
    }
}

/// Account breakdown by state and role
#[derive(Debug, Serialize, ToSchema)]
pub struct UserActivityResponse {
    pub active: i64,
    pub inactive: i64,
    pub admins: i64,
}

impl From<UserActivityBreakdown> for UserActivityResponse {
    fn from(b: UserActivityBreakdown) -> Self {
        Self {
            active: b.active,
            inactive: b.inactive,
            admins: b.admins,
        }
    }
}
