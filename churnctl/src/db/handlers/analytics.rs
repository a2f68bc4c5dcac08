//! Database queries for admin-facing aggregate statistics.

use crate::db::errors::Result;
use chrono::NaiveDate;
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

/// System-wide totals shown on the admin overview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemOverview {
    pub total_users: i64,
    pub active_users: i64,
    pub total_predictions: i64,
    pub churn_predictions: i64,
}

/// One day's prediction counts across all users
#[derive(Debug, Clone, FromRow)]
pub struct DailyTrendRow {
    pub day: NaiveDate,
    pub total: i64,
    pub churn: i64,
}

/// Account breakdown by state and role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserActivityBreakdown {
    pub active: i64,
    pub inactive: i64,
    pub admins: i64,
}

pub struct Analytics<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Analytics<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn system_overview(&mut self) -> Result<SystemOverview> {
        let (total_users, active_users): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM users")
                .fetch_one(&mut *self.db)
                .await?;

        let (total_predictions, churn_predictions): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(*) FILTER (WHERE prediction = 1) FROM predictions")
                .fetch_one(&mut *self.db)
                .await?;

        Ok(SystemOverview {
            total_users,
            active_users,
            total_predictions,
            churn_predictions,
        })
    }

    /// Daily prediction counts over the trailing `days` days, all users
    #[instrument(skip(self), err)]
    pub async fn daily_trends(&mut self, days: i32) -> Result<Vec<DailyTrendRow>> {
        let rows = sqlx::query_as::<_, DailyTrendRow>(
            r#"
            SELECT created_at::date AS day,
                   COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE prediction = 1) AS churn
            FROM predictions
            WHERE created_at >= NOW() - ($1 * INTERVAL '1 day')
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(days)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self), err)]
    pub async fn user_activity(&mut self) -> Result<UserActivityBreakdown> {
        let (active, inactive, admins): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE is_active),
                   COUNT(*) FILTER (WHERE NOT is_active),
                   COUNT(*) FILTER (WHERE role = 'admin')
            FROM users
            "#,
        )
        .fetch_one(&mut *self.db)
        .await?;

        Ok(UserActivityBreakdown { active, inactive, admins })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::handlers::repository::Repository;
    use crate::db::handlers::{predictions::Predictions, users::Users};
    use crate::db::models::{predictions::PredictionCreateDBRequest, users::UserCreateDBRequest};
    use sqlx::PgPool;

    #[test_log::test(sqlx::test)]
    async fn overview_and_activity_counts(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let mut users = Users::new(&mut conn);
        let admin = users
            .create(&UserCreateDBRequest {
                username: "root".to_string(),
                email: "root@example.com".to_string(),
                password_hash: None,
                role: Role::Admin,
                is_active: true,
            })
            .await
            .unwrap();
        let member = users
            .create(&UserCreateDBRequest {
                username: "member".to_string(),
                email: "member@example.com".to_string(),
                password_hash: None,
                role: Role::User,
                is_active: false,
            })
            .await
            .unwrap();

        let mut predictions = Predictions::new(&mut conn);
        for (prediction, probability) in [(1, 0.9), (0, 0.3)] {
            predictions
                .create(&PredictionCreateDBRequest {
                    user_id: admin.id,
                    customer_name: "Acme".to_string(),
                    tenure: 5.0,
                    monthly_charges: 80.0,
                    total_charges: 400.0,
                    contract_type: "Month-to-month".to_string(),
                    payment_method: "UPI".to_string(),
                    prediction,
                    probability,
                    risk_score: crate::ml::risk_score(probability),
                })
                .await
                .unwrap();
        }

        let mut analytics = Analytics::new(&mut conn);
        let overview = analytics.system_overview().await.unwrap();
        assert_eq!(overview.total_users, 2);
        assert_eq!(overview.active_users, 1);
        assert_eq!(overview.total_predictions, 2);
        assert_eq!(overview.churn_predictions, 1);

        let activity = analytics.user_activity().await.unwrap();
        assert_eq!(activity.active, 1);
        assert_eq!(activity.inactive, 1);
        assert_eq!(activity.admins, 1);

        let trends = analytics.daily_trends(30).await.unwrap();
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].total, 2);
        assert_eq!(trends[0].churn, 1);

        let _ = member;
    }
}
