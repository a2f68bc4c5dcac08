//! Database repository for prediction records.

use crate::types::{PredictionId, UserId, abbrev_uuid};
use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::predictions::{PredictionCreateDBRequest, PredictionDBResponse},
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

/// Filter for listing prediction records.
///
/// `user_id = None` means all users and is reserved for admin contexts;
/// owner-scoped callers must always set it.
#[derive(Debug, Clone, Default)]
pub struct PredictionFilter {
    pub user_id: Option<UserId>,
    /// 0 = stay, 1 = churn
    pub prediction: Option<i32>,
    /// Inclusive lower bound on created_at
    pub from_date: Option<DateTime<Utc>>,
    /// Exclusive upper bound on created_at
    pub to_date_exclusive: Option<DateTime<Utc>>,
    pub skip: i64,
    pub limit: i64,
}

/// Per-user aggregate over prediction records
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionStats {
    pub total: i64,
    pub churn: i64,
    pub no_churn: i64,
    pub avg_probability: f64,
}

/// One month's prediction counts
#[derive(Debug, Clone, FromRow)]
pub struct MonthlyTrendRow {
    /// Bucket label, `YYYY-MM`
    pub month: String,
    pub total: i64,
    pub churn: i64,
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct PredictionRow {
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

impl From<PredictionRow> for PredictionDBResponse {
    fn from(row: PredictionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            customer_name: row.customer_name,
            tenure: row.tenure,
            monthly_charges: row.monthly_charges,
            total_charges: row.total_charges,
            contract_type: row.contract_type,
            payment_method: row.payment_method,
            prediction: row.prediction,
            probability: row.probability,
            risk_score: row.risk_score,
            created_at: row.created_at,
        }
    }
}

pub struct Predictions<'c> {
    db: &'c mut PgConnection,
}

fn push_filter_conditions(qb: &mut QueryBuilder<'_, Postgres>, filter: &PredictionFilter) {
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(prediction) = filter.prediction {
        qb.push(" AND prediction = ").push_bind(prediction);
    }
    if let Some(from) = filter.from_date {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to_date_exclusive {
        qb.push(" AND created_at < ").push_bind(to);
    }
}

impl<'c> Predictions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Persist a batch of staged records in a single transaction.
    ///
    /// Either every record lands or none do. Callers decide whether an empty
    /// batch warrants calling this at all (it commits nothing and returns 0).
    #[instrument(skip(self, requests), fields(count = requests.len()), err)]
    pub async fn create_many(&mut self, requests: &[PredictionCreateDBRequest]) -> Result<u64> {
        if requests.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db.begin().await?;
        let mut inserted = 0u64;
        for request in requests {
            sqlx::query(
                r#"
                INSERT INTO predictions
                    (user_id, customer_name, tenure, monthly_charges, total_charges,
                     contract_type, payment_method, prediction, probability, risk_score)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(request.user_id)
            .bind(&request.customer_name)
            .bind(request.tenure)
            .bind(request.monthly_charges)
            .bind(request.total_charges)
            .bind(&request.contract_type)
            .bind(&request.payment_method)
            .bind(request.prediction)
            .bind(request.probability)
            .bind(request.risk_score)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }
        tx.commit().await?;

        Ok(inserted)
    }

    /// The caller's most recent records, newest first
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_recent(&mut self, user_id: UserId, limit: i64) -> Result<Vec<PredictionDBResponse>> {
        let rows = sqlx::query_as::<_, PredictionRow>(
            "SELECT * FROM predictions WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows.into_iter().map(PredictionDBResponse::from).collect())
    }

    /// Aggregate stats for one user's records
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn stats_for_user(&mut self, user_id: UserId) -> Result<PredictionStats> {
        let (total, churn, avg_probability): (i64, i64, f64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE prediction = 1),
                   COALESCE(AVG(probability), 0.0)
            FROM predictions WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(PredictionStats {
            total,
            churn,
            no_churn: total - churn,
            avg_probability,
        })
    }

    /// Monthly buckets over the trailing 365 days. `user_id = None` covers all users.
    #[instrument(skip(self), err)]
    pub async fn monthly_trend(&mut self, user_id: Option<UserId>) -> Result<Vec<MonthlyTrendRow>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
            SELECT to_char(created_at, 'YYYY-MM') AS month,
                   COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE prediction = 1) AS churn
            FROM predictions
            WHERE created_at >= NOW() - INTERVAL '365 days'
            "#,
        );
        if let Some(user_id) = user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        qb.push(" GROUP BY 1 ORDER BY 1");

        let rows = qb.build_query_as::<MonthlyTrendRow>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Predictions<'c> {
    type CreateRequest = PredictionCreateDBRequest;
    type Response = PredictionDBResponse;
    type Id = PredictionId;
    type Filter = PredictionFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let row = sqlx::query_as::<_, PredictionRow>(
            r#"
            INSERT INTO predictions
                (user_id, customer_name, tenure, monthly_charges, total_charges,
                 contract_type, payment_method, prediction, probability, risk_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(&request.customer_name)
        .bind(request.tenure)
        .bind(request.monthly_charges)
        .bind(request.total_charges)
        .bind(&request.contract_type)
        .bind(&request.payment_method)
        .bind(request.prediction)
        .bind(request.probability)
        .bind(request.risk_score)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(PredictionDBResponse::from(row))
    }

    #[instrument(skip(self), fields(prediction_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let row = sqlx::query_as::<_, PredictionRow>("SELECT * FROM predictions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(row.map(PredictionDBResponse::from))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM predictions WHERE TRUE");
        push_filter_conditions(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.skip);

        let rows = qb.build_query_as::<PredictionRow>().fetch_all(&mut *self.db).await?;
        Ok(rows.into_iter().map(PredictionDBResponse::from).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM predictions WHERE TRUE");
        push_filter_conditions(&mut qb, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(prediction_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM predictions WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::handlers::users::Users;
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::PgPool;

    async fn seed_user(conn: &mut PgConnection, username: &str) -> UserId {
        let mut users = Users::new(conn);
        users
            .create(&UserCreateDBRequest {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: None,
                role: Role::User,
                is_active: true,
            })
            .await
            .unwrap()
            .id
    }

    fn record(user_id: UserId, name: &str, prediction: i32, probability: f64) -> PredictionCreateDBRequest {
        PredictionCreateDBRequest {
            user_id,
            customer_name: name.to_string(),
            tenure: 12.0,
            monthly_charges: 70.5,
            total_charges: 846.0,
            contract_type: "Month-to-month".to_string(),
            payment_method: "Electronic check".to_string(),
            prediction,
            probability,
            risk_score: crate::ml::risk_score(probability),
        }
    }

    #[test_log::test(sqlx::test)]
    async fn create_and_filtered_list(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user_id = seed_user(&mut conn, "alice").await;
        let other_id = seed_user(&mut conn, "bob").await;

        let mut predictions = Predictions::new(&mut conn);
        predictions.create(&record(user_id, "Acme", 1, 0.9)).await.unwrap();
        predictions.create(&record(user_id, "Globex", 0, 0.2)).await.unwrap();
        predictions.create(&record(other_id, "Initech", 1, 0.8)).await.unwrap();

        let filter = PredictionFilter {
            user_id: Some(user_id),
            skip: 0,
            limit: 10,
            ..Default::default()
        };
        let rows = predictions.list(&filter).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.user_id == user_id));
        assert_eq!(predictions.count(&filter).await.unwrap(), 2);

        let churn_only = PredictionFilter {
            user_id: Some(user_id),
            prediction: Some(1),
            skip: 0,
            limit: 10,
            ..Default::default()
        };
        let rows = predictions.list(&churn_only).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].customer_name, "Acme");
    }

    #[test_log::test(sqlx::test)]
    async fn create_many_is_atomic_batch(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user_id = seed_user(&mut conn, "carol").await;

        let mut predictions = Predictions::new(&mut conn);
        let batch = vec![
            record(user_id, "A", 1, 0.7),
            record(user_id, "B", 0, 0.1),
            record(user_id, "C", 1, 0.95),
        ];
        assert_eq!(predictions.create_many(&batch).await.unwrap(), 3);
        assert_eq!(predictions.create_many(&[]).await.unwrap(), 0);

        let filter = PredictionFilter {
            user_id: Some(user_id),
            skip: 0,
            limit: 10,
            ..Default::default()
        };
        assert_eq!(predictions.count(&filter).await.unwrap(), 3);
    }

    #[test_log::test(sqlx::test)]
    async fn stats_aggregate_per_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user_id = seed_user(&mut conn, "dana").await;

        let mut predictions = Predictions::new(&mut conn);
        predictions.create(&record(user_id, "A", 1, 0.8)).await.unwrap();
        predictions.create(&record(user_id, "B", 0, 0.2)).await.unwrap();

        let stats = predictions.stats_for_user(user_id).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.churn, 1);
        assert_eq!(stats.no_churn, 1);
        assert!((stats.avg_probability - 0.5).abs() < 1e-9);

        // no records yet for a fresh user
        let fresh = seed_user(&mut conn, "eve").await;
        let mut predictions = Predictions::new(&mut conn);
        let stats = predictions.stats_for_user(fresh).await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.avg_probability, 0.0);
    }

    #[test_log::test(sqlx::test)]
    async fn deleting_user_cascades_predictions(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user_id = seed_user(&mut conn, "frank").await;

        let mut predictions = Predictions::new(&mut conn);
        let created = predictions.create(&record(user_id, "A", 1, 0.7)).await.unwrap();

        let mut users = Users::new(&mut conn);
        assert!(users.delete(user_id).await.unwrap());

        let mut predictions = Predictions::new(&mut conn);
        assert!(predictions.get_by_id(created.id).await.unwrap().is_none());
    }
}
