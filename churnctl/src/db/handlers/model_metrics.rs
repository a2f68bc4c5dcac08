//! Database access for classifier evaluation metrics.

use crate::db::errors::{DbError, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Stored evaluation metrics for the deployed artifact
#[derive(Debug, Clone, FromRow)]
pub struct ModelMetricsRow {
    pub id: Uuid,
    pub accuracy: f64,
    pub precision_score: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub updated_at: DateTime<Utc>,
}

pub struct ModelMetrics<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ModelMetrics<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn latest(&mut self) -> Result<Option<ModelMetricsRow>> {
        let row = sqlx::query_as::<_, ModelMetricsRow>("SELECT * FROM model_metrics ORDER BY updated_at DESC LIMIT 1")
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(row)
    }

    /// Mark the latest metrics row as re-validated now
    #[instrument(skip(self), err)]
    pub async fn refresh(&mut self) -> Result<ModelMetricsRow> {
        let row = sqlx::query_as::<_, ModelMetricsRow>(
            r#"
            UPDATE model_metrics SET updated_at = NOW()
            WHERE id = (SELECT id FROM model_metrics ORDER BY updated_at DESC LIMIT 1)
            RETURNING *
            "#,
        )
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[test_log::test(sqlx::test)]
    async fn latest_and_refresh(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut metrics = ModelMetrics::new(&mut conn);

        // seeded by migration
        let before = metrics.latest().await.unwrap().unwrap();
        let after = metrics.refresh().await.unwrap();
        assert_eq!(before.id, after.id);
        assert!(after.updated_at >= before.updated_at);
    }
}
