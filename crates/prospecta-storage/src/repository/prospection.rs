//! Prospection activity repository
//!
//! Read side over `prospects`, `email_tracking`, `prospect_sequences` and
//! `scheduled_emails`, plus the two inserts the engine performs itself
//! (tracking rows for sends and `api_usage_logs` entries).
//!
//! Time windows are half-open: `start <= ts < end`.

use crate::db::DatabasePool;
use crate::models::{EmailTrackingRecord, NewApiUsageLog, NewEmailTracking, Prospect};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prospecta_common::{Error, Result};
use uuid::Uuid;

/// Prospection datastore trait
#[async_trait]
pub trait ProspectionRepository: Send + Sync {
    /// Trivial reachability query
    async fn ping(&self) -> Result<()>;

    async fn count_prospects_created(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64>;

    async fn prospects_created(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Prospect>>;

    async fn email_tracking_sent(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EmailTrackingRecord>>;

    async fn count_active_sequences(&self) -> Result<i64>;

    async fn count_pending_scheduled_emails(&self) -> Result<i64>;

    /// Most recent send/open/response timestamp across all tracking rows
    async fn last_activity_at(&self) -> Result<Option<DateTime<Utc>>>;

    async fn record_email_tracking(&self, input: NewEmailTracking) -> Result<EmailTrackingRecord>;

    async fn log_api_usage(&self, entry: NewApiUsageLog) -> Result<()>;
}

/// Database prospection repository
pub struct DbProspectionRepository {
    pool: DatabasePool,
}

impl DbProspectionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProspectionRepository for DbProspectionRepository {
    async fn ping(&self) -> Result<()> {
        self.pool.health_check().await
    }

    async fn count_prospects_created(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM prospects WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(count.0)
    }

    async fn prospects_created(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Prospect>> {
        sqlx::query_as::<_, Prospect>(
            r#"
            SELECT id, name, company, email, segment, created_at
            FROM prospects
            WHERE created_at >= $1 AND created_at < $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn email_tracking_sent(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EmailTrackingRecord>> {
        sqlx::query_as::<_, EmailTrackingRecord>(
            r#"
            SELECT t.id, t.prospect_id, p.name AS prospect_name, t.template_id, t.subject,
                   t.status, t.sent_at, t.opened_at, t.responded_at
            FROM email_tracking t
            LEFT JOIN prospects p ON p.id = t.prospect_id
            WHERE t.sent_at >= $1 AND t.sent_at < $2
            ORDER BY t.sent_at DESC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn count_active_sequences(&self) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM prospect_sequences WHERE status = 'active'")
                .fetch_one(self.pool.pool())
                .await
                .map_err(|e| Error::Database(e.to_string()))?;

        Ok(count.0)
    }

    async fn count_pending_scheduled_emails(&self) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM scheduled_emails WHERE status = 'pending'")
                .fetch_one(self.pool.pool())
                .await
                .map_err(|e| Error::Database(e.to_string()))?;

        Ok(count.0)
    }

    async fn last_activity_at(&self) -> Result<Option<DateTime<Utc>>> {
        let latest: (Option<DateTime<Utc>>,) = sqlx::query_as(
            "SELECT MAX(GREATEST(sent_at, opened_at, responded_at)) FROM email_tracking",
        )
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(latest.0)
    }

    async fn record_email_tracking(&self, input: NewEmailTracking) -> Result<EmailTrackingRecord> {
        sqlx::query_as::<_, EmailTrackingRecord>(
            r#"
            WITH inserted AS (
                INSERT INTO email_tracking (id, prospect_id, template_id, subject, status, sent_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT i.id, i.prospect_id, p.name AS prospect_name, i.template_id, i.subject,
                   i.status, i.sent_at, i.opened_at, i.responded_at
            FROM inserted i
            LEFT JOIN prospects p ON p.id = i.prospect_id
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(input.prospect_id)
        .bind(input.template_id)
        .bind(&input.subject)
        .bind(&input.status)
        .bind(input.sent_at)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn log_api_usage(&self, entry: NewApiUsageLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO api_usage_logs (id, service, action, success, status_code, latency_ms, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&entry.service)
        .bind(&entry.action)
        .bind(entry.success)
        .bind(entry.status_code)
        .bind(entry.latency_ms)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }
}
