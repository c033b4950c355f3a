//! Automation configuration repository

use crate::db::DatabasePool;
use crate::models::AutomationConfig;
use async_trait::async_trait;
use prospecta_common::types::AUTOMATION_CONFIG_ID;
use prospecta_common::{Error, Result};
use sqlx::types::Json;

/// Singleton configuration store
#[async_trait]
pub trait AutomationConfigRepository: Send + Sync {
    /// Read the singleton row, if it exists
    async fn get(&self) -> Result<Option<AutomationConfig>>;
    /// Write the full configuration, replacing any previous value
    async fn upsert(&self, config: &AutomationConfig) -> Result<()>;
}

/// Database configuration repository
pub struct DbAutomationConfigRepository {
    pool: DatabasePool,
}

impl DbAutomationConfigRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AutomationConfigRepository for DbAutomationConfigRepository {
    async fn get(&self) -> Result<Option<AutomationConfig>> {
        let row: Option<(Json<AutomationConfig>,)> =
            sqlx::query_as("SELECT settings FROM automation_config WHERE id = $1")
                .bind(AUTOMATION_CONFIG_ID)
                .fetch_optional(self.pool.pool())
                .await
                .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row.map(|(Json(config),)| config))
    }

    async fn upsert(&self, config: &AutomationConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO automation_config (id, settings, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (id)
            DO UPDATE SET settings = EXCLUDED.settings, updated_at = NOW()
            "#,
        )
        .bind(AUTOMATION_CONFIG_ID)
        .bind(Json(config))
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }
}
