//! Email template repository

use crate::db::DatabasePool;
use crate::models::{
    CreateTemplate, EmailTemplate, TemplateFilter, TemplatePerformance, UpdateTemplate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prospecta_common::types::TemplateId;
use prospecta_common::{Error, Result};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Template repository trait
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn create(&self, input: CreateTemplate) -> Result<EmailTemplate>;
    async fn get(&self, id: TemplateId) -> Result<Option<EmailTemplate>>;
    async fn get_by_key(&self, key: &str) -> Result<Option<EmailTemplate>>;
    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<EmailTemplate>>;
    async fn update(&self, id: TemplateId, input: UpdateTemplate) -> Result<Option<EmailTemplate>>;
    async fn update_performance(
        &self,
        id: TemplateId,
        performance: TemplatePerformance,
    ) -> Result<bool>;
    async fn duplicate(&self, id: TemplateId) -> Result<Option<EmailTemplate>>;
    async fn delete(&self, id: TemplateId) -> Result<bool>;
}

#[derive(FromRow)]
struct EmailTemplateRow {
    id: Uuid,
    key: String,
    name: String,
    subject: String,
    body: String,
    variables: Vec<String>,
    category: String,
    priority: String,
    target_segments: Vec<String>,
    variant: Option<String>,
    is_active: bool,
    performance: Option<Json<TemplatePerformance>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EmailTemplateRow> for EmailTemplate {
    type Error = Error;

    fn try_from(row: EmailTemplateRow) -> Result<Self> {
        Ok(EmailTemplate {
            id: row.id,
            key: row.key,
            name: row.name,
            subject: row.subject,
            body: row.body,
            variables: row.variables,
            category: row.category.parse().map_err(Error::Database)?,
            priority: row.priority.parse().map_err(Error::Database)?,
            target_segments: row.target_segments,
            variant: row.variant,
            is_active: row.is_active,
            performance: row.performance.map(|Json(p)| p),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_templates(rows: Vec<EmailTemplateRow>) -> Result<Vec<EmailTemplate>> {
    rows.into_iter().map(EmailTemplate::try_from).collect()
}

/// Database template repository
pub struct DbTemplateRepository {
    pool: DatabasePool,
}

impl DbTemplateRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn insert(&self, template: &EmailTemplate) -> Result<EmailTemplate> {
        let row = sqlx::query_as::<_, EmailTemplateRow>(
            r#"
            INSERT INTO email_templates (
                id, key, name, subject, body, variables, category, priority,
                target_segments, variant, is_active, performance, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(template.id)
        .bind(&template.key)
        .bind(&template.name)
        .bind(&template.subject)
        .bind(&template.body)
        .bind(&template.variables)
        .bind(template.category.to_string())
        .bind(template.priority.to_string())
        .bind(&template.target_segments)
        .bind(&template.variant)
        .bind(template.is_active)
        .bind(template.performance.map(Json))
        .bind(template.created_at)
        .bind(template.updated_at)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        row.try_into()
    }
}

#[async_trait]
impl TemplateRepository for DbTemplateRepository {
    async fn create(&self, input: CreateTemplate) -> Result<EmailTemplate> {
        let template = input.into_template(Uuid::now_v7(), Utc::now());
        self.insert(&template).await
    }

    async fn get(&self, id: TemplateId) -> Result<Option<EmailTemplate>> {
        sqlx::query_as::<_, EmailTemplateRow>("SELECT * FROM email_templates WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?
            .map(EmailTemplate::try_from)
            .transpose()
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<EmailTemplate>> {
        sqlx::query_as::<_, EmailTemplateRow>("SELECT * FROM email_templates WHERE key = $1")
            .bind(key)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?
            .map(EmailTemplate::try_from)
            .transpose()
    }

    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<EmailTemplate>> {
        let rows = sqlx::query_as::<_, EmailTemplateRow>(
            r#"
            SELECT * FROM email_templates
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::text IS NULL OR priority = $2)
              AND ($3::text IS NULL OR cardinality(target_segments) = 0 OR $3 = ANY(target_segments))
              AND ($4::bool IS NULL OR is_active = $4)
            ORDER BY created_at ASC
            "#,
        )
        .bind(filter.category.map(|c| c.to_string()))
        .bind(filter.priority.map(|p| p.to_string()))
        .bind(&filter.segment)
        .bind(filter.active)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        into_templates(rows)
    }

    async fn update(&self, id: TemplateId, input: UpdateTemplate) -> Result<Option<EmailTemplate>> {
        let mut current = match self.get(id).await? {
            Some(t) => t,
            None => return Ok(None),
        };
        input.apply_to(&mut current, Utc::now());

        let row = sqlx::query_as::<_, EmailTemplateRow>(
            r#"
            UPDATE email_templates SET
                name = $2,
                subject = $3,
                body = $4,
                variables = $5,
                category = $6,
                priority = $7,
                target_segments = $8,
                variant = $9,
                is_active = $10,
                updated_at = $11
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&current.name)
        .bind(&current.subject)
        .bind(&current.body)
        .bind(&current.variables)
        .bind(current.category.to_string())
        .bind(current.priority.to_string())
        .bind(&current.target_segments)
        .bind(&current.variant)
        .bind(current.is_active)
        .bind(current.updated_at)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        row.map(EmailTemplate::try_from).transpose()
    }

    async fn update_performance(
        &self,
        id: TemplateId,
        performance: TemplatePerformance,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE email_templates SET performance = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(Json(performance))
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn duplicate(&self, id: TemplateId) -> Result<Option<EmailTemplate>> {
        let source = match self.get(id).await? {
            Some(t) => t,
            None => return Ok(None),
        };
        let copy = source.duplicate(Uuid::now_v7(), Utc::now());
        self.insert(&copy).await.map(Some)
    }

    async fn delete(&self, id: TemplateId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM email_templates WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
