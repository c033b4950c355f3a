//! Template Service - template CRUD, recommendation, and previews

pub mod compiler;
pub mod selection;

pub use compiler::{CompiledTemplate, TemplateVars, VariableCheck};

use chrono::Utc;
use prospecta_common::types::{TemplateCategory, TemplateId};
use prospecta_common::{Error, Result};
use prospecta_storage::models::{
    CreateTemplate, EmailTemplate, TemplateFilter, TemplatePerformance, UpdateTemplate,
};
use prospecta_storage::repository::TemplateRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Rendered template plus what is still needed before it can be sent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatePreview {
    pub template_id: TemplateId,
    pub compiled: CompiledTemplate,
    /// Declared variables without a usable value
    pub missing: Vec<String>,
    pub variable_check: VariableCheck,
}

impl TemplatePreview {
    pub fn ready(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Template service
pub struct TemplateService {
    repo: Arc<dyn TemplateRepository>,
}

impl TemplateService {
    pub fn new(repo: Arc<dyn TemplateRepository>) -> Self {
        Self { repo }
    }

    /// Create a template. An empty variable list is filled from the
    /// placeholders found in subject and body.
    pub async fn create(&self, mut input: CreateTemplate) -> Result<EmailTemplate> {
        if input.key.trim().is_empty() {
            return Err(Error::Validation("Template key must not be empty".to_string()));
        }
        if input.variables.is_empty() {
            input.variables =
                compiler::extract_variables(&format!("{}\n{}", input.subject, input.body));
        }

        let template = self.repo.create(input).await?;
        info!(template_id = %template.id, key = %template.key, "Template created");
        Ok(template)
    }

    pub async fn get(&self, id: TemplateId) -> Result<EmailTemplate> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Template {}", id)))
    }

    pub async fn list(&self, filter: &TemplateFilter) -> Result<Vec<EmailTemplate>> {
        self.repo.list(filter).await
    }

    pub async fn update(&self, id: TemplateId, input: UpdateTemplate) -> Result<EmailTemplate> {
        let template = self
            .repo
            .update(id, input)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Template {}", id)))?;
        debug!(template_id = %id, "Template updated");
        Ok(template)
    }

    pub async fn delete(&self, id: TemplateId) -> Result<()> {
        if !self.repo.delete(id).await? {
            return Err(Error::NotFound(format!("Template {}", id)));
        }
        info!(template_id = %id, "Template deleted");
        Ok(())
    }

    /// Copy a template under a new id and key. Metrics are inherited.
    pub async fn duplicate(&self, id: TemplateId) -> Result<EmailTemplate> {
        let copy = self
            .repo
            .duplicate(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Template {}", id)))?;
        info!(source_id = %id, template_id = %copy.id, key = %copy.key, "Template duplicated");
        Ok(copy)
    }

    /// Replace recorded metrics; rates are fractions in [0, 1]
    pub async fn record_performance(
        &self,
        id: TemplateId,
        mut performance: TemplatePerformance,
    ) -> Result<()> {
        for rate in [
            performance.open_rate,
            performance.click_rate,
            performance.response_rate,
            performance.conversion_rate,
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(Error::Validation(format!(
                    "Performance rates must be between 0 and 1, got {}",
                    rate
                )));
            }
        }
        performance.last_updated = Some(Utc::now());

        if !self.repo.update_performance(id, performance).await? {
            return Err(Error::NotFound(format!("Template {}", id)));
        }
        Ok(())
    }

    /// Active templates for a segment, best first
    pub async fn recommend(
        &self,
        segment: &str,
        category: Option<TemplateCategory>,
    ) -> Result<Vec<EmailTemplate>> {
        let templates = self.repo.list(&TemplateFilter::active()).await?;
        Ok(selection::recommend_for_segment(&templates, segment, category)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Best performing active variant sharing `base_key`
    pub async fn best_variant(&self, base_key: &str) -> Result<Option<EmailTemplate>> {
        let templates = self.repo.list(&TemplateFilter::active()).await?;
        Ok(selection::select_variant(&templates, base_key).cloned())
    }

    /// Render a template without sending it
    pub async fn preview(&self, id: TemplateId, vars: &TemplateVars) -> Result<TemplatePreview> {
        let template = self.get(id).await?;
        Ok(TemplatePreview {
            template_id: template.id,
            compiled: compiler::compile(&template, vars),
            missing: compiler::validate(&template, vars),
            variable_check: compiler::check_declared_variables(&template),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use prospecta_common::types::TemplatePriority;
    use prospecta_storage::InMemoryStore;
    use uuid::Uuid;

    fn input(key: &str, segments: &[&str]) -> CreateTemplate {
        CreateTemplate {
            key: key.to_string(),
            name: key.to_string(),
            subject: "Hello {{name}}".to_string(),
            body: "A film for {{company}}".to_string(),
            variables: vec![],
            category: TemplateCategory::Introduction,
            priority: TemplatePriority::Medium,
            target_segments: segments.iter().map(|s| s.to_string()).collect(),
            variant: None,
            is_active: true,
        }
    }

    fn service() -> TemplateService {
        TemplateService::new(Arc::new(InMemoryStore::new()))
    }

    fn performance(response: f64) -> TemplatePerformance {
        TemplatePerformance {
            open_rate: 0.3,
            click_rate: 0.05,
            response_rate: response,
            conversion_rate: 0.01,
            last_updated: None,
        }
    }

    #[tokio::test]
    async fn test_create_extracts_variables() {
        let svc = service();
        let template = svc.create(input("intro", &[])).await.unwrap();
        assert_eq!(template.variables, vec!["name", "company"]);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_key() {
        let svc = service();
        let err = svc.create(input("  ", &[])).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let svc = service();
        let err = svc.get(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_preview_reports_missing() {
        let svc = service();
        let template = svc.create(input("intro", &[])).await.unwrap();

        let vars: TemplateVars = [("name".to_string(), "Ana".to_string())].into();
        let preview = svc.preview(template.id, &vars).await.unwrap();

        assert_eq!(preview.compiled.subject, "Hello Ana");
        assert_eq!(preview.compiled.body, "A film for [company]");
        assert_eq!(preview.missing, vec!["company"]);
        assert!(!preview.ready());
        assert!(preview.variable_check.is_consistent());
    }

    #[tokio::test]
    async fn test_recommend_orders_by_score() {
        let svc = service();
        let weak = svc.create(input("intro_weak", &["luxury"])).await.unwrap();
        let strong = svc.create(input("intro_strong", &[])).await.unwrap();
        svc.create(input("intro_music", &["music"])).await.unwrap();

        svc.record_performance(weak.id, performance(0.01)).await.unwrap();
        svc.record_performance(strong.id, performance(0.2)).await.unwrap();

        let recommended = svc.recommend("luxury", None).await.unwrap();
        let keys: Vec<&str> = recommended.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["intro_strong", "intro_weak"]);
    }

    #[tokio::test]
    async fn test_best_variant() {
        let svc = service();
        let a = svc.create(input("followup_a", &[])).await.unwrap();
        let b = svc.create(input("followup_b", &[])).await.unwrap();
        svc.record_performance(a.id, performance(0.02)).await.unwrap();
        svc.record_performance(b.id, performance(0.08)).await.unwrap();

        let best = svc.best_variant("followup").await.unwrap().unwrap();
        assert_eq!(best.id, b.id);
        assert!(svc.best_variant("closing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_performance_rejects_percentages() {
        let svc = service();
        let template = svc.create(input("intro", &[])).await.unwrap();
        let err = svc
            .record_performance(template.id, performance(12.0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_and_delete() {
        let svc = service();
        let template = svc.create(input("intro", &[])).await.unwrap();
        svc.record_performance(template.id, performance(0.1)).await.unwrap();

        let copy = svc.duplicate(template.id).await.unwrap();
        assert_ne!(copy.id, template.id);
        assert!(copy.key.starts_with("intro_copy_"));
        assert_eq!(
            copy.performance.map(|p| p.response_rate),
            Some(0.1)
        );

        svc.delete(template.id).await.unwrap();
        assert!(svc.delete(template.id).await.is_err());
        assert!(svc.get(copy.id).await.is_ok());
    }
}
