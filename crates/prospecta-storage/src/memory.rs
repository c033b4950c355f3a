//! In-memory datastore
//!
//! Implements every repository trait over process-local vectors. Used by the
//! test suites and by `database.backend = "memory"` for local runs.

use crate::models::{
    ApiUsageLog, AutomationConfig, CreateTemplate, EmailTemplate, EmailTrackingRecord,
    NewApiUsageLog, NewEmailTracking, Prospect, TemplateFilter, TemplatePerformance,
    UpdateTemplate,
};
use crate::repository::{AutomationConfigRepository, ProspectionRepository, TemplateRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prospecta_common::types::TemplateId;
use prospecta_common::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    templates: Vec<EmailTemplate>,
    config: Option<AutomationConfig>,
    prospects: Vec<Prospect>,
    tracking: Vec<EmailTrackingRecord>,
    active_sequences: i64,
    pending_emails: i64,
    usage_logs: Vec<ApiUsageLog>,
}

/// Process-local datastore
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    available: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the datastore becoming unreachable; every call then fails
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Database("datastore unavailable".to_string()))
        }
    }

    /// Seed a prospect
    pub async fn add_prospect(&self, name: Option<&str>, created_at: DateTime<Utc>) -> Prospect {
        let prospect = Prospect {
            id: Uuid::new_v4(),
            name: name.map(str::to_string),
            company: None,
            email: None,
            segment: None,
            created_at,
        };
        self.state.write().await.prospects.push(prospect.clone());
        prospect
    }

    /// Seed a tracking row as-is
    pub async fn add_email_tracking(&self, record: EmailTrackingRecord) {
        self.state.write().await.tracking.push(record);
    }

    pub async fn set_active_sequences(&self, count: i64) {
        self.state.write().await.active_sequences = count;
    }

    pub async fn set_pending_emails(&self, count: i64) {
        self.state.write().await.pending_emails = count;
    }

    /// Recorded API usage entries, oldest first
    pub async fn usage_logs(&self) -> Vec<ApiUsageLog> {
        self.state.read().await.usage_logs.clone()
    }
}

fn in_window(ts: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    ts >= start && ts < end
}

#[async_trait]
impl TemplateRepository for InMemoryStore {
    async fn create(&self, input: CreateTemplate) -> Result<EmailTemplate> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        if state.templates.iter().any(|t| t.key == input.key) {
            return Err(Error::Validation(format!(
                "Template key already exists: {}",
                input.key
            )));
        }
        let template = input.into_template(Uuid::now_v7(), Utc::now());
        state.templates.push(template.clone());
        Ok(template)
    }

    async fn get(&self, id: TemplateId) -> Result<Option<EmailTemplate>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state.templates.iter().find(|t| t.id == id).cloned())
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<EmailTemplate>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state.templates.iter().find(|t| t.key == key).cloned())
    }

    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<EmailTemplate>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state
            .templates
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn update(&self, id: TemplateId, input: UpdateTemplate) -> Result<Option<EmailTemplate>> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        match state.templates.iter_mut().find(|t| t.id == id) {
            Some(template) => {
                input.apply_to(template, Utc::now());
                Ok(Some(template.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_performance(
        &self,
        id: TemplateId,
        performance: TemplatePerformance,
    ) -> Result<bool> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        match state.templates.iter_mut().find(|t| t.id == id) {
            Some(template) => {
                template.performance = Some(performance);
                template.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn duplicate(&self, id: TemplateId) -> Result<Option<EmailTemplate>> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let copy = match state.templates.iter().find(|t| t.id == id) {
            Some(source) => source.duplicate(Uuid::now_v7(), Utc::now()),
            None => return Ok(None),
        };
        state.templates.push(copy.clone());
        Ok(Some(copy))
    }

    async fn delete(&self, id: TemplateId) -> Result<bool> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let before = state.templates.len();
        state.templates.retain(|t| t.id != id);
        Ok(state.templates.len() < before)
    }
}

#[async_trait]
impl AutomationConfigRepository for InMemoryStore {
    async fn get(&self) -> Result<Option<AutomationConfig>> {
        self.ensure_available()?;
        Ok(self.state.read().await.config.clone())
    }

    async fn upsert(&self, config: &AutomationConfig) -> Result<()> {
        self.ensure_available()?;
        self.state.write().await.config = Some(config.clone());
        Ok(())
    }
}

#[async_trait]
impl ProspectionRepository for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        self.ensure_available()
    }

    async fn count_prospects_created(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state
            .prospects
            .iter()
            .filter(|p| in_window(p.created_at, start, end))
            .count() as i64)
    }

    async fn prospects_created(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Prospect>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut prospects: Vec<Prospect> = state
            .prospects
            .iter()
            .filter(|p| in_window(p.created_at, start, end))
            .cloned()
            .collect();
        prospects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(prospects)
    }

    async fn email_tracking_sent(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EmailTrackingRecord>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut rows: Vec<EmailTrackingRecord> = state
            .tracking
            .iter()
            .filter(|r| in_window(r.sent_at, start, end))
            .map(|r| {
                let mut row = r.clone();
                if row.prospect_name.is_none() {
                    row.prospect_name = row.prospect_id.and_then(|pid| {
                        state
                            .prospects
                            .iter()
                            .find(|p| p.id == pid)
                            .and_then(|p| p.name.clone())
                    });
                }
                row
            })
            .collect();
        rows.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(rows)
    }

    async fn count_active_sequences(&self) -> Result<i64> {
        self.ensure_available()?;
        Ok(self.state.read().await.active_sequences)
    }

    async fn count_pending_scheduled_emails(&self) -> Result<i64> {
        self.ensure_available()?;
        Ok(self.state.read().await.pending_emails)
    }

    async fn last_activity_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state.tracking.iter().map(|r| r.last_event_at()).max())
    }

    async fn record_email_tracking(&self, input: NewEmailTracking) -> Result<EmailTrackingRecord> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let prospect_name = input.prospect_id.and_then(|pid| {
            state
                .prospects
                .iter()
                .find(|p| p.id == pid)
                .and_then(|p| p.name.clone())
        });
        let record = EmailTrackingRecord {
            id: Uuid::now_v7(),
            prospect_id: input.prospect_id,
            prospect_name,
            template_id: input.template_id,
            subject: input.subject,
            status: input.status,
            sent_at: input.sent_at,
            opened_at: None,
            responded_at: None,
        };
        state.tracking.push(record.clone());
        Ok(record)
    }

    async fn log_api_usage(&self, entry: NewApiUsageLog) -> Result<()> {
        self.ensure_available()?;
        self.state.write().await.usage_logs.push(ApiUsageLog {
            id: Uuid::now_v7(),
            service: entry.service,
            action: entry.action,
            success: entry.success,
            status_code: entry.status_code,
            latency_ms: entry.latency_ms,
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use prospecta_common::types::{TemplateCategory, TemplatePriority};

    fn create_input(key: &str) -> CreateTemplate {
        CreateTemplate {
            key: key.to_string(),
            name: key.to_string(),
            subject: "Hi {{name}}".to_string(),
            body: "Body".to_string(),
            variables: vec!["name".to_string()],
            category: TemplateCategory::FollowUp,
            priority: TemplatePriority::Low,
            target_segments: vec![],
            variant: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_template_crud() {
        let store = InMemoryStore::new();
        let created = TemplateRepository::create(&store, create_input("follow_1"))
            .await
            .unwrap();

        assert!(TemplateRepository::create(&store, create_input("follow_1"))
            .await
            .is_err());

        let fetched = store.get_by_key("follow_1").await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);

        let copy = store.duplicate(created.id).await.unwrap().unwrap();
        assert_ne!(copy.id, created.id);
        assert_eq!(store.list(&TemplateFilter::default()).await.unwrap().len(), 2);

        assert!(TemplateRepository::delete(&store, created.id).await.unwrap());
        assert!(!TemplateRepository::delete(&store, created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_window_is_half_open() {
        let store = InMemoryStore::new();
        let end = Utc::now();
        let start = end - Duration::days(1);

        store.add_prospect(Some("at start"), start).await;
        store.add_prospect(Some("at end"), end).await;

        assert_eq!(store.count_prospects_created(start, end).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tracking_joins_prospect_name() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let prospect = store.add_prospect(Some("Ana"), now).await;

        store
            .record_email_tracking(NewEmailTracking {
                prospect_id: Some(prospect.id),
                template_id: None,
                subject: Some("Hello".to_string()),
                status: "sent".to_string(),
                sent_at: now,
            })
            .await
            .unwrap();

        let rows = store
            .email_tracking_sent(now - Duration::hours(1), now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].prospect_name.as_deref(), Some("Ana"));
        assert_eq!(store.last_activity_at().await.unwrap(), Some(now));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = InMemoryStore::new();
        store.set_available(false);
        assert!(store.ping().await.is_err());
        assert!(AutomationConfigRepository::get(&store).await.is_err());
        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }
}
