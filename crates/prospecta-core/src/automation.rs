//! Automation Orchestrator
//!
//! Owns the automation configuration and ties the datastore, the workflow
//! service, and the outbound collaborators together behind one object that is
//! constructed once at startup and shared by the API.

use crate::activity::{ActivityAssembler, ActivityEvent};
use crate::alerts::{AlertEngine, AlertNotifier};
use crate::cache::TtlCache;
use crate::health::{HealthMonitor, SystemHealth};
use crate::outbound::{DomainEnricher, EmailSender, OutboundError, SendEmailRequest};
use crate::stats::{AutomationStats, StatsAggregator};
use crate::templates::compiler::{self, CompiledTemplate, TemplateVars};
use crate::workflow::{ResponseBody, WorkflowAction, WorkflowClient, WorkflowError};
use chrono::Utc;
use prospecta_common::types::{CampaignId, PerformanceLevel, ProspectId, TemplateId};
use prospecta_common::{Error, Result};
use prospecta_storage::models::{
    AutomationConfig, AutomationConfigPatch, NewApiUsageLog, NewEmailTracking,
    MAX_STATS_TIMEFRAME_DAYS,
};
use prospecta_storage::repository::{
    AutomationConfigRepository, ProspectionRepository, TemplateRepository,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stats cache lifetime
pub const DEFAULT_STATS_TTL: Duration = Duration::from_secs(120);

const EMAIL_SERVICE: &str = "email_gateway";
const ENRICHMENT_SERVICE: &str = "enrichment";
const TRACKING_STATUS_SENT: &str = "sent";

/// Collaborators injected into the orchestrator
pub struct OrchestratorDeps {
    pub config_repo: Arc<dyn AutomationConfigRepository>,
    pub prospection: Arc<dyn ProspectionRepository>,
    pub templates: Arc<dyn TemplateRepository>,
    pub workflow: Arc<WorkflowClient>,
    pub email_sender: Option<Arc<dyn EmailSender>>,
    pub enricher: Option<Arc<dyn DomainEnricher>>,
    pub notifier: Arc<dyn AlertNotifier>,
    pub stats_ttl: Duration,
}

/// Open and response rates classified against the configured thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub open: PerformanceLevel,
    pub response: PerformanceLevel,
}

impl PerformanceSummary {
    pub fn classify(stats: &AutomationStats, config: &AutomationConfig) -> Self {
        let thresholds = &config.performance_thresholds;
        Self {
            open: thresholds.open.classify(stats.open_rate),
            response: thresholds.response.classify(stats.response_rate),
        }
    }
}

/// Everything the dashboard renders, gathered in one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardView {
    pub config: AutomationConfig,
    pub stats: AutomationStats,
    pub activity: Vec<ActivityEvent>,
    pub health: SystemHealth,
    pub performance: PerformanceSummary,
}

/// Request to render and send a stored template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTemplateRequest {
    pub template_id: TemplateId,
    pub to: String,
    #[serde(default)]
    pub variables: TemplateVars,
    pub prospect_id: Option<ProspectId>,
    pub campaign_id: Option<CampaignId>,
}

/// Result of a template send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTemplateOutcome {
    pub message_id: Option<String>,
    /// Absent when the tracking row could not be written
    pub tracking_id: Option<Uuid>,
    pub compiled: CompiledTemplate,
}

/// Automation orchestrator
pub struct AutomationOrchestrator {
    config_repo: Arc<dyn AutomationConfigRepository>,
    prospection: Arc<dyn ProspectionRepository>,
    templates: Arc<dyn TemplateRepository>,
    workflow: Arc<WorkflowClient>,
    email_sender: Option<Arc<dyn EmailSender>>,
    enricher: Option<Arc<dyn DomainEnricher>>,
    config: RwLock<Option<AutomationConfig>>,
    stats_cache: Mutex<TtlCache<String, AutomationStats>>,
    stats_ttl: Duration,
    aggregator: StatsAggregator,
    activity: ActivityAssembler,
    health: Arc<HealthMonitor>,
    alerts: AlertEngine,
}

impl AutomationOrchestrator {
    pub fn new(deps: OrchestratorDeps) -> Self {
        let health = Arc::new(HealthMonitor::new(
            deps.prospection.clone(),
            deps.workflow.clone(),
        ));

        Self {
            aggregator: StatsAggregator::new(deps.prospection.clone()),
            activity: ActivityAssembler::new(deps.prospection.clone()),
            alerts: AlertEngine::new(deps.notifier),
            health,
            config_repo: deps.config_repo,
            prospection: deps.prospection,
            templates: deps.templates,
            workflow: deps.workflow,
            email_sender: deps.email_sender,
            enricher: deps.enricher,
            config: RwLock::new(None),
            stats_cache: Mutex::new(TtlCache::new()),
            stats_ttl: deps.stats_ttl,
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Return the loaded configuration, reading it from the datastore on
    /// first use. A missing row is replaced by the persisted default.
    pub async fn load_config(&self) -> Result<AutomationConfig> {
        if let Some(config) = self.config.read().await.as_ref() {
            return Ok(config.clone());
        }

        let mut slot = self.config.write().await;
        if let Some(config) = slot.as_ref() {
            return Ok(config.clone());
        }

        let config = match self.config_repo.get().await? {
            Some(config) => config,
            None => {
                let config = AutomationConfig::default();
                self.config_repo.upsert(&config).await?;
                info!("Persisted default automation configuration");
                config
            }
        };

        self.health
            .set_automation_state(config.is_active, config.activity_timeout_minutes)
            .await;
        *slot = Some(config.clone());
        Ok(config)
    }

    /// Loaded configuration, if any
    pub async fn current_config(&self) -> Option<AutomationConfig> {
        self.config.read().await.clone()
    }

    /// Loaded configuration or the built-in default
    pub async fn config_or_default(&self) -> AutomationConfig {
        self.current_config().await.unwrap_or_default()
    }

    /// Merge `patch` into the loaded configuration and persist the result.
    ///
    /// The in-memory value only changes once the datastore write succeeded.
    pub async fn update_config(&self, patch: &AutomationConfigPatch) -> Result<AutomationConfig> {
        let mut slot = self.config.write().await;
        let current = slot.as_ref().ok_or_else(|| {
            Error::Precondition("Configuration must be loaded before it can be updated".to_string())
        })?;

        let next = current.merged(patch);
        next.validate()?;
        self.config_repo.upsert(&next).await?;

        self.health
            .set_automation_state(next.is_active, next.activity_timeout_minutes)
            .await;
        *slot = Some(next.clone());
        info!(is_active = next.is_active, "Automation configuration updated");
        Ok(next)
    }

    async fn set_active(&self, is_active: bool) -> Result<AutomationConfig> {
        self.update_config(&AutomationConfigPatch {
            is_active: Some(is_active),
            ..AutomationConfigPatch::default()
        })
        .await
    }

    // ========================================================================
    // Statistics, activity, health
    // ========================================================================

    /// Statistics over the configured timeframe
    pub async fn stats(&self, refresh: bool) -> AutomationStats {
        self.stats_for_period(None, refresh).await
    }

    /// Statistics over `days` (configured timeframe when `None`).
    ///
    /// Results are cached per timeframe; `refresh` bypasses and repopulates
    /// the cache. Datastore failures yield zeroed statistics, which are
    /// neither cached nor evaluated for alerts.
    pub async fn stats_for_period(&self, days: Option<i64>, refresh: bool) -> AutomationStats {
        let config = self.config_or_default().await;
        let days = days
            .unwrap_or(config.stats_timeframe_days)
            .clamp(1, MAX_STATS_TIMEFRAME_DAYS);
        let key = format!("stats:{}", days);

        if !refresh {
            if let Some(stats) = self.stats_cache.lock().await.get(key.as_str()) {
                debug!(key = %key, "Stats cache hit");
                return stats;
            }
        }

        let now = Utc::now();
        match self.aggregator.compute(days, now).await {
            Ok(stats) => {
                self.stats_cache
                    .lock()
                    .await
                    .set(key, stats.clone(), self.stats_ttl);
                self.alerts
                    .evaluate(&stats, &config.performance_thresholds, now)
                    .await;
                stats
            }
            Err(e) => {
                warn!(error = %e, timeframe_days = days, "Statistics unavailable, returning empty stats");
                AutomationStats::empty(days, now)
            }
        }
    }

    /// Events within the configured recency window
    pub async fn recent_activity(&self) -> Vec<ActivityEvent> {
        let config = self.config_or_default().await;
        self.activity
            .recent(config.recent_activity_hours, Utc::now())
            .await
    }

    /// Latest polled health snapshot; `refresh` re-runs the checks first
    pub async fn system_health(&self, refresh: bool) -> SystemHealth {
        if refresh {
            self.health.check_now().await
        } else {
            self.health.current().await
        }
    }

    pub fn health_monitor(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    /// Start periodic health checks; stop them by cancelling `cancel`
    pub fn spawn_health_polling(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        self.health.spawn_polling(interval, cancel)
    }

    pub async fn dashboard(&self) -> DashboardView {
        let config = self.config_or_default().await;
        let (stats, activity, health) = tokio::join!(
            self.stats(false),
            self.recent_activity(),
            self.system_health(false),
        );
        let performance = PerformanceSummary::classify(&stats, &config);

        DashboardView {
            config,
            stats,
            activity,
            health,
            performance,
        }
    }

    // ========================================================================
    // Workflow service
    // ========================================================================

    pub async fn trigger_workflow(
        &self,
        workflow_id: &str,
        payload: serde_json::Value,
        cancel: Option<CancellationToken>,
    ) -> std::result::Result<ResponseBody, WorkflowError> {
        self.workflow
            .trigger_workflow(workflow_id, payload, cancel)
            .await
    }

    pub async fn batch_trigger_workflows(
        &self,
        actions: &[WorkflowAction],
        cancel: Option<CancellationToken>,
    ) -> std::result::Result<ResponseBody, WorkflowError> {
        self.workflow.batch_trigger(actions, cancel).await
    }

    /// Ask the workflow service to start, then persist `is_active = true`
    pub async fn start_automation(&self) -> Result<AutomationConfig> {
        let config = self.load_config().await?;
        let settings = serde_json::to_value(&config)
            .map_err(|e| Error::Internal(format!("Failed to encode configuration: {}", e)))?;

        self.workflow.start_automation(settings).await?;
        let config = self.set_active(true).await?;
        info!("Automation started");
        Ok(config)
    }

    /// Ask the workflow service to stop, then persist `is_active = false`
    pub async fn stop_automation(&self) -> Result<AutomationConfig> {
        self.load_config().await?;

        self.workflow.stop_automation().await?;
        let config = self.set_active(false).await?;
        info!("Automation stopped");
        Ok(config)
    }

    /// Reconcile with the workflow service. A failure is reported to the
    /// health monitor; a success clears any reported error.
    pub async fn sync_automation_status(&self) -> std::result::Result<ResponseBody, WorkflowError> {
        match self.workflow.sync_status().await {
            Ok(body) => {
                self.health.clear_error().await;
                Ok(body)
            }
            Err(e) => {
                self.health.report_error(format!("Status sync failed: {}", e)).await;
                Err(e)
            }
        }
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    async fn log_usage(
        &self,
        service: &str,
        action: &str,
        started: Instant,
        status_code: Option<u16>,
        success: bool,
    ) {
        let entry = NewApiUsageLog {
            service: service.to_string(),
            action: action.to_string(),
            success,
            status_code: status_code.map(i32::from),
            latency_ms: started.elapsed().as_millis() as i64,
        };
        if let Err(e) = self.prospection.log_api_usage(entry).await {
            warn!(error = %e, service = %service, "Failed to record API usage");
        }
    }

    /// Render a stored template and send it through the email gateway.
    ///
    /// Nothing is sent while a declared variable lacks a value.
    pub async fn send_template(&self, request: SendTemplateRequest) -> Result<SendTemplateOutcome> {
        let sender = self
            .email_sender
            .clone()
            .ok_or(OutboundError::NotConfigured("Email gateway"))?;

        let template = self
            .templates
            .get(request.template_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Template {}", request.template_id)))?;

        let missing = compiler::validate(&template, &request.variables);
        if !missing.is_empty() {
            return Err(Error::MissingVariables(missing));
        }

        let compiled = compiler::compile(&template, &request.variables);
        let send_request = SendEmailRequest {
            to: request.to.clone(),
            subject: compiled.subject.clone(),
            body: compiled.body.clone(),
            template_id: Some(template.id),
            prospect_id: request.prospect_id,
            campaign_id: request.campaign_id,
        };

        let started = Instant::now();
        let response = match sender.send(&send_request).await {
            Ok(response) => {
                self.log_usage(EMAIL_SERVICE, "send", started, Some(200), response.success)
                    .await;
                response
            }
            Err(e) => {
                self.log_usage(EMAIL_SERVICE, "send", started, e.status(), false)
                    .await;
                return Err(e.into());
            }
        };

        if !response.success {
            return Err(Error::Upstream {
                status: 200,
                message: "Email gateway reported an unsuccessful send".to_string(),
            });
        }

        let tracking = self
            .prospection
            .record_email_tracking(NewEmailTracking {
                prospect_id: request.prospect_id,
                template_id: Some(template.id),
                subject: Some(compiled.subject.clone()),
                status: TRACKING_STATUS_SENT.to_string(),
                sent_at: Utc::now(),
            })
            .await;

        let tracking_id = match tracking {
            Ok(record) => Some(record.id),
            Err(e) => {
                warn!(error = %e, template_id = %template.id, "Email sent but tracking row not recorded");
                None
            }
        };

        info!(template_id = %template.id, to = %request.to, "Template email sent");
        Ok(SendTemplateOutcome {
            message_id: response.message_id,
            tracking_id,
            compiled,
        })
    }

    /// Look up company data for a domain; the provider response is returned
    /// unchanged
    pub async fn enrich_domain(&self, domain: &str, action: &str) -> Result<serde_json::Value> {
        let enricher = self
            .enricher
            .clone()
            .ok_or(OutboundError::NotConfigured("Enrichment"))?;

        let started = Instant::now();
        match enricher.enrich(domain, action).await {
            Ok(value) => {
                self.log_usage(ENRICHMENT_SERVICE, action, started, Some(200), true)
                    .await;
                Ok(value)
            }
            Err(e) => {
                self.log_usage(ENRICHMENT_SERVICE, action, started, e.status(), false)
                    .await;
                Err(e.into())
            }
        }
    }
}
