//! Prospecta Core - Prospection automation engine
//!
//! Statistics aggregation, template selection and compilation, health
//! derivation, alerting, and the signed webhook client used to drive the
//! external workflow service.

pub mod activity;
pub mod alerts;
pub mod automation;
pub mod cache;
pub mod health;
pub mod outbound;
pub mod stats;
pub mod templates;
pub mod workflow;

pub use activity::{ActivityAssembler, ActivityEvent};
pub use alerts::{Alert, AlertEngine, AlertNotifier, AlertRule, TracingNotifier};
pub use automation::{
    AutomationOrchestrator, DashboardView, OrchestratorDeps, PerformanceSummary,
    SendTemplateRequest, SendTemplateOutcome,
};
pub use cache::TtlCache;
pub use health::{ConnectivityProbe, HealthMonitor, SystemHealth};
pub use outbound::{
    DomainEnricher, EmailSender, HttpDomainEnricher, HttpEmailSender, OutboundError,
    SendEmailRequest, SendEmailResponse,
};
pub use stats::{AutomationStats, StatsAggregator};
pub use templates::{CompiledTemplate, TemplatePreview, TemplateService};
pub use workflow::{ResponseBody, WorkflowAction, WorkflowClient, WorkflowError};
