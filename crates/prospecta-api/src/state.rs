//! Shared handler state

use prospecta_core::{AutomationOrchestrator, TemplateService};
use prospecta_storage::repository::ProspectionRepository;
use std::sync::Arc;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AutomationOrchestrator>,
    pub templates: Arc<TemplateService>,
    /// Used by the readiness probe
    pub datastore: Arc<dyn ProspectionRepository>,
}
