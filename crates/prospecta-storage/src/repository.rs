//! Repository layer for data access

pub mod automation_config;
pub mod prospection;
pub mod templates;

// Re-export concrete repository implementations with simple names
pub use automation_config::DbAutomationConfigRepository;
pub use prospection::DbProspectionRepository;
pub use templates::DbTemplateRepository;

// Re-export repository traits
pub use automation_config::AutomationConfigRepository;
pub use prospection::ProspectionRepository;
pub use templates::TemplateRepository;
