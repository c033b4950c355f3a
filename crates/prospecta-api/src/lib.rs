//! Prospecta API - REST API server
//!
//! This crate exposes the automation engine over HTTP: configuration,
//! statistics, activity, health, workflow triggers, and template management.

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
