//! Prospecta Storage - Datastore collaborator adapters
//!
//! This crate defines the repository traits the automation engine reads
//! and writes through, with a PostgreSQL implementation and an in-memory
//! store used for tests and local runs.

pub mod db;
pub mod memory;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use memory::InMemoryStore;
pub use models::*;
pub use repository::*;
