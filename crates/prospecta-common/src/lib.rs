//! Prospecta Common - Shared types and utilities
//!
//! This crate provides the configuration, error type and the small
//! enumerations shared by the storage, core and API crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
