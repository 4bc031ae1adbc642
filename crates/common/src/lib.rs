//! Vis4T Common Library
//!
//! Shared code for the Vis4T gateway and maintenance tools including:
//! - Database models and repository patterns
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Dashboard embed signing
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod errors;
pub mod metrics;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
