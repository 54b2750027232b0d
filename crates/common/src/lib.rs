//! Prethesis Common Library
//!
//! Shared code for the Prethesis thesis-tracking backend including:
//! - Database entities, repository and schema bootstrap
//! - Error types and handling
//! - Configuration management
//! - Identity headers and role resolution
//! - Thesis access control and status rules
//! - Supervisor, grader and author reconciliation
//! - Attachment planning and file storage
//! - Metrics and observability

pub mod access;
pub mod attachments;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod reconcile;

// Re-export commonly used types
pub use auth::{Actor, Role};
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
