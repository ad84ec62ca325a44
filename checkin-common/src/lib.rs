//! # Check-in Common Library
//!
//! Core of the athlete check-in service:
//! - Folder-safe name sanitization
//! - Attachment storage layout and writes
//! - The check-in record model
//! - Persistence backends (document file store, SQLite)
//! - Triage classification and dashboard aggregation
//! - Configuration loading

pub mod attachments;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod record;
pub mod sanitize;
pub mod triage;

pub use config::{BackendKind, Config};
pub use error::{Error, Result};
pub use persistence::{open_gateway, PersistenceGateway, QueryOutcome};
pub use record::{CheckinRecord, CheckinStatus, Metrics};
