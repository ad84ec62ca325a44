//! Persistence gateway
//!
//! Check-in records are stored by one of two interchangeable backends,
//! chosen once from [`Config::backend`] at startup:
//! - [`DocumentStore`]: one JSON array file per athlete
//! - [`RelationalStore`]: a SQLite `checkins` table
//!
//! Both expose the same logical fields. Reads never fail because of one bad
//! record; undecodable entries are skipped, logged and counted in
//! [`QueryOutcome::skipped`].

mod document;
mod relational;

pub use document::DocumentStore;
pub use relational::RelationalStore;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::{BackendKind, Config};
use crate::record::CheckinRecord;
use crate::Result;

/// Result of reading the whole collection
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    /// Every decodable record, in no particular order
    pub records: Vec<CheckinRecord>,
    /// Entries that could not be decoded and were left out
    pub skipped: usize,
}

/// Append/query access to persisted check-ins
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Durably add one record without disturbing existing ones
    async fn append(&self, record: &CheckinRecord) -> Result<()>;

    /// Read every persisted record
    ///
    /// Attachment paths in the returned records use `/` separators.
    async fn query_all(&self) -> Result<QueryOutcome>;

    fn backend(&self) -> BackendKind;
}

/// Construct the backend selected by `config`
pub async fn open_gateway(config: &Config) -> Result<Arc<dyn PersistenceGateway>> {
    let gateway: Arc<dyn PersistenceGateway> = match config.backend {
        BackendKind::Document => Arc::new(DocumentStore::new(config.upload_root())),
        BackendKind::Relational => Arc::new(RelationalStore::open(&config.database_path).await?),
    };

    info!("Persistence backend: {}", gateway.backend());
    Ok(gateway)
}
