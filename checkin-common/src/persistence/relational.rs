//! Relational backend: SQLite `checkins` table

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, warn};

use super::{PersistenceGateway, QueryOutcome};
use crate::config::BackendKind;
use crate::db::{init_database, CHECKINS_TABLE};
use crate::record::{parse_timestamp, CheckinRecord, CheckinStatus, Metrics, METRIC_FIELDS};
use crate::{Error, Result};

/// Check-ins stored as rows; one insert per append
#[derive(Debug, Clone)]
pub struct RelationalStore {
    pool: SqlitePool,
}

impl RelationalStore {
    /// Open (and if needed create) the database file
    pub async fn open(db_path: &Path) -> Result<Self> {
        Ok(Self {
            pool: init_database(db_path).await?,
        })
    }

    /// Wrap a pool whose schema is already initialized
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Columns written by `append`, in bind order
fn insert_columns() -> Vec<&'static str> {
    let mut columns = vec!["athlete_name", "checkin_date", "division"];
    columns.extend_from_slice(METRIC_FIELDS);
    columns.extend_from_slice(&["photos", "video", "status", "created_at"]);
    columns
}

#[async_trait]
impl PersistenceGateway for RelationalStore {
    async fn append(&self, record: &CheckinRecord) -> Result<()> {
        let columns = insert_columns();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            CHECKINS_TABLE,
            columns.join(", "),
            placeholders
        );

        let photos = serde_json::to_string(&record.photos)?;

        let mut query = sqlx::query(&sql)
            .bind(&record.athlete_name)
            .bind(&record.checkin_date)
            .bind(&record.division);
        for name in METRIC_FIELDS {
            query = query.bind(record.metrics.get(name).unwrap_or_default());
        }
        let result = query
            .bind(photos)
            .bind(record.video.as_deref())
            .bind(record.status.as_str())
            .bind(record.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        debug!(id = result.last_insert_rowid(), "Inserted check-in row");
        Ok(())
    }

    async fn query_all(&self) -> Result<QueryOutcome> {
        let rows = sqlx::query(&format!("SELECT * FROM {} ORDER BY id", CHECKINS_TABLE))
            .fetch_all(&self.pool)
            .await?;

        let mut outcome = QueryOutcome::default();
        for row in &rows {
            match decode_row(row) {
                Ok(record) => outcome.records.push(record),
                Err(e) => {
                    let id: Option<i64> = row.try_get("id").ok();
                    warn!("Skipping check-in row {:?}: {}", id, e);
                    outcome.skipped += 1;
                }
            }
        }

        Ok(outcome)
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Relational
    }
}

fn decode_row(row: &SqliteRow) -> Result<CheckinRecord> {
    let mut metrics = Metrics::default();
    for name in METRIC_FIELDS {
        let value: Option<String> = row.try_get(*name)?;
        metrics.set(name, value.unwrap_or_default());
    }

    let photos_json: String = row.try_get("photos")?;
    let photos: Vec<String> = serde_json::from_str(&photos_json)?;

    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let created_at = parse_timestamp(&created_at)
        .ok_or_else(|| Error::InvalidInput(format!("Bad created_at '{}'", created_at)))?;

    let mut record = CheckinRecord {
        athlete_name: row.try_get("athlete_name")?,
        checkin_date: row.try_get("checkin_date")?,
        division: row.try_get::<Option<String>, _>("division")?.unwrap_or_default(),
        metrics,
        photos,
        video: row.try_get("video")?,
        status: status.parse::<CheckinStatus>()?,
        created_at,
    };
    record.normalize_paths();
    Ok(record)
}
