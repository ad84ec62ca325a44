//! Table schema definitions
//!
//! Single source of truth for the relational backend's columns. The metric
//! columns come from [`METRIC_FIELDS`], the same list the record model and
//! the form parser use.

use crate::db::schema_sync::{ensure_table, Column, TableSchema};
use crate::record::METRIC_FIELDS;
use crate::Result;
use sqlx::SqlitePool;

/// Name of the check-in table
pub const CHECKINS_TABLE: &str = "checkins";

/// `checkins` table schema
pub struct CheckinsTableSchema;

impl TableSchema for CheckinsTableSchema {
    const NAME: &'static str = CHECKINS_TABLE;

    fn columns() -> Vec<Column> {
        let mut columns = vec![
            Column::integer("id").key(),
            Column::text("athlete_name").required(),
            Column::text("checkin_date").required(),
            Column::text("division").required().default_literal("''"),
        ];

        columns.extend(
            METRIC_FIELDS
                .iter()
                .map(|name| Column::text(*name).required().default_literal("''")),
        );

        columns.extend([
            // JSON array of relative paths
            Column::text("photos").required().default_literal("'[]'"),
            Column::text("video"),
            Column::text("status").required().default_literal("'new'"),
            // RFC 3339
            Column::text("created_at").required(),
        ]);

        columns
    }

    fn indexes() -> Vec<String> {
        vec![format!(
            "CREATE INDEX IF NOT EXISTS idx_checkins_date ON {} (checkin_date)",
            CHECKINS_TABLE
        )]
    }
}

/// Create or upgrade every table
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<()> {
    ensure_table::<CheckinsTableSchema>(pool).await
}
