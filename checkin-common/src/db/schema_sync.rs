//! Declarative table schemas
//!
//! A table is declared once as a [`TableSchema`]. [`ensure_table`] creates
//! it on first run and, for a database written by an older build, adds the
//! columns it lacks. Existing columns are never altered; a column whose
//! type affinity differs from the declaration is only reported.

use std::collections::HashMap;

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

/// SQLite type affinity, per the rules in the SQLite datatype docs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

impl Affinity {
    pub fn of(declared_type: &str) -> Self {
        let t = declared_type.to_ascii_uppercase();
        if t.contains("INT") {
            Affinity::Integer
        } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
            Affinity::Text
        } else if t.is_empty() || t.contains("BLOB") {
            Affinity::Blob
        } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
            Affinity::Real
        } else {
            Affinity::Numeric
        }
    }
}

/// One declared column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub sql_type: &'static str,
    pub key: bool,
    pub required: bool,
    /// SQL literal, e.g. `'new'`
    pub default: Option<String>,
}

impl Column {
    fn new(name: impl Into<String>, sql_type: &'static str) -> Self {
        Self {
            name: name.into(),
            sql_type,
            key: false,
            required: false,
            default: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, "INTEGER")
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, "TEXT")
    }

    /// `INTEGER PRIMARY KEY` makes the column the rowid alias
    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_literal(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    /// Definition as used in both CREATE TABLE and ADD COLUMN
    fn definition(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if self.key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.required {
            sql.push_str(" NOT NULL");
        }
        if let Some(literal) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(literal);
        }
        sql
    }

    /// SQLite rejects ADD COLUMN ... NOT NULL without a default
    fn can_add(&self) -> bool {
        !self.key && (!self.required || self.default.is_some())
    }
}

/// Declared shape of one table
pub trait TableSchema {
    const NAME: &'static str;

    /// Columns in creation order
    fn columns() -> Vec<Column>;

    /// `CREATE INDEX IF NOT EXISTS ...` statements
    fn indexes() -> Vec<String> {
        Vec::new()
    }
}

/// `CREATE TABLE IF NOT EXISTS` for `T`
pub fn create_table_sql<T: TableSchema>() -> String {
    let columns: Vec<String> = T::columns().iter().map(Column::definition).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        T::NAME,
        columns.join(",\n    ")
    )
}

/// Declared columns absent from `existing` (column name -> declared type)
pub fn missing_columns<'a>(
    declared: &'a [Column],
    existing: &HashMap<String, String>,
) -> Vec<&'a Column> {
    declared
        .iter()
        .filter(|c| !existing.contains_key(&c.name))
        .collect()
}

/// Column names and declared types of an existing table
async fn existing_columns(pool: &SqlitePool, table: &str) -> Result<HashMap<String, String>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| (row.get::<String, _>("name"), row.get::<String, _>("type")))
        .collect())
}

/// Create `T` if needed, then add any declared column it lacks
pub async fn ensure_table<T: TableSchema>(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&create_table_sql::<T>()).execute(pool).await?;
    for statement in T::indexes() {
        sqlx::query(&statement).execute(pool).await?;
    }

    let declared = T::columns();
    let existing = existing_columns(pool, T::NAME).await?;

    for column in &declared {
        if let Some(actual) = existing.get(&column.name) {
            if Affinity::of(actual) != Affinity::of(column.sql_type) {
                warn!(
                    "Column {}.{} is {} but {} is expected; leaving it unchanged",
                    T::NAME,
                    column.name,
                    actual,
                    column.sql_type
                );
            }
        }
    }

    let missing = missing_columns(&declared, &existing);
    if missing.is_empty() {
        debug!("Table '{}' is up to date", T::NAME);
        return Ok(());
    }

    for column in missing {
        if !column.can_add() {
            warn!(
                "Cannot add column {}.{} to an existing table",
                T::NAME,
                column.name
            );
            continue;
        }

        info!("Adding column {}.{}", T::NAME, column.name);
        let sql = format!("ALTER TABLE {} ADD COLUMN {}", T::NAME, column.definition());
        match sqlx::query(&sql).execute(pool).await {
            Ok(_) => {}
            // Another connection got there first
            Err(sqlx::Error::Database(e)) if e.message().contains("duplicate column") => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Notes;

    impl TableSchema for Notes {
        const NAME: &'static str = "notes";

        fn columns() -> Vec<Column> {
            vec![
                Column::integer("id").key(),
                Column::text("body").required(),
                Column::text("state").required().default_literal("'open'"),
                Column::text("author").required(),
            ]
        }
    }

    async fn memory_pool() -> SqlitePool {
        sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[test]
    fn test_affinity() {
        assert_eq!(Affinity::of("INTEGER"), Affinity::Integer);
        assert_eq!(Affinity::of("bigint"), Affinity::Integer);
        assert_eq!(Affinity::of("VARCHAR(20)"), Affinity::Text);
        assert_eq!(Affinity::of(""), Affinity::Blob);
        assert_eq!(Affinity::of("DOUBLE"), Affinity::Real);
        assert_eq!(Affinity::of("DECIMAL"), Affinity::Numeric);
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql::<Notes>();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS notes"));
        assert!(sql.contains("id INTEGER PRIMARY KEY"));
        assert!(sql.contains("state TEXT NOT NULL DEFAULT 'open'"));
    }

    #[test]
    fn test_missing_columns() {
        let declared = Notes::columns();
        let existing: HashMap<String, String> = [("id", "INTEGER"), ("body", "TEXT")]
            .into_iter()
            .map(|(n, t)| (n.to_string(), t.to_string()))
            .collect();

        let names: Vec<&str> = missing_columns(&declared, &existing)
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["state", "author"]);
    }

    #[tokio::test]
    async fn test_ensure_table_upgrades_old_table() {
        let pool = memory_pool().await;
        sqlx::query("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO notes (body) VALUES ('old')")
            .execute(&pool)
            .await
            .unwrap();

        ensure_table::<Notes>(&pool).await.unwrap();

        let state: String = sqlx::query_scalar("SELECT state FROM notes WHERE body = 'old'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(state, "open");

        // NOT NULL without a default cannot be added to a populated table
        let columns = existing_columns(&pool, "notes").await.unwrap();
        assert!(!columns.contains_key("author"));

        // Running again changes nothing
        ensure_table::<Notes>(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_table_creates_fresh_table() {
        let pool = memory_pool().await;
        ensure_table::<Notes>(&pool).await.unwrap();

        let columns = existing_columns(&pool, "notes").await.unwrap();
        assert_eq!(columns.len(), 4);
    }
}
