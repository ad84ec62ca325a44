//! SQLite setup for the relational backend

pub mod init;
pub mod schema_sync;
pub mod table_schemas;

pub use init::init_database;
pub use table_schemas::{CheckinsTableSchema, CHECKINS_TABLE};
