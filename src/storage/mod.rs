pub mod events;
pub mod experiments;
pub mod leads;
pub mod migrations;
pub mod sales;
pub mod schema;

use duckdb::Connection;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// Shared handle to the embedded DuckDB database.
///
/// Built once per process and cloned into request handlers; clones share
/// one connection. Hold the lock only for the duration of a query.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file at `path` and migrate it.
    pub fn open(path: &Path) -> Result<Self, duckdb::Error> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a throwaway in-memory database, migrated and ready for use.
    pub fn open_in_memory() -> Result<Self, duckdb::Error> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, duckdb::Error> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// The shared connection.
    pub const fn conn(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }
}
