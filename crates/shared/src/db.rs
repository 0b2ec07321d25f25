//! Database operations for SQLite.
//!
//! This module handles the queue database connection, schema creation, and
//! migrations.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Schema version written by `schema.sql`
pub const SCHEMA_VERSION: i32 = 2;

/// Database connection wrapper
///
/// The connection is closed when the wrapper is dropped, on every exit path.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        let is_new = !path.exists();

        debug!(path = %path.display(), "Opening database");

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        conn.busy_timeout(busy_timeout)
            .context("Failed to set busy timeout")?;

        let mut db = Self { conn };

        if is_new {
            info!(path = %path.display(), "Creating new queue database");
            db.create_schema()?;
        } else {
            debug!("Database already exists");
            db.run_migrations()?;
        }

        Ok(db)
    }

    /// Create the database schema
    fn create_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(include_str!("../schema.sql"))
            .context("Failed to create database schema")?;

        debug!(version = SCHEMA_VERSION, "Database schema created");
        Ok(())
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference to the underlying connection
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Check if a table exists
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get the database version (from user_version pragma)
    pub fn get_version(&self) -> Result<i32> {
        let version: i32 = self.conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version)
    }

    /// Set the database version
    pub fn set_version(&self, version: i32) -> Result<()> {
        self.conn
            .execute_batch(&format!("PRAGMA user_version = {}", version))?;
        Ok(())
    }

    /// Run migrations for existing databases
    fn run_migrations(&mut self) -> Result<()> {
        // A file created by an interrupted first run (or by hand) may be empty
        if !self.table_exists("job_queue")? {
            info!("Running migration: Creating job_queue table");
            self.create_schema()?;
            return Ok(());
        }

        let version = self.get_version()?;
        if version > SCHEMA_VERSION {
            anyhow::bail!(
                "Queue database schema version {} is newer than supported version {}",
                version,
                SCHEMA_VERSION
            );
        }
        if version < 2 {
            info!("Running migration: Storing queued paths as bytes");
            self.conn
                .execute(
                    "UPDATE job_queue SET path = CAST(path AS BLOB) WHERE typeof(path) = 'text'",
                    [],
                )
                .context("Failed to migrate queued paths")?;
        }
        if version < SCHEMA_VERSION {
            info!(from = version, to = SCHEMA_VERSION, "Upgrading queue database version");
            self.set_version(SCHEMA_VERSION)?;
        }

        Ok(())
    }
}
