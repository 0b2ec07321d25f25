//! Job queue management for the analysis pipeline.
//!
//! This module provides a durable FIFO of file paths backed by the SQLite
//! queue database. Every mutation runs in its own transaction, so a process
//! that dies between two calls leaves the queue exactly as the last completed
//! call left it.

use crate::error::{QueueError, QueueResult};
use crate::models::JobEntry;
use crate::Database;
use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Job queue manager
pub struct JobQueue {
    db: Database,
}

impl JobQueue {
    /// Create a new job queue with the given database
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open (or create) the queue database at `path`
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        Ok(Self::new(Database::open(path, busy_timeout)?))
    }

    /// Append one path at the tail of the queue and return its sequence id
    pub fn append(&mut self, path: impl AsRef<Path>) -> QueueResult<i64> {
        let path = path.as_ref();

        let conn = self.db.conn_mut();
        conn.execute(
            "INSERT INTO job_queue (path, enqueued_at) VALUES (?1, ?2)",
            params![path_to_bytes(path), Utc::now()],
        )?;

        let id = conn.last_insert_rowid();
        debug!(job_id = id, path = %path.display(), "Added file to job queue");

        Ok(id)
    }

    /// Append many paths at the tail in one transaction
    ///
    /// Either every path is queued or none is. Returns the number appended.
    pub fn append_all<I, P>(&mut self, paths: I) -> QueueResult<usize>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let conn = self.db.conn_mut();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut added = 0;
        {
            let mut stmt =
                tx.prepare("INSERT INTO job_queue (path, enqueued_at) VALUES (?1, ?2)")?;
            for path in paths {
                let path = path.as_ref();
                stmt.execute(params![path_to_bytes(path), Utc::now()])?;
                debug!(path = %path.display(), "Added file to job queue");
                added += 1;
            }
        }
        tx.commit()?;

        Ok(added)
    }

    /// Remove and return the head of the queue
    ///
    /// The removal is committed before the entry is returned. Fails with
    /// [`QueueError::Empty`] when there is nothing queued.
    pub fn pop_front(&mut self) -> QueueResult<JobEntry> {
        let conn = self.db.conn_mut();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let entry = tx
            .query_row(
                "SELECT id, path, enqueued_at FROM job_queue ORDER BY id ASC LIMIT 1",
                [],
                row_to_entry,
            )
            .optional()?
            .ok_or(QueueError::Empty)?;

        tx.execute("DELETE FROM job_queue WHERE id = ?1", params![entry.id])?;
        tx.commit()?;

        debug!(job_id = entry.id, path = %entry.path.display(), "Removed file from job queue");

        Ok(entry)
    }

    /// Look at the head of the queue without removing it
    pub fn peek_front(&self) -> QueueResult<Option<JobEntry>> {
        let entry = self
            .db
            .conn()
            .query_row(
                "SELECT id, path, enqueued_at FROM job_queue ORDER BY id ASC LIMIT 1",
                [],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Number of queued entries
    pub fn len(&self) -> QueueResult<usize> {
        let count: i64 = self
            .db
            .conn()
            .query_row("SELECT COUNT(*) FROM job_queue", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Whether the queue has no entries
    pub fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of all entries in dispatch order
    pub fn list(&self) -> QueueResult<Vec<JobEntry>> {
        let conn = self.db.conn();

        let mut stmt =
            conn.prepare("SELECT id, path, enqueued_at FROM job_queue ORDER BY id ASC")?;

        let entries = stmt
            .query_map([], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Remove every entry. Clearing an empty queue is a no-op.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&mut self) -> QueueResult<usize> {
        let conn = self.db.conn_mut();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = tx.execute("DELETE FROM job_queue", [])?;
        tx.commit()?;

        debug!(removed, "Cleared job queue");

        Ok(removed)
    }
}

// Paths are stored as raw OS bytes; names need not be valid UTF-8.
#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

/// Helper: Convert a database row to a JobEntry
fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<JobEntry> {
    Ok(JobEntry {
        id: row.get(0)?,
        path: path_from_bytes(row.get(1)?),
        enqueued_at: row.get(2)?,
    })
}
