// src/db/mod.rs

//! Storage backend adapter (spec §4.1).
//!
//! Owns the single `rusqlite::Connection` for a history database: file
//! creation/open, pragma setup, and manual transaction bracketing (`begin`
//! / `commit` / `abort`). Nested transactions are rejected; dropping a
//! handle with an open transaction rolls it back, satisfying the "scoped
//! acquisition with guaranteed release" requirement of spec §5.

pub mod schema;

use std::cell::Cell;
use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A handle to an open history database file.
#[derive(Debug)]
pub struct StorageHandle {
    conn: Connection,
    writable: bool,
    in_transaction: Cell<bool>,
}

impl StorageHandle {
    /// Create a new history database at `path`, stamped with `fqrn`.
    /// Fails if `path` already exists (spec §6).
    pub fn create(path: &Path, fqrn: &str) -> Result<Self> {
        if path.exists() {
            return Err(Error::AlreadyExists(path.display().to_string()));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::set_pragmas(&conn)?;
        schema::init_current(&conn, fqrn)?;
        info!(path = %path.display(), %fqrn, "created history database");

        Ok(Self {
            conn,
            writable: true,
            in_transaction: Cell::new(false),
        })
    }

    /// Open an existing history database. Triggers a one-shot forward
    /// migration to the current schema revision when `writable` is true
    /// (spec §4.2).
    pub fn open(path: &Path, writable: bool) -> Result<Self> {
        if !path.exists() {
            return Err(Error::DatabaseNotFound(path.display().to_string()));
        }

        let conn = Connection::open(path)?;
        Self::set_pragmas(&conn)?;

        // Touching sqlite_master validates this is a recognized database
        // before we commit to a revision.
        schema::detect_revision(&conn)?;

        if writable {
            debug!(path = %path.display(), "opening history database writable");
            schema::migrate_to_current(&conn)?;
        } else {
            debug!(path = %path.display(), "opening history database read-only");
        }

        Ok(Self {
            conn,
            writable,
            in_transaction: Cell::new(false),
        })
    }

    fn set_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        Ok(())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction.get()
    }

    /// Begin a transaction. Fails if one is already open (no nested
    /// transactions, spec §4.1).
    pub fn begin(&self) -> Result<()> {
        if self.in_transaction.get() {
            return Err(Error::Transaction(
                "a transaction is already open on this handle".to_string(),
            ));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.in_transaction.set(true);
        Ok(())
    }

    /// Commit the open transaction, making its effects durable.
    pub fn commit(&self) -> Result<()> {
        if !self.in_transaction.get() {
            return Err(Error::Transaction("no transaction is open".to_string()));
        }
        self.conn.execute_batch("COMMIT")?;
        self.in_transaction.set(false);
        Ok(())
    }

    /// Abort the open transaction, discarding its effects.
    pub fn abort(&self) -> Result<()> {
        if !self.in_transaction.get() {
            return Err(Error::Transaction("no transaction is open".to_string()));
        }
        self.conn.execute_batch("ROLLBACK")?;
        self.in_transaction.set(false);
        Ok(())
    }
}

impl Drop for StorageHandle {
    fn drop(&mut self) {
        if self.in_transaction.get() {
            // Best-effort: a handle dropped mid-transaction must not leave
            // partial effects visible (spec §5).
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}
