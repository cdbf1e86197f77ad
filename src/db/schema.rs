// src/db/schema.rs

//! Schema manager (spec §4.2).
//!
//! Detects which of the three legacy on-disk layouts (or the current one)
//! a database file carries, and applies a one-shot forward migration to
//! the current layout on writable open.
//!
//! | revision | tags columns                                              | extra tables   |
//! |----------|------------------------------------------------------------|----------------|
//! | v1r0     | name, root_hash, revision, timestamp, description           | —              |
//! | v1r1     | + size                                                      | —              |
//! | v1r2     | (same as v1r1)                                              | + recycle_bin  |
//! | v1r3     | + branch                                                    | + branches     |

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// On-disk schema revision. Ordered oldest to newest; `V1R3` is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchemaRevision {
    V1R0,
    V1R1,
    V1R2,
    V1R3,
}

impl SchemaRevision {
    pub const CURRENT: SchemaRevision = SchemaRevision::V1R3;

    pub fn is_current(self) -> bool {
        self == Self::CURRENT
    }
}

pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(exists.is_some())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let found = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .any(|name| name == column);
    Ok(found)
}

/// Inspect the physical layout of `conn` and classify its schema revision.
/// Fails if the file does not even carry a `tags` table (spec §6: "not a
/// recognized history database").
pub fn detect_revision(conn: &Connection) -> Result<SchemaRevision> {
    if !table_exists(conn, "tags")? {
        return Err(Error::Storage(
            "not a recognized history database (no tags table)".to_string(),
        ));
    }
    if table_exists(conn, "branches")? {
        return Ok(SchemaRevision::V1R3);
    }
    if table_exists(conn, "recycle_bin")? {
        return Ok(SchemaRevision::V1R2);
    }
    if has_column(conn, "tags", "size")? {
        return Ok(SchemaRevision::V1R1);
    }
    Ok(SchemaRevision::V1R0)
}

pub fn properties_get(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM properties WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn properties_set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO properties (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}

/// Read the `fqrn` stamped into the database at creation time (spec I6).
pub fn read_fqrn(conn: &Connection) -> Result<String> {
    properties_get(conn, "fqrn")?
        .ok_or_else(|| Error::Storage("database has no fqrn property".to_string()))
}

/// Create the current-revision schema from scratch, stamping `fqrn`.
pub fn init_current(conn: &Connection, fqrn: &str) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE properties (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE branches (
            name             TEXT PRIMARY KEY,
            parent           TEXT NOT NULL,
            initial_revision INTEGER NOT NULL
        );
        INSERT INTO branches (name, parent, initial_revision) VALUES ('', '', 0);

        CREATE TABLE tags (
            name        TEXT PRIMARY KEY,
            root_hash   TEXT NOT NULL,
            size        INTEGER NOT NULL DEFAULT 0,
            revision    INTEGER NOT NULL,
            timestamp   INTEGER NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            branch      TEXT NOT NULL DEFAULT '' REFERENCES branches(name)
        );
        CREATE INDEX idx_tags_revision  ON tags(revision);
        CREATE INDEX idx_tags_branch    ON tags(branch);
        CREATE INDEX idx_tags_timestamp ON tags(timestamp);
        ",
    )?;
    properties_set(conn, "fqrn", fqrn)?;
    properties_set(conn, "schema_revision", "3")?;
    info!(%fqrn, "initialized current-revision history schema");
    Ok(())
}

/// Apply the forward migration from whatever revision `conn` is currently
/// at up to [`SchemaRevision::CURRENT`], inside one transaction. Idempotent:
/// re-running against an already-current database is a no-op (spec §4.2).
pub fn migrate_to_current(conn: &Connection) -> Result<()> {
    let revision = detect_revision(conn)?;
    if revision.is_current() {
        debug!("schema already at current revision, nothing to migrate");
        return Ok(());
    }

    info!(?revision, "migrating history database to current schema");
    conn.execute_batch("BEGIN IMMEDIATE")?;

    let migration = (|| -> Result<()> {
        if !has_column(conn, "tags", "size")? {
            conn.execute(
                "ALTER TABLE tags ADD COLUMN size INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
        }

        if !table_exists(conn, "branches")? {
            conn.execute_batch(
                "CREATE TABLE branches (
                    name             TEXT PRIMARY KEY,
                    parent           TEXT NOT NULL,
                    initial_revision INTEGER NOT NULL
                );
                INSERT INTO branches (name, parent, initial_revision) VALUES ('', '', 0);",
            )?;
        }

        if !has_column(conn, "tags", "branch")? {
            conn.execute(
                "ALTER TABLE tags ADD COLUMN branch TEXT NOT NULL DEFAULT ''",
                [],
            )?;
        }

        if table_exists(conn, "recycle_bin")? {
            conn.execute("DROP TABLE recycle_bin", [])?;
        }

        if !table_exists(conn, "properties")? {
            conn.execute(
                "CREATE TABLE properties (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
                [],
            )?;
        }
        properties_set(conn, "schema_revision", "3")?;

        Ok(())
    })();

    match migration {
        Ok(()) => {
            conn.execute_batch("COMMIT")?;
            info!("history database migration complete");
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Legacy recycle bin contents (spec §4.5, §9). Fails with
/// `NotAvailableAtSchema` older than v1r2. On v1r2 read-only (the table
/// not yet dropped by migration) returns its actual hashes; at v1r3 the
/// table is gone and this returns empty.
pub fn recycle_bin_entries(conn: &Connection) -> Result<Vec<String>> {
    require_at_least(conn, SchemaRevision::V1R2, "ListRecycleBin")?;
    if !table_exists(conn, "recycle_bin")? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare("SELECT root_hash FROM recycle_bin")?;
    let entries = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Empty the recycle bin. A no-op (and idempotent success) if the table
/// is absent, i.e. on a current-revision database (spec §4.5).
pub fn empty_recycle_bin(conn: &Connection) -> Result<()> {
    if table_exists(conn, "recycle_bin")? {
        conn.execute("DELETE FROM recycle_bin", [])?;
    }
    Ok(())
}

/// Return an error if `conn`'s schema revision is older than `min`,
/// naming `op` for the diagnostic (spec §7, `NotAvailableAtSchema`).
pub fn require_at_least(conn: &Connection, min: SchemaRevision, op: &'static str) -> Result<()> {
    let revision = detect_revision(conn)?;
    if revision < min {
        return Err(Error::NotAvailableAtSchema { revision, op });
    }
    Ok(())
}
