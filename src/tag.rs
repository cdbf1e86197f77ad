// src/tag.rs

//! Tag store (spec §4.3): CRUD over tag records keyed by name, bulk
//! listing, by-date lookup, and deduplicated hash extraction.

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::schema::{self, SchemaRevision};
use crate::error::{Error, Result};
use crate::hash::RootHash;
use crate::model::Tag;

/// The `tags` SELECT column list for a given on-disk schema revision.
/// Columns absent at older revisions (`size` before v1r1, `branch` before
/// v1r3) are substituted with their spec-mandated defaults via a literal
/// `AS` alias, so [`row_to_tag`] can read every revision through the same
/// named-column accessors without the caller needing two row mappers.
fn tag_select_columns(revision: SchemaRevision) -> &'static str {
    match revision {
        SchemaRevision::V1R0 => {
            "name, root_hash, 0 AS size, revision, timestamp, description, '' AS branch"
        }
        SchemaRevision::V1R1 | SchemaRevision::V1R2 => {
            "name, root_hash, size, revision, timestamp, description, '' AS branch"
        }
        SchemaRevision::V1R3 => "name, root_hash, size, revision, timestamp, description, branch",
    }
}

pub(crate) fn row_to_tag(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    let root_hash: String = row.get("root_hash")?;
    let root_hash = RootHash::from_persisted_string(&root_hash).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })?;
    Ok(Tag {
        name: row.get("name")?,
        root_hash,
        size: row.get::<_, i64>("size")? as u64,
        revision: row.get::<_, i64>("revision")? as u64,
        timestamp: row.get("timestamp")?,
        description: row.get("description")?,
        branch: row.get("branch")?,
    })
}

/// Insert `tag`. Fails with `ConstraintViolation` if the name is taken
/// (I4) or the branch is unknown (I2).
pub fn insert(conn: &Connection, tag: &Tag) -> Result<()> {
    if exists(conn, &tag.name)? {
        return Err(Error::ConstraintViolation(format!(
            "tag {:?} already exists",
            tag.name
        )));
    }
    let branch_known: bool = conn
        .query_row(
            "SELECT 1 FROM branches WHERE name = ?1",
            params![tag.branch],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some();
    if !branch_known {
        return Err(Error::ConstraintViolation(format!(
            "tag {:?} references unknown branch {:?}",
            tag.name, tag.branch
        )));
    }

    conn.execute(
        "INSERT INTO tags (name, root_hash, size, revision, timestamp, description, branch)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            tag.name,
            tag.root_hash.to_persisted_string(),
            tag.size as i64,
            tag.revision as i64,
            tag.timestamp,
            tag.description,
            tag.branch,
        ],
    )?;
    Ok(())
}

/// Remove the tag named `name`. A missing name is a no-op success, not an
/// error (spec §4.3).
pub fn remove(conn: &Connection, name: &str) -> Result<()> {
    conn.execute("DELETE FROM tags WHERE name = ?1", params![name])?;
    Ok(())
}

pub fn exists(conn: &Connection, name: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM tags WHERE name = ?1",
            params![name],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn get_by_name(conn: &Connection, name: &str) -> Result<Tag> {
    let columns = tag_select_columns(schema::detect_revision(conn)?);
    conn.query_row(
        &format!("SELECT {columns} FROM tags WHERE name = ?1"),
        params![name],
        row_to_tag,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(name.to_string()))
}

/// The trunk tag with the largest `timestamp <= t` (spec §4.3). Only
/// trunk tags (`branch = ""`) participate; at revisions older than v1r3
/// there is no `branch` column to filter on, but every tag at those
/// revisions is implicitly on the trunk, so no filter is needed.
pub fn get_by_date(conn: &Connection, t: i64) -> Result<Tag> {
    let revision = schema::detect_revision(conn)?;
    let columns = tag_select_columns(revision);
    let where_clause = if revision == SchemaRevision::V1R3 {
        "WHERE branch = '' AND timestamp <= ?1"
    } else {
        "WHERE timestamp <= ?1"
    };
    conn.query_row(
        &format!("SELECT {columns} FROM tags {where_clause} ORDER BY timestamp DESC LIMIT 1"),
        params![t],
        row_to_tag,
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("no trunk tag at or before timestamp {t}")))
}

/// All tags, ordered by descending revision, ties broken by descending
/// rowid (spec §4.3 and §8: "for equal revisions tests accept either
/// permutation").
pub fn list(conn: &Connection) -> Result<Vec<Tag>> {
    let columns = tag_select_columns(schema::detect_revision(conn)?);
    let mut stmt = conn.prepare(&format!(
        "SELECT {columns} FROM tags ORDER BY revision DESC, rowid DESC"
    ))?;
    let tags = stmt
        .query_map([], row_to_tag)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(tags)
}

pub fn count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
    Ok(n as u64)
}

/// Deduplicated `root_hash` values, ordered by descending revision of
/// each hash's first (highest-revision) occurrence (spec §4.3).
pub fn hashes(conn: &Connection) -> Result<Vec<RootHash>> {
    let tags = list(conn)?;
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let key = tag.root_hash.to_persisted_string();
        if seen.insert(key) {
            out.push(tag.root_hash);
        }
    }
    Ok(out)
}
