// src/rollback.rs

//! Rollback engine (spec §4.5): compute the set of tags invalidated by
//! rolling a branch back to an earlier point and perform the atomic
//! replacement.

use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::model::Tag;
use crate::tag;

/// Tags on `target.branch` with `revision > target.revision`, plus the
/// target tag itself, ordered by descending revision. Other tags that
/// merely *share* the target's revision (e.g. a duplicate head created by
/// a race) are not affected — only strictly newer revisions on the same
/// branch are invalidated by rolling back to `target`. Fails if
/// `target_name` names no tag.
pub fn list_affected_by_rollback(conn: &Connection, target_name: &str) -> Result<Vec<Tag>> {
    let target = tag::get_by_name(conn, target_name)?;

    let mut stmt = conn.prepare(
        "SELECT name, root_hash, size, revision, timestamp, description, branch
         FROM tags
         WHERE branch = ?1 AND (revision > ?2 OR name = ?3)
         ORDER BY revision DESC, rowid DESC",
    )?;
    let affected = stmt
        .query_map(
            params![target.branch, target.revision as i64, target.name],
            tag::row_to_tag,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(affected)
}

/// Roll the branch that `new_tag.name` currently heads back to a fresh
/// head. `new_tag.name` must identify an existing tag, and
/// `new_tag.revision` must strictly exceed that tag's current revision
/// (guards against a renamed/forged rollback target, spec §4.5, §9).
/// Deletes every tag in the affected set, then inserts `new_tag` on the
/// same branch as the resolved target. Must run inside an open
/// transaction; on failure the caller is responsible for aborting it.
pub fn rollback(conn: &Connection, new_tag: &Tag) -> Result<()> {
    let target = tag::get_by_name(conn, &new_tag.name)?;

    if new_tag.name != target.name || new_tag.revision <= target.revision {
        return Err(Error::ConstraintViolation(format!(
            "rollback target {:?} rejected: not a valid successor of the existing tag",
            new_tag.name
        )));
    }

    let affected = list_affected_by_rollback(conn, &target.name)?;
    for t in &affected {
        conn.execute("DELETE FROM tags WHERE name = ?1", params![t.name])?;
    }

    let replacement = Tag {
        branch: target.branch.clone(),
        ..new_tag.clone()
    };
    tag::insert(conn, &replacement)?;
    Ok(())
}
