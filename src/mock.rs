// src/mock.rs

//! In-memory history store (spec §9, "Polymorphic test harness"): backed
//! by ordered maps instead of SQLite, for fast unit tests of the
//! operations that don't exercise storage-specific behavior.
//!
//! `PruneBranches` transitively reasons about descendants of removed
//! branches, which the source explicitly declared uninteresting to
//! reimplement outside SQL-like storage; this variant returns
//! [`Error::Unsupported`] for it rather than silently no-opping.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::hash::RootHash;
use crate::history::HistoryStore;
use crate::model::{Branch, Tag};

#[derive(Clone, Default)]
struct State {
    tags: BTreeMap<String, Tag>,
    branches: BTreeMap<String, Branch>,
}

/// An in-memory history store. Construct with [`MockHistory::new`]
/// (writable) or [`MockHistory::new_read_only`].
///
/// Open question (spec §9): the source's mock marks every opened handle
/// read-only regardless of which open call was used, which reads as a
/// test-only shortcut rather than intended behavior. This reimplements
/// the writable/read-only distinction faithfully instead of replicating
/// that shortcut.
pub struct MockHistory {
    fqrn: String,
    writable: bool,
    state: RefCell<State>,
    snapshot: RefCell<Option<State>>,
    in_transaction: Cell<bool>,
}

impl MockHistory {
    pub fn new(fqrn: impl Into<String>) -> Self {
        let mut state = State::default();
        state.branches.insert(String::new(), Branch::trunk());
        Self {
            fqrn: fqrn.into(),
            writable: true,
            state: RefCell::new(state),
            snapshot: RefCell::new(None),
            in_transaction: Cell::new(false),
        }
    }

    pub fn new_read_only(fqrn: impl Into<String>) -> Self {
        let mut h = Self::new(fqrn);
        h.writable = false;
        h
    }

    fn require_writable(&self) -> Result<()> {
        if !self.writable {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }
}

impl HistoryStore for MockHistory {
    fn fqrn(&self) -> &str {
        &self.fqrn
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn insert(&self, t: &Tag) -> Result<()> {
        self.require_writable()?;
        let mut state = self.state.borrow_mut();
        if state.tags.contains_key(&t.name) {
            return Err(Error::ConstraintViolation(format!(
                "tag {:?} already exists",
                t.name
            )));
        }
        if !state.branches.contains_key(&t.branch) {
            return Err(Error::ConstraintViolation(format!(
                "tag {:?} references unknown branch {:?}",
                t.name, t.branch
            )));
        }
        state.tags.insert(t.name.clone(), t.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.require_writable()?;
        self.state.borrow_mut().tags.remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.borrow().tags.contains_key(name))
    }

    fn get_by_name(&self, name: &str) -> Result<Tag> {
        self.state
            .borrow()
            .tags
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn get_by_date(&self, timestamp: i64) -> Result<Tag> {
        self.state
            .borrow()
            .tags
            .values()
            .filter(|t| t.branch.is_empty() && t.timestamp <= timestamp)
            .max_by_key(|t| t.timestamp)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no trunk tag at or before timestamp {timestamp}")))
    }

    fn list(&self) -> Result<Vec<Tag>> {
        let mut tags: Vec<_> = self.state.borrow().tags.values().cloned().collect();
        tags.sort_by(|a, b| b.revision.cmp(&a.revision));
        Ok(tags)
    }

    fn get_number_of_tags(&self) -> Result<u64> {
        Ok(self.state.borrow().tags.len() as u64)
    }

    fn get_hashes(&self) -> Result<Vec<RootHash>> {
        let tags = self.list()?;
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for t in tags {
            if seen.insert(t.root_hash.to_persisted_string()) {
                out.push(t.root_hash);
            }
        }
        Ok(out)
    }

    fn insert_branch(&self, b: &Branch) -> Result<()> {
        self.require_writable()?;
        let mut state = self.state.borrow_mut();
        if state.branches.contains_key(&b.name) {
            return Err(Error::ConstraintViolation(format!(
                "branch {:?} already exists",
                b.name
            )));
        }
        if !b.parent.is_empty() && !state.branches.contains_key(&b.parent) {
            return Err(Error::ConstraintViolation(format!(
                "branch {:?} references unknown parent {:?}",
                b.name, b.parent
            )));
        }
        state.branches.insert(b.name.clone(), b.clone());
        Ok(())
    }

    fn list_branches(&self) -> Result<Vec<Branch>> {
        Ok(self.state.borrow().branches.values().cloned().collect())
    }

    fn exists_branch(&self, name: &str) -> Result<bool> {
        Ok(self.state.borrow().branches.contains_key(name))
    }

    fn get_branch_head(&self, branch_name: &str) -> Result<Tag> {
        self.state
            .borrow()
            .tags
            .values()
            .filter(|t| t.branch == branch_name)
            .max_by_key(|t| t.revision)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("branch {branch_name:?} has no tags")))
    }

    fn prune_branches(&self) -> Result<()> {
        Err(Error::Unsupported("PruneBranches"))
    }

    fn list_tags_affected_by_rollback(&self, target_name: &str) -> Result<Vec<Tag>> {
        let target = self.get_by_name(target_name)?;
        let mut affected: Vec<_> = self
            .state
            .borrow()
            .tags
            .values()
            .filter(|t| {
                t.branch == target.branch
                    && (t.revision > target.revision || t.name == target.name)
            })
            .cloned()
            .collect();
        affected.sort_by(|a, b| b.revision.cmp(&a.revision));
        Ok(affected)
    }

    fn rollback(&self, new_tag: &Tag) -> Result<()> {
        self.require_writable()?;
        let target = self.get_by_name(&new_tag.name)?;
        if new_tag.name != target.name || new_tag.revision <= target.revision {
            return Err(Error::ConstraintViolation(format!(
                "rollback target {:?} rejected: not a valid successor of the existing tag",
                new_tag.name
            )));
        }
        let affected = self.list_tags_affected_by_rollback(&target.name)?;
        let mut state = self.state.borrow_mut();
        for t in &affected {
            state.tags.remove(&t.name);
        }
        let replacement = Tag {
            branch: target.branch.clone(),
            ..new_tag.clone()
        };
        state.tags.insert(replacement.name.clone(), replacement);
        Ok(())
    }

    fn begin_transaction(&self) -> Result<()> {
        self.require_writable()?;
        if self.in_transaction.get() {
            return Err(Error::Transaction(
                "a transaction is already open on this handle".to_string(),
            ));
        }
        *self.snapshot.borrow_mut() = Some(self.state.borrow().clone());
        self.in_transaction.set(true);
        Ok(())
    }

    fn commit_transaction(&self) -> Result<()> {
        if !self.in_transaction.get() {
            return Err(Error::Transaction("no transaction is open".to_string()));
        }
        *self.snapshot.borrow_mut() = None;
        self.in_transaction.set(false);
        Ok(())
    }

    fn abort_transaction(&self) -> Result<()> {
        if !self.in_transaction.get() {
            return Err(Error::Transaction("no transaction is open".to_string()));
        }
        if let Some(snapshot) = self.snapshot.borrow_mut().take() {
            *self.state.borrow_mut() = snapshot;
        }
        self.in_transaction.set(false);
        Ok(())
    }

    fn list_recycle_bin(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn empty_recycle_bin(&self) -> Result<()> {
        Ok(())
    }
}

impl Drop for MockHistory {
    fn drop(&mut self) {
        if self.in_transaction.get() {
            let _ = self.abort_transaction();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str, revision: u64, timestamp: i64) -> Tag {
        Tag::new(
            name,
            RootHash::catalog_sha1("d13c98b4b48cedacda328eea4a30826333312c17").unwrap(),
            revision,
            timestamp,
        )
    }

    #[test]
    fn insert_and_get_number_of_tags() {
        let h = MockHistory::new("fqrn");
        h.insert(&tag("a", 1, 10)).unwrap();
        h.insert(&tag("b", 2, 20)).unwrap();
        assert_eq!(h.get_number_of_tags().unwrap(), 2);
    }

    #[test]
    fn read_only_rejects_writes() {
        let h = MockHistory::new_read_only("fqrn");
        assert!(matches!(h.insert(&tag("a", 1, 1)), Err(Error::ReadOnly)));
    }

    #[test]
    fn prune_branches_is_unsupported() {
        let h = MockHistory::new("fqrn");
        assert!(matches!(
            h.prune_branches(),
            Err(Error::Unsupported("PruneBranches"))
        ));
    }

    #[test]
    fn rollback_scenario_s2() {
        let h = MockHistory::new("fqrn");
        for (name, revision) in [
            ("foo", 1),
            ("bar", 2),
            ("moep", 4),
            ("moep_duplicate", 4),
            ("lol", 5),
            ("rofl", 8),
            ("also_rofl", 8),
        ] {
            h.insert(&tag(name, revision, 0)).unwrap();
        }
        h.rollback(&tag("moep", 10, 0)).unwrap();
        for name in ["foo", "bar", "moep", "moep_duplicate"] {
            assert!(h.exists(name).unwrap());
        }
        for name in ["lol", "rofl", "also_rofl"] {
            assert!(!h.exists(name).unwrap());
        }
    }

    #[test]
    fn abort_transaction_restores_snapshot() {
        let h = MockHistory::new("fqrn");
        h.begin_transaction().unwrap();
        h.insert(&tag("a", 1, 0)).unwrap();
        h.abort_transaction().unwrap();
        assert!(!h.exists("a").unwrap());
    }
}
