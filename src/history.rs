// src/history.rs

//! History façade (spec §4.6, §6): the public operation surface, owning
//! the database handle, the `writable` flag, and the `fqrn`.

use std::path::Path;

use crate::branch;
use crate::db::schema::{self, SchemaRevision};
use crate::db::StorageHandle;
use crate::error::{Error, Result};
use crate::model::{Branch, Tag};
use crate::rollback;
use crate::tag;

/// The capability set shared by the persistent ([`SqliteHistory`]) and
/// in-memory ([`crate::mock::MockHistory`]) variants (spec §9).
pub trait HistoryStore {
    fn fqrn(&self) -> &str;
    fn is_writable(&self) -> bool;

    fn insert(&self, tag: &Tag) -> Result<()>;
    fn remove(&self, name: &str) -> Result<()>;
    fn exists(&self, name: &str) -> Result<bool>;
    fn get_by_name(&self, name: &str) -> Result<Tag>;
    fn get_by_date(&self, timestamp: i64) -> Result<Tag>;
    fn list(&self) -> Result<Vec<Tag>>;
    fn get_number_of_tags(&self) -> Result<u64>;
    fn get_hashes(&self) -> Result<Vec<crate::hash::RootHash>>;

    fn insert_branch(&self, branch: &Branch) -> Result<()>;
    fn list_branches(&self) -> Result<Vec<Branch>>;
    fn exists_branch(&self, name: &str) -> Result<bool>;
    fn get_branch_head(&self, branch_name: &str) -> Result<Tag>;
    fn prune_branches(&self) -> Result<()>;

    fn list_tags_affected_by_rollback(&self, target_name: &str) -> Result<Vec<Tag>>;
    fn rollback(&self, new_tag: &Tag) -> Result<()>;

    fn begin_transaction(&self) -> Result<()>;
    fn commit_transaction(&self) -> Result<()>;
    fn abort_transaction(&self) -> Result<()>;

    fn list_recycle_bin(&self) -> Result<Vec<String>>;
    fn empty_recycle_bin(&self) -> Result<()>;
}

/// The persistent, SQLite-backed history store.
pub struct SqliteHistory {
    storage: StorageHandle,
    fqrn: String,
}

impl SqliteHistory {
    /// Create a new history database at `path`, stamped with `fqrn`
    /// (spec §6: `Create`). Fails if `path` already exists.
    pub fn create(path: &Path, fqrn: &str) -> Result<Self> {
        let storage = StorageHandle::create(path, fqrn)?;
        Ok(Self {
            storage,
            fqrn: fqrn.to_string(),
        })
    }

    /// Open an existing history database read-only (spec §6: `Open`).
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_internal(path, false)
    }

    /// Open an existing history database writable, triggering a one-shot
    /// forward migration if needed (spec §6: `OpenWritable`).
    pub fn open_writable(path: &Path) -> Result<Self> {
        Self::open_internal(path, true)
    }

    fn open_internal(path: &Path, writable: bool) -> Result<Self> {
        let storage = StorageHandle::open(path, writable)?;
        let fqrn = schema::read_fqrn(storage.conn())?;
        Ok(Self { storage, fqrn })
    }

    fn require_writable(&self) -> Result<()> {
        if !self.storage.is_writable() {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    /// The on-disk schema revision this handle is currently reading
    /// (spec §4.2). Writable handles report `V1R3` (current) once open,
    /// since `open_writable` migrates eagerly.
    pub fn schema_revision(&self) -> Result<SchemaRevision> {
        schema::detect_revision(self.storage.conn())
    }
}

impl HistoryStore for SqliteHistory {
    fn fqrn(&self) -> &str {
        &self.fqrn
    }

    fn is_writable(&self) -> bool {
        self.storage.is_writable()
    }

    fn insert(&self, t: &Tag) -> Result<()> {
        self.require_writable()?;
        tag::insert(self.storage.conn(), t)
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.require_writable()?;
        tag::remove(self.storage.conn(), name)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        tag::exists(self.storage.conn(), name)
    }

    fn get_by_name(&self, name: &str) -> Result<Tag> {
        tag::get_by_name(self.storage.conn(), name)
    }

    fn get_by_date(&self, timestamp: i64) -> Result<Tag> {
        tag::get_by_date(self.storage.conn(), timestamp)
    }

    fn list(&self) -> Result<Vec<Tag>> {
        tag::list(self.storage.conn())
    }

    fn get_number_of_tags(&self) -> Result<u64> {
        tag::count(self.storage.conn())
    }

    fn get_hashes(&self) -> Result<Vec<crate::hash::RootHash>> {
        tag::hashes(self.storage.conn())
    }

    fn insert_branch(&self, b: &Branch) -> Result<()> {
        self.require_writable()?;
        branch::insert(self.storage.conn(), b)
    }

    fn list_branches(&self) -> Result<Vec<Branch>> {
        branch::list(self.storage.conn())
    }

    fn exists_branch(&self, name: &str) -> Result<bool> {
        branch::exists(self.storage.conn(), name)
    }

    fn get_branch_head(&self, branch_name: &str) -> Result<Tag> {
        branch::head(self.storage.conn(), branch_name)
    }

    fn prune_branches(&self) -> Result<()> {
        self.require_writable()?;
        if !self.storage.in_transaction() {
            return Err(Error::Transaction(
                "PruneBranches must run inside an open transaction".to_string(),
            ));
        }
        branch::prune(self.storage.conn())
    }

    fn list_tags_affected_by_rollback(&self, target_name: &str) -> Result<Vec<Tag>> {
        rollback::list_affected_by_rollback(self.storage.conn(), target_name)
    }

    fn rollback(&self, new_tag: &Tag) -> Result<()> {
        self.require_writable()?;
        if !self.storage.in_transaction() {
            return Err(Error::Transaction(
                "Rollback must run inside an open transaction".to_string(),
            ));
        }
        rollback::rollback(self.storage.conn(), new_tag)
    }

    fn begin_transaction(&self) -> Result<()> {
        self.require_writable()?;
        self.storage.begin()
    }

    fn commit_transaction(&self) -> Result<()> {
        self.storage.commit()
    }

    fn abort_transaction(&self) -> Result<()> {
        self.storage.abort()
    }

    fn list_recycle_bin(&self) -> Result<Vec<String>> {
        schema::recycle_bin_entries(self.storage.conn())
    }

    fn empty_recycle_bin(&self) -> Result<()> {
        self.require_writable()?;
        schema::empty_recycle_bin(self.storage.conn())
    }
}
