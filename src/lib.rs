// src/lib.rs

//! A named-snapshot history store for a content-addressed filesystem
//! distribution system.
//!
//! Records named revisions ("tags") and the branching relationships
//! between them in a local database, with rollback and forward schema
//! migration across historical on-disk layouts.
//!
//! # Architecture
//!
//! - Storage adapter ([`db`]): owns the connection, pragmas, and manual
//!   transaction bracketing.
//! - Schema manager ([`db::schema`]): detects legacy layouts and
//!   migrates forward to the current one.
//! - Tag store ([`tag`]) and branch store ([`branch`]): CRUD over the
//!   two record types in [`model`].
//! - Rollback engine ([`rollback`]): computes the affected-tag set and
//!   performs the atomic replacement.
//! - History façade ([`history::SqliteHistory`]) and its in-memory
//!   counterpart ([`mock::MockHistory`]) both implement
//!   [`history::HistoryStore`].

pub mod branch;
pub mod db;
mod error;
pub mod hash;
pub mod history;
pub mod mock;
pub mod model;
pub mod rollback;
pub mod tag;

pub use db::schema::SchemaRevision;
pub use error::{Error, Result};
pub use hash::{HashAlgorithm, HashSuffix, RootHash};
pub use history::{HistoryStore, SqliteHistory};
pub use mock::MockHistory;
pub use model::{Branch, Tag};
