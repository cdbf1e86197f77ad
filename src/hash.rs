// src/hash.rs

//! Content hash type shared by tags.
//!
//! A [`RootHash`] identifies the filesystem catalog snapshot a tag points
//! at: an algorithm family plus digest bytes, tagged with a one-byte
//! suffix classifying what kind of object the hash names. Only the
//! `Catalog` suffix is ever produced by this crate's operations, but the
//! suffix byte is part of the on-disk representation (and of the legacy
//! databases this crate reads), so it is modeled rather than hard-coded.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Hash algorithm family. SHA-1 is what every on-disk revision this crate
/// reads and writes actually uses; the others are carried so the type
/// doesn't have to be revisited if a future schema adds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

/// What kind of object a [`RootHash`] names. Tags in this crate only ever
/// carry `Catalog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashSuffix {
    Catalog,
    Certificate,
    History,
    Metainfo,
    PartialHistory,
    None,
}

impl HashSuffix {
    fn as_char(self) -> char {
        match self {
            HashSuffix::Catalog => 'C',
            HashSuffix::Certificate => 'X',
            HashSuffix::History => 'H',
            HashSuffix::Metainfo => 'M',
            HashSuffix::PartialHistory => 'P',
            HashSuffix::None => '-',
        }
    }

    fn from_char(c: char) -> Self {
        match c {
            'C' => HashSuffix::Catalog,
            'X' => HashSuffix::Certificate,
            'H' => HashSuffix::History,
            'M' => HashSuffix::Metainfo,
            'P' => HashSuffix::PartialHistory,
            _ => HashSuffix::None,
        }
    }
}

/// A content hash with a variant tag: algorithm family plus a one-byte
/// suffix classifying the referenced object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootHash {
    pub algorithm: HashAlgorithm,
    pub digest: Vec<u8>,
    pub suffix: HashSuffix,
}

impl RootHash {
    pub fn new(algorithm: HashAlgorithm, digest: Vec<u8>, suffix: HashSuffix) -> Self {
        Self {
            algorithm,
            digest,
            suffix,
        }
    }

    /// Build a catalog-suffixed SHA-1 hash from a hex digest string, the
    /// convention used throughout this crate's tags and test fixtures.
    pub fn catalog_sha1(hex_digest: &str) -> Result<Self> {
        Self::from_hex(hex_digest, HashAlgorithm::Sha1, HashSuffix::Catalog)
    }

    pub fn from_hex(hex_digest: &str, algorithm: HashAlgorithm, suffix: HashSuffix) -> Result<Self> {
        let digest = hex::decode(hex_digest)
            .map_err(|e| Error::Storage(format!("invalid hex digest {hex_digest:?}: {e}")))?;
        if digest.len() != algorithm.digest_len() {
            return Err(Error::Storage(format!(
                "digest length {} does not match {:?}",
                digest.len(),
                algorithm
            )));
        }
        Ok(Self::new(algorithm, digest, suffix))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.digest)
    }

    /// Render the persisted form: hex digest followed by the one-letter
    /// suffix, matching the original `shash::Any::ToString()` convention.
    pub fn to_persisted_string(&self) -> String {
        format!("{}{}", self.to_hex(), self.suffix.as_char())
    }

    pub fn from_persisted_string(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::Storage("empty root hash".to_string()));
        }
        let (hex_part, suffix_char) = s.split_at(s.len() - 1);
        let suffix = HashSuffix::from_char(suffix_char.chars().next().unwrap());
        let algorithm = match hex_part.len() {
            40 => HashAlgorithm::Sha1,
            64 => HashAlgorithm::Sha256,
            128 => HashAlgorithm::Sha512,
            _ => {
                return Err(Error::Storage(format!(
                    "unrecognized root hash digest length in {s:?}"
                )));
            }
        };
        Self::from_hex(hex_part, algorithm, suffix)
    }
}

impl fmt::Display for RootHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_persisted_string())
    }
}

impl FromStr for RootHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_persisted_string(s)
    }
}
