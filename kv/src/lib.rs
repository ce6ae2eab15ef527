//! Key-value persistence for vaultvoice.
//!
//! A [`KVStore`] maps string keys to opaque byte values. Two backends are
//! provided: [`MemoryStore`] for tests and ephemeral sessions, and
//! [`RedbStore`] for on-disk persistence. Both apply a batch of
//! [`WriteOp`]s atomically, which is what lets callers replace a profile
//! or remove every record of a user without readers observing a half
//! written state.
//!
//! Typed records are encoded as MessagePack with named fields, see
//! [`get_record`] and [`encode_record`].

mod codec;
pub mod memory;
pub mod redb;

use std::fmt;
use thiserror::Error;

pub use codec::{decode_record, encode_record, get_record};
pub use crate::memory::MemoryStore;
pub use crate::redb::RedbStore;

/// Errors that can occur in KV store operations.
#[derive(Error, Debug)]
pub enum KVError {
    #[error("kv: storage error: {0}")]
    Storage(String),

    #[error("kv: serialization error: {0}")]
    Serialization(String),
}

/// Result type for KV operations.
pub type KVResult<T> = Result<T, KVError>;

/// A single mutation inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

impl WriteOp {
    pub fn put(key: impl Into<String>, value: Vec<u8>) -> Self {
        WriteOp::Put {
            key: key.into(),
            value,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        WriteOp::Delete { key: key.into() }
    }

    /// Returns the key this operation touches.
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Put { key, .. } | WriteOp::Delete { key } => key,
        }
    }
}

/// Key-value store trait.
///
/// Implementations must be safe for concurrent use. A reader never sees
/// part of a batch passed to [`KVStore::apply`]: either all of its
/// operations are visible or none are.
pub trait KVStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>>;

    /// Set a key-value pair, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> KVResult<()> {
        self.apply(&[WriteOp::put(key, value.to_vec())])
    }

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> KVResult<()> {
        self.apply(&[WriteOp::delete(key)])
    }

    /// Return every entry whose key starts with `prefix`, sorted by key.
    fn scan(&self, prefix: &str) -> KVResult<Vec<(String, Vec<u8>)>>;

    /// Return every key starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> KVResult<Vec<String>> {
        Ok(self.scan(prefix)?.into_iter().map(|(k, _)| k).collect())
    }

    /// Apply all operations in order as one atomic unit.
    fn apply(&self, ops: &[WriteOp]) -> KVResult<()>;
}

impl fmt::Debug for dyn KVStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KVStore {{ ... }}")
    }
}
