//! Local file ownership.
//!
//! The [`Bucket`] records which files this node owns, grouped by file key.
//! File bytes live behind the [`ContentStore`] seam so the ring logic never
//! touches the filesystem directly.
//!
//! # Backends
//!
//! - [`FsContentStore`] - one directory per owner and key under a root dir
//! - [`MemoryContentStore`] - in-memory, used by tests and ephemeral nodes

mod fs;
mod memory;

pub use fs::FsContentStore;
pub use memory::MemoryContentStore;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::chord::types::NodeId;
use crate::error::StorageError;

/// Byte storage for owned files, keyed by (owner, file key, file name).
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(
        &self,
        owner: NodeId,
        key: NodeId,
        name: &str,
        content: &[u8],
    ) -> Result<(), StorageError>;

    /// Returns `Ok(None)` if the file does not exist.
    async fn get(&self, owner: NodeId, key: NodeId, name: &str)
        -> Result<Option<Bytes>, StorageError>;

    /// Remove every file stored under `key`.
    async fn delete_key(&self, owner: NodeId, key: NodeId) -> Result<(), StorageError>;

    /// Remove everything stored for `owner`.
    async fn delete_all(&self, owner: NodeId) -> Result<(), StorageError>;
}

/// Reject names that would escape the key directory.
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Keys this node owns and the file names under each key.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Bucket {
    entries: BTreeMap<NodeId, Vec<String>>,
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` under `key`. A name is listed once per key.
    pub fn insert(&mut self, key: NodeId, name: String) {
        let names = self.entries.entry(key).or_default();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    pub fn remove(&mut self, key: &NodeId) -> Option<Vec<String>> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &NodeId) -> Option<&Vec<String>> {
        self.entries.get(key)
    }

    /// Keys in the ring interval (start, end].
    pub fn keys_in_range(&self, start: &NodeId, end: &NodeId) -> Vec<NodeId> {
        self.entries
            .keys()
            .filter(|key| key.is_between(start, end, true))
            .copied()
            .collect()
    }

    pub fn keys(&self) -> Vec<NodeId> {
        self.entries.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Vec<String>)> {
        self.entries.iter()
    }

    pub fn file_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_map(&self) -> BTreeMap<NodeId, Vec<String>> {
        self.entries.clone()
    }
}
