//! In-memory content store. Nothing survives a restart.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{validate_name, ContentStore};
use crate::chord::types::NodeId;
use crate::error::StorageError;

type FileKey = (NodeId, NodeId, String);

#[derive(Debug, Default)]
pub struct MemoryContentStore {
    files: Mutex<HashMap<FileKey, Bytes>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files held for `owner`.
    pub async fn count(&self, owner: NodeId) -> usize {
        self.files
            .lock()
            .await
            .keys()
            .filter(|(o, _, _)| *o == owner)
            .count()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(
        &self,
        owner: NodeId,
        key: NodeId,
        name: &str,
        content: &[u8],
    ) -> Result<(), StorageError> {
        validate_name(name)?;
        self.files
            .lock()
            .await
            .insert((owner, key, name.to_string()), Bytes::copy_from_slice(content));
        Ok(())
    }

    async fn get(
        &self,
        owner: NodeId,
        key: NodeId,
        name: &str,
    ) -> Result<Option<Bytes>, StorageError> {
        validate_name(name)?;
        Ok(self
            .files
            .lock()
            .await
            .get(&(owner, key, name.to_string()))
            .cloned())
    }

    async fn delete_key(&self, owner: NodeId, key: NodeId) -> Result<(), StorageError> {
        self.files
            .lock()
            .await
            .retain(|(o, k, _), _| !(*o == owner && *k == key));
        Ok(())
    }

    async fn delete_all(&self, owner: NodeId) -> Result<(), StorageError> {
        self.files.lock().await.retain(|(o, _, _), _| *o != owner);
        Ok(())
    }
}
