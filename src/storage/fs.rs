//! Filesystem content store.
//!
//! Layout: `{root}/bucket{owner}/{key}/{name}` with identifiers in decimal.

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{validate_name, ContentStore};
use crate::chord::types::NodeId;
use crate::error::StorageError;

#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn owner_dir(&self, owner: NodeId) -> PathBuf {
        self.root.join(format!("bucket{}", owner))
    }

    fn key_dir(&self, owner: NodeId, key: NodeId) -> PathBuf {
        self.owner_dir(owner).join(key.to_string())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

async fn remove_dir_if_present(path: &Path) -> Result<(), StorageError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path, e)),
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn put(
        &self,
        owner: NodeId,
        key: NodeId,
        name: &str,
        content: &[u8],
    ) -> Result<(), StorageError> {
        validate_name(name)?;
        let dir = self.key_dir(owner, key);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;
        let path = dir.join(name);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_error(&path, e))
    }

    async fn get(
        &self,
        owner: NodeId,
        key: NodeId,
        name: &str,
    ) -> Result<Option<Bytes>, StorageError> {
        validate_name(name)?;
        let path = self.key_dir(owner, key).join(name);
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(Some(Bytes::from(content))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn delete_key(&self, owner: NodeId, key: NodeId) -> Result<(), StorageError> {
        remove_dir_if_present(&self.key_dir(owner, key)).await
    }

    async fn delete_all(&self, owner: NodeId) -> Result<(), StorageError> {
        remove_dir_if_present(&self.owner_dir(owner)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_under_owner_and_key_directories() {
        let dir = tempdir().unwrap();
        let store = FsContentStore::new(dir.path());
        let owner = NodeId::from_u64(12);
        let key = NodeId::from_u64(5);

        store.put(owner, key, "hello.txt", b"hi").await.unwrap();
        assert!(dir.path().join("bucket12").join("5").join("hello.txt").exists());
        assert_eq!(
            store.get(owner, key, "hello.txt").await.unwrap(),
            Some(Bytes::from_static(b"hi"))
        );
        assert_eq!(store.get(owner, key, "missing").await.unwrap(), None);

        store.delete_key(owner, key).await.unwrap();
        assert_eq!(store.get(owner, key, "hello.txt").await.unwrap(), None);

        store.put(owner, key, "again.txt", b"x").await.unwrap();
        store.delete_all(owner).await.unwrap();
        assert!(!store.owner_dir(owner).exists());
        // deleting twice is fine
        store.delete_all(owner).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_escaping_names() {
        let dir = tempdir().unwrap();
        let store = FsContentStore::new(dir.path());
        let err = store
            .put(NodeId::from_u64(1), NodeId::from_u64(1), "../x", b"")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
    }
}
