//! Moving owned files between a node's bucket, its content store and the
//! bulk-transfer payloads exchanged with peers.
//!
//! Storage failures on individual files are logged and the file is skipped;
//! they never abort a whole transfer.

use log::{debug, error, info, warn};

use crate::chord::types::{batch_file_count, File, FileBatch, NodeId};
use crate::error::StorageError;
use crate::storage::{Bucket, ContentStore};

/// Read every listed file under `key`, skipping unreadable ones.
async fn read_files(store: &dyn ContentStore, owner: NodeId, key: NodeId, names: &[String]) -> Vec<File> {
    let mut files = Vec::with_capacity(names.len());
    for name in names {
        match store.get(owner, key, name).await {
            Ok(Some(content)) => files.push(File {
                id: key,
                name: name.clone(),
                content,
            }),
            Ok(None) => warn!("File {}/{} is listed but missing from storage", key, name),
            Err(e) => error!("Failed to read {}/{}: {}", key, name, e),
        }
    }
    files
}

/// Hand over every key in (`old_predecessor`, `new_predecessor`].
///
/// Matching keys are read into the payload and then removed from the bucket
/// and the content store. Other keys are untouched.
pub async fn take_transfer_set(
    bucket: &mut Bucket,
    store: &dyn ContentStore,
    owner: NodeId,
    old_predecessor: NodeId,
    new_predecessor: NodeId,
) -> FileBatch {
    let mut batch = FileBatch::new();
    for key in bucket.keys_in_range(&old_predecessor, &new_predecessor) {
        let names = bucket.remove(&key).unwrap_or_default();
        let files = read_files(store, owner, key, &names).await;
        if let Err(e) = store.delete_key(owner, key).await {
            error!("Failed to delete transferred key {}: {}", key, e);
        }
        if !files.is_empty() {
            batch.insert(key, files);
        }
    }
    if !batch.is_empty() {
        info!(
            "Transferring {} files in ({}, {}] to new predecessor",
            batch_file_count(&batch),
            old_predecessor,
            new_predecessor
        );
    }
    batch
}

/// Persist a single file and list it in the bucket.
pub async fn store_file(
    bucket: &mut Bucket,
    store: &dyn ContentStore,
    owner: NodeId,
    file: File,
) -> Result<(), StorageError> {
    store.put(owner, file.id, &file.name, &file.content).await?;
    debug!("Stored {} under key {}", file.name, file.id);
    bucket.insert(file.id, file.name);
    Ok(())
}

/// Merge an incoming payload, appending to existing keys. Returns the
/// number of files installed.
pub async fn bulk_install(
    bucket: &mut Bucket,
    store: &dyn ContentStore,
    owner: NodeId,
    batch: FileBatch,
) -> usize {
    let mut installed = 0;
    for (key, files) in batch {
        for file in files {
            if file.id != key {
                warn!("File {} carries id {} but arrived under key {}", file.name, file.id, key);
            }
            let name = file.name.clone();
            match store_file(bucket, store, owner, File { id: key, ..file }).await {
                Ok(()) => installed += 1,
                Err(e) => error!("Skipping {} during bulk install: {}", name, e),
            }
        }
    }
    installed
}

/// Copy every owned file into a payload without touching local state.
pub async fn export_all(bucket: &Bucket, store: &dyn ContentStore, owner: NodeId) -> FileBatch {
    let mut batch = FileBatch::new();
    for (key, names) in bucket.iter() {
        let files = read_files(store, owner, *key, names).await;
        if !files.is_empty() {
            batch.insert(*key, files);
        }
    }
    batch
}

/// Drop the bucket and everything stored for `owner`.
pub async fn discard_all(bucket: &mut Bucket, store: &dyn ContentStore, owner: NodeId) {
    bucket.clear();
    if let Err(e) = store.delete_all(owner).await {
        error!("Failed to delete local data for {}: {}", owner, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryContentStore;
    use bytes::Bytes;

    fn file(key: u64, name: &str) -> File {
        File {
            id: NodeId::from_u64(key),
            name: name.to_string(),
            content: Bytes::from(format!("content of {}", name)),
        }
    }

    async fn seeded(owner: NodeId, keys: &[u64]) -> (Bucket, MemoryContentStore) {
        let store = MemoryContentStore::new();
        let mut bucket = Bucket::new();
        for k in keys {
            store_file(&mut bucket, &store, owner, file(*k, &format!("f{}", k)))
                .await
                .unwrap();
        }
        (bucket, store)
    }

    #[tokio::test]
    async fn transfer_set_moves_only_the_range() {
        let owner = NodeId::from_u64(6);
        let (mut bucket, store) = seeded(owner, &[2, 3, 4, 5, 6]).await;

        let batch = take_transfer_set(&mut bucket, &store, owner, NodeId::from_u64(1), NodeId::from_u64(3)).await;

        assert_eq!(batch.keys().copied().collect::<Vec<_>>(), vec![NodeId::from_u64(2), NodeId::from_u64(3)]);
        assert_eq!(bucket.keys(), vec![NodeId::from_u64(4), NodeId::from_u64(5), NodeId::from_u64(6)]);
        assert_eq!(store.count(owner).await, 3);
        assert_eq!(batch[&NodeId::from_u64(2)][0].content, Bytes::from("content of f2"));
    }

    #[tokio::test]
    async fn bulk_install_appends() {
        let owner = NodeId::from_u64(1);
        let (mut bucket, store) = seeded(owner, &[5]).await;
        let mut batch = FileBatch::new();
        batch.insert(NodeId::from_u64(5), vec![file(5, "other")]);
        batch.insert(NodeId::from_u64(7), vec![file(7, "x"), file(7, "y")]);

        assert_eq!(bulk_install(&mut bucket, &store, owner, batch).await, 3);
        assert_eq!(bucket.get(&NodeId::from_u64(5)).unwrap().len(), 2);
        assert_eq!(bucket.file_count(), 4);
        assert_eq!(store.count(owner).await, 4);
    }

    #[tokio::test]
    async fn bulk_install_skips_bad_files() {
        let owner = NodeId::from_u64(1);
        let mut bucket = Bucket::new();
        let store = MemoryContentStore::new();
        let mut batch = FileBatch::new();
        batch.insert(NodeId::from_u64(2), vec![file(2, "../escape"), file(2, "fine")]);

        assert_eq!(bulk_install(&mut bucket, &store, owner, batch).await, 1);
        assert_eq!(bucket.get(&NodeId::from_u64(2)).unwrap(), &vec!["fine".to_string()]);
    }

    #[tokio::test]
    async fn export_leaves_state_until_discard() {
        let owner = NodeId::from_u64(3);
        let (mut bucket, store) = seeded(owner, &[1, 2]).await;

        let batch = export_all(&bucket, &store, owner).await;
        assert_eq!(batch_file_count(&batch), 2);
        assert_eq!(bucket.file_count(), 2);

        discard_all(&mut bucket, &store, owner).await;
        assert!(bucket.is_empty());
        assert_eq!(store.count(owner).await, 0);
    }
}
