//! Object storage gateway.
//!
//! Recordings live in an external blob store addressed by string key; the
//! pipeline only needs get/put/delete. The gateway is a trait so tests can
//! substitute an in-memory fake, with a filesystem-rooted implementation
//! for single-host deployments.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;

/// Errors from the object store gateway.
///
/// All variants are transient from the pipeline's point of view: nothing
/// is marked failed because of a store error, the recording is simply
/// retried next cycle.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("IO error for object {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Binary blob storage addressed by key
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the blob at `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    /// Store `bytes` at `key`, replacing any existing blob
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError>;

    /// Delete the blob at `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}

/// Object store backed by a local directory; keys map to relative paths.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        fs::read(self.object_path(key)).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ObjectStoreError::NotFound(key.to_string())
            } else {
                ObjectStoreError::Io {
                    key: key.to_string(),
                    source: e,
                }
            }
        })
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ObjectStoreError::Io {
                    key: key.to_string(),
                    source: e,
                })?;
        }

        fs::write(&path, bytes)
            .await
            .map_err(|e| ObjectStoreError::Io {
                key: key.to_string(),
                source: e,
            })
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        match fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ObjectStoreError::Io {
                key: key.to_string(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = FsObjectStore::new(temp.path());

        store
            .put("audio/250801_user.webm", b"raw audio")
            .await
            .unwrap();

        let bytes = store.get("audio/250801_user.webm").await.unwrap();
        assert_eq!(bytes, b"raw audio");

        store.delete("audio/250801_user.webm").await.unwrap();
        assert!(matches!(
            store.get("audio/250801_user.webm").await,
            Err(ObjectStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let temp = TempDir::new().unwrap();
        let store = FsObjectStore::new(temp.path());

        store.delete("nope/missing.m4a").await.unwrap();
    }

    #[tokio::test]
    async fn test_put_replaces_existing_blob() {
        let temp = TempDir::new().unwrap();
        let store = FsObjectStore::new(temp.path());

        store.put("a.m4a", b"first").await.unwrap();
        store.put("a.m4a", b"second").await.unwrap();

        assert_eq!(store.get("a.m4a").await.unwrap(), b"second");
    }
}
