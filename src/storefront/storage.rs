//! JSON key/value persistence for client-side state.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt value for {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Missing keys read as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let bytes = match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Corrupt { key: key.to_string(), source })
    }

    /// Writes through a temporary file so a crash never leaves half a value.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, self.path(key)).await?;
        debug!(key, "Value persisted");
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        assert_eq!(storage.get::<Vec<u32>>("panier").await.unwrap(), None);
        storage.set("panier", &vec![1u32, 2]).await.unwrap();
        assert_eq!(storage.get::<Vec<u32>>("panier").await.unwrap(), Some(vec![1, 2]));
        storage.remove("panier").await.unwrap();
        storage.remove("panier").await.unwrap();
        assert_eq!(storage.get::<Vec<u32>>("panier").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_value_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("panier.json"), b"{not json").unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(matches!(
            storage.get::<Vec<u32>>("panier").await,
            Err(StorageError::Corrupt { .. })
        ));
    }
}
