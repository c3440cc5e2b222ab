use std::path::PathBuf;

use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    /// The object was already gone. Sweeps treat this as success.
    #[error("object not found")]
    NotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Where photo binaries live. The upload byte plumbing is an external
/// collaborator; the sweeper only ever needs to delete.
pub trait ObjectStore: Send + Sync {
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;
}

/// Flat on-disk store: each object is a single file under `dir`, keyed by
/// its storage reference.
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub async fn new(dir: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Photo storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        // Keys are storage references like "moment-photos/<uuid>.jpg";
        // strip any leading separator so join stays inside the store dir.
        self.dir.join(key.trim_start_matches('/'))
    }
}

impl ObjectStore for DiskStore {
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Object {} already gone", key);
                Err(StorageError::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }
}
