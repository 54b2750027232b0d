//! File store for attachment contents
//!
//! Metadata lives in the `attachments` table; the bytes live here under
//! generated names.

use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Storage backend for attachment bytes
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store the contents under a new generated filename and return it
    async fn save(&self, contents: &[u8]) -> Result<String>;

    /// Read a stored file
    async fn read(&self, filename: &str) -> Result<Vec<u8>>;

    /// Remove a stored file
    async fn remove(&self, filename: &str) -> Result<()>;
}

/// Files in a local directory (a mounted volume in deployments)
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the upload directory if it is missing
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf> {
        if !is_safe_filename(filename) {
            return Err(AppError::InvalidFormat {
                message: format!("Invalid attachment filename: {}", filename),
            });
        }
        Ok(self.root.join(filename))
    }
}

/// Generated names only: no separators, no parent references
pub fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\', '\0'])
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, contents: &[u8]) -> Result<String> {
        let filename = Uuid::new_v4().simple().to_string();
        let path = self.path_for(&filename)?;

        tokio::fs::write(&path, contents).await?;
        debug!(filename = %filename, bytes = contents.len(), "Stored attachment file");

        Ok(filename)
    }

    async fn read(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.path_for(filename)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound {
                resource_type: "Attachment".to_string(),
                id: filename.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, filename: &str) -> Result<()> {
        let path = self.path_for(filename)?;
        tokio::fs::remove_file(&path).await?;
        debug!(filename = %filename, "Removed attachment file");
        Ok(())
    }
}

/// Remove files whose rows are already gone. Failures are logged and counted,
/// never returned: the database is the source of truth.
pub async fn remove_files_best_effort<I>(store: &dyn FileStore, filenames: I)
where
    I: IntoIterator<Item = String>,
{
    let removals = filenames.into_iter().map(|filename| async move {
        if let Err(e) = store.remove(&filename).await {
            warn!(filename = %filename, error = %e, "Failed to remove attachment file");
            metrics::record_attachment_cleanup_failure();
        }
    });

    futures::future::join_all(removals).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> LocalFileStore {
        let dir = std::env::temp_dir().join(format!("prethesis-store-{}", Uuid::new_v4()));
        LocalFileStore::new(dir)
    }

    #[test]
    fn test_safe_filenames() {
        assert!(is_safe_filename("3f2b9c1e0a4d4e6f8a7b6c5d4e3f2a1b"));
        assert!(!is_safe_filename(""));
        assert!(!is_safe_filename(".."));
        assert!(!is_safe_filename("../etc/passwd"));
        assert!(!is_safe_filename("a\\b"));
    }

    #[tokio::test]
    async fn test_save_read_remove() {
        let store = temp_store();
        store.ensure_root().await.unwrap();

        let filename = store.save(b"research plan").await.unwrap();
        assert!(is_safe_filename(&filename));
        assert_eq!(store.read(&filename).await.unwrap(), b"research plan");

        store.remove(&filename).await.unwrap();
        let err = store.read(&filename).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));

        tokio::fs::remove_dir_all(store.root()).await.unwrap();
    }

    #[tokio::test]
    async fn test_best_effort_removal_ignores_missing_files() {
        let store = temp_store();
        store.ensure_root().await.unwrap();

        remove_files_best_effort(&store, vec!["missing".to_string()]).await;

        tokio::fs::remove_dir_all(store.root()).await.unwrap();
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let store = temp_store();
        let err = store.read("../secret").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidFormat { .. }));
    }
}
