//! Filesystem-backed object storage. Objects are served back by the router
//! under `public_base_url`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::error::{AppError, Result};
use crate::storage::ObjectStorage;

#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root_dir: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root_dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Resolve a key below the root, rejecting anything that could escape it.
    fn path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(AppError::storage(format!("invalid object key '{}'", key)));
        }
        Ok(self.root_dir.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<String> {
        let path = self.path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // create_new: never overwrite an existing object.
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| AppError::storage(format!("cannot create {}: {}", key, e)))?;
        write_or_discard(file, &path, bytes)
            .await
            .map_err(|e| AppError::storage(format!("cannot write {}: {}", key, e)))?;

        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            let path = self.path(key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("🖼️ Object already gone: {}", key);
                }
                Err(e) => return Err(AppError::Io(e)),
            }
        }
        Ok(())
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        let rest = url.strip_prefix(&self.public_base_url)?;
        let key = rest.strip_prefix('/')?;
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }
}

/// Writes `bytes` into the freshly created `path`; on failure the partial
/// file is removed so no unreferenced object stays behind.
async fn write_or_discard<W: AsyncWrite + Unpin>(
    mut file: W,
    path: &Path,
    bytes: &[u8],
) -> std::io::Result<()> {
    let written = match file.write_all(bytes).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        drop(file);
        if let Err(rm) = tokio::fs::remove_file(path).await {
            warn!("🖼️ Could not remove partial object {}: {}", path.display(), rm);
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Accepts nothing; every write fails like a full disk would.
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "no space left")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn failed_writes_leave_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.png");
        tokio::fs::write(&path, b"").await.unwrap();

        let err = write_or_discard(FullDisk, &path, b"png bytes").await.unwrap_err();
        assert_eq!(err.to_string(), "no space left");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn upload_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "/storage/");

        let url = storage
            .upload("listing_images/1_0_5.jpg", b"jpeg", "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "/storage/listing_images/1_0_5.jpg");
        assert!(dir.path().join("listing_images/1_0_5.jpg").exists());

        let key = storage.key_for_url(&url).unwrap();
        storage.remove(&[key]).await.unwrap();
        assert!(!dir.path().join("listing_images/1_0_5.jpg").exists());
    }

    #[tokio::test]
    async fn upload_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "/storage");
        storage.upload("a.png", b"1", "image/png").await.unwrap();
        assert!(storage.upload("a.png", b"2", "image/png").await.is_err());
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "/storage");
        assert!(storage.upload("../evil.png", b"1", "image/png").await.is_err());
        assert!(storage.upload("/etc/passwd", b"1", "image/png").await.is_err());
    }

    #[tokio::test]
    async fn removing_missing_keys_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "/storage");
        storage.remove(&["nope.png".to_string()]).await.unwrap();
        assert_eq!(storage.key_for_url("https://elsewhere/x.png"), None);
    }
}
