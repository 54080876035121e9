//! Object storage for uploaded images
//!
//! Files are written under the configured upload directory and served back
//! from `public_prefix` by the HTTP layer.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::models::ImageUpload;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid file type: {0}")]
    UnsupportedType(String),

    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("URL is not managed by this storage: {0}")]
    ForeignUrl(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether the upload itself was unacceptable (as opposed to a storage fault)
    pub fn is_rejected_upload(&self) -> bool {
        matches!(self, StorageError::UnsupportedType(_) | StorageError::TooLarge { .. })
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store one upload under `folder`, returning its public URL
    async fn put(&self, folder: &str, upload: &ImageUpload) -> Result<String, StorageError>;

    /// Remove a previously stored object; a missing object is not an error
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
}

/// Filesystem-backed storage
pub struct LocalStorage {
    config: UploadConfig,
}

impl LocalStorage {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    fn validate(&self, upload: &ImageUpload) -> Result<(), StorageError> {
        if !self.config.is_type_allowed(&upload.content_type) {
            return Err(StorageError::UnsupportedType(upload.content_type.clone()));
        }
        let size = upload.bytes.len() as u64;
        if size > self.config.max_file_size {
            return Err(StorageError::TooLarge {
                size,
                max: self.config.max_file_size,
            });
        }
        Ok(())
    }

    /// Map a public URL back to a path inside the upload root
    fn path_for(&self, url: &str) -> Result<PathBuf, StorageError> {
        let prefix = self.config.public_prefix.trim_end_matches('/');
        let relative = url
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;

        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::ForeignUrl(url.to_string()));
        }
        Ok(self.config.path.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(&self, folder: &str, upload: &ImageUpload) -> Result<String, StorageError> {
        self.validate(upload)?;

        let dir = self.config.path.join(folder);
        fs::create_dir_all(&dir).await?;

        let filename = format!(
            "{}.{}",
            Uuid::new_v4(),
            self.config.get_extension(&upload.content_type)
        );
        fs::write(dir.join(&filename), &upload.bytes).await?;

        let url = format!(
            "{}/{}/{}",
            self.config.public_prefix.trim_end_matches('/'),
            folder,
            filename
        );
        tracing::debug!("Stored {} ({} bytes) as {}", upload.filename, upload.bytes.len(), url);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let path = self.path_for(url)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Store every upload, removing the ones already written if any fails.
pub async fn put_all(
    storage: &Arc<dyn ObjectStorage>,
    folder: &str,
    uploads: &[ImageUpload],
) -> Result<Vec<String>, StorageError> {
    let mut urls = Vec::with_capacity(uploads.len());
    for upload in uploads {
        match storage.put(folder, upload).await {
            Ok(url) => urls.push(url),
            Err(e) => {
                delete_all(storage, &urls).await;
                return Err(e);
            }
        }
    }
    Ok(urls)
}

/// Best-effort removal; failures are logged, not returned.
pub async fn delete_all(storage: &Arc<dyn ObjectStorage>, urls: &[String]) {
    for url in urls {
        if let Err(e) = storage.delete(url).await {
            tracing::warn!("Failed to remove stored object {}: {}", url, e);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// In-memory storage that records puts and deletes
    #[derive(Default)]
    pub struct MemoryStorage {
        pub stored: Mutex<Vec<String>>,
        pub deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStorage for MemoryStorage {
        async fn put(&self, folder: &str, upload: &ImageUpload) -> Result<String, StorageError> {
            if upload.content_type == "application/x-broken" {
                return Err(StorageError::UnsupportedType(upload.content_type.clone()));
            }
            let mut stored = self.stored.lock().unwrap();
            let url = format!("/uploads/{}/{}-{}", folder, stored.len(), upload.filename);
            stored.push(url.clone());
            Ok(url)
        }

        async fn delete(&self, url: &str) -> Result<(), StorageError> {
            self.deleted.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    pub fn png(name: &str) -> ImageUpload {
        ImageUpload {
            filename: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{png, MemoryStorage};
    use super::*;

    fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(UploadConfig {
            path: dir.to_path_buf(),
            max_file_size: 16,
            ..UploadConfig::default()
        })
    }

    #[tokio::test]
    async fn test_put_and_delete_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let storage = storage(temp.path());

        let url = storage.put("posts", &png("a.png")).await.unwrap();
        assert!(url.starts_with("/uploads/posts/"));
        assert!(url.ends_with(".png"));

        let path = storage.path_for(&url).unwrap();
        assert!(path.exists());

        storage.delete(&url).await.unwrap();
        assert!(!path.exists());
        // Deleting again is fine.
        storage.delete(&url).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_validates_type_and_size() {
        let temp = tempfile::tempdir().unwrap();
        let storage = storage(temp.path());

        let mut text = png("a.txt");
        text.content_type = "text/plain".to_string();
        assert!(matches!(
            storage.put("posts", &text).await,
            Err(StorageError::UnsupportedType(_))
        ));

        let mut big = png("big.png");
        big.bytes = vec![0; 17];
        assert!(matches!(
            storage.put("posts", &big).await,
            Err(StorageError::TooLarge { size: 17, max: 16 })
        ));
    }

    #[tokio::test]
    async fn test_delete_rejects_paths_outside_root() {
        let temp = tempfile::tempdir().unwrap();
        let storage = storage(temp.path());

        assert!(matches!(
            storage.delete("/uploads/../secret").await,
            Err(StorageError::ForeignUrl(_))
        ));
        assert!(matches!(
            storage.delete("https://cdn.example.com/x.png").await,
            Err(StorageError::ForeignUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_put_all_cleans_up_on_failure() {
        let memory = Arc::new(MemoryStorage::default());
        let storage: Arc<dyn ObjectStorage> = memory.clone();

        let mut broken = png("c.png");
        broken.content_type = "application/x-broken".to_string();

        let result = put_all(&storage, "posts", &[png("a.png"), png("b.png"), broken]).await;
        assert!(result.is_err());
        assert_eq!(*memory.deleted.lock().unwrap(), *memory.stored.lock().unwrap());
        assert_eq!(memory.deleted.lock().unwrap().len(), 2);
    }
}
