//! Image persistence for URL-based response formats.
//!
//! `markdown` and `adaptive_card` responses embed a URL for every generated
//! image, so each image is written to an [`ImageStore`] first. The default
//! store writes into a local directory served by the HTTP server under
//! `/_upload`; when a GCS bucket is configured images are uploaded there
//! instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{StorageError, StorageOperation};
use crate::gcs::GcsImageStore;
use crate::models::OutputFormat;

/// File name prefix of every stored image.
pub const IMAGE_FILE_PREFIX: &str = "gpt-image";

/// Destination for generated images that must be reachable by URL.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist `bytes` and return the URL under which they can be fetched.
    async fn store(&self, bytes: &[u8], format: OutputFormat) -> Result<String, StorageError>;

    /// Short backend name for logs and resource listings.
    fn backend(&self) -> &'static str;
}

/// Build a unique object or file name for a stored image.
pub fn image_file_name(format: OutputFormat) -> String {
    format!(
        "{}-{}.{}",
        IMAGE_FILE_PREFIX,
        uuid::Uuid::new_v4(),
        format.extension()
    )
}

/// Select the store configured for this process.
///
/// # Errors
/// Returns `StorageError::AuthError` if a GCS bucket is configured but no
/// Application Default Credentials can be found.
pub async fn store_from_config(config: &Config) -> Result<Arc<dyn ImageStore>, StorageError> {
    match &config.gcs_bucket {
        Some(bucket) => {
            info!(bucket = %bucket, "Using GCS image store");
            Ok(Arc::new(GcsImageStore::new(bucket.clone()).await?))
        }
        None => {
            info!(dir = %config.tmp_path.display(), "Using local image store");
            Ok(Arc::new(LocalImageStore::from_config(config)))
        }
    }
}

/// Stores images in a local directory, keeping only the newest files.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    dir: PathBuf,
    base_url: String,
    max_images: usize,
}

impl LocalImageStore {
    /// Create a store writing to `dir` whose files are served at `base_url`.
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>, max_images: usize) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_images: max_images.max(1),
        }
    }

    /// Create a store from `TMP_PATH`, `BACKEND_SERVER` and `MAX_IMAGES_TO_KEEP`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.tmp_path.clone(),
            config.upload_base_url(),
            config.max_images_to_keep,
        )
    }

    /// Directory the store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove the oldest stored images beyond the retention limit.
    ///
    /// `keep` is never removed. Returns the number of files deleted.
    pub async fn prune(&self, keep: &Path) -> Result<usize, StorageError> {
        let prune_failed = |e: std::io::Error| {
            StorageError::operation_failed(
                self.dir.display().to_string(),
                StorageOperation::Prune,
                e.to_string(),
            )
        };

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(prune_failed)?;
        let mut stored: Vec<(SystemTime, PathBuf)> = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(prune_failed)? {
            let is_image = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&format!("{}-", IMAGE_FILE_PREFIX)));
            if !is_image {
                continue;
            }
            let metadata = entry.metadata().await.map_err(prune_failed)?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            stored.push((modified, entry.path()));
        }

        if stored.len() <= self.max_images {
            return Ok(0);
        }

        // Newest first; the file just written always counts as newest.
        stored.sort_by(|a, b| {
            let a_keep = a.1 == keep;
            let b_keep = b.1 == keep;
            b_keep.cmp(&a_keep).then_with(|| b.0.cmp(&a.0))
        });

        let mut removed = 0;
        for (_, path) in stored.into_iter().skip(self.max_images) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "Pruned stored image");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(prune_failed(e)),
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    #[instrument(level = "debug", name = "local_store", skip(self, bytes), fields(len = bytes.len(), format = %format))]
    async fn store(&self, bytes: &[u8], format: OutputFormat) -> Result<String, StorageError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StorageError::invalid_location(format!("{}: {}", self.dir.display(), e))
        })?;

        let file_name = image_file_name(format);
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            StorageError::operation_failed(
                path.display().to_string(),
                StorageOperation::Write,
                e.to_string(),
            )
        })?;

        // The image is already persisted; retention failures are not fatal.
        match self.prune(&path).await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Pruned old images"),
            Err(e) => warn!(error = %e, "Failed to prune old images"),
        }

        Ok(format!("{}/{}", self.base_url, file_name))
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}
