//! Google Cloud Storage image store.
//!
//! Uploads go through the GCS JSON API using Application Default Credentials
//! from `gcp_auth`, which discovers service account files, user credentials
//! from `gcloud auth application-default login` and the GCE metadata server.

use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::TokenProvider;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageOperation};
use crate::models::OutputFormat;
use crate::storage::{ImageStore, image_file_name};

/// Read/write access to Google Cloud Storage.
pub const DEVSTORAGE_READ_WRITE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

const GCS_BASE_URL: &str = "https://storage.googleapis.com";

enum TokenSource {
    Provider(Arc<dyn TokenProvider>),
    #[cfg(test)]
    Mock(String),
}

impl TokenSource {
    async fn token(&self) -> Result<String, StorageError> {
        match self {
            TokenSource::Provider(provider) => {
                let token = provider
                    .token(&[DEVSTORAGE_READ_WRITE])
                    .await
                    .map_err(|e| StorageError::auth_error(e.to_string()))?;
                Ok(token.as_str().to_string())
            }
            #[cfg(test)]
            TokenSource::Mock(token) => Ok(token.clone()),
        }
    }
}

/// Uploads images to a GCS bucket and returns their public URLs.
pub struct GcsImageStore {
    client: reqwest::Client,
    auth: TokenSource,
    bucket: String,
    /// Base URL for GCS API (configurable for testing)
    base_url: String,
}

impl GcsImageStore {
    /// Create a store for `bucket` using Application Default Credentials.
    ///
    /// # Errors
    /// Returns `StorageError::AuthError` if no credentials can be found.
    #[instrument(level = "debug", name = "gcs_store_new")]
    pub async fn new(bucket: String) -> Result<Self, StorageError> {
        let provider = gcp_auth::provider().await.map_err(|e| {
            debug!("Failed to initialize ADC: {}", e);
            StorageError::auth_error(format!("Application Default Credentials not found: {}", e))
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            auth: TokenSource::Provider(provider),
            bucket,
            base_url: GCS_BASE_URL.to_string(),
        })
    }

    /// Create a store with a fixed token and custom base URL (for testing).
    #[cfg(test)]
    pub(crate) fn with_mock(bucket: &str, token: &str, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth: TokenSource::Mock(token.to_string()),
            bucket: bucket.to_string(),
            base_url,
        }
    }

    /// Public URL of an object in this store's bucket.
    pub fn public_url(&self, object: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, object)
    }

    /// Upload bytes to `object`.
    ///
    /// # Errors
    /// Returns `StorageError::OperationFailed` if the upload fails.
    pub async fn upload(
        &self,
        object: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let location = format!("gs://{}/{}", self.bucket, object);
        let token = self.auth.token().await?;

        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.base_url,
            self.bucket,
            urlencoding::encode(object)
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("Content-Type", content_type)
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| {
                StorageError::operation_failed(
                    &location,
                    StorageOperation::Upload,
                    format!("Upload request failed: {}", e),
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::operation_failed(
                location,
                StorageOperation::Upload,
                format!("Failed with status {}: {}", status, body),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl ImageStore for GcsImageStore {
    #[instrument(level = "debug", name = "gcs_store", skip(self, bytes), fields(bucket = %self.bucket, len = bytes.len()))]
    async fn store(&self, bytes: &[u8], format: OutputFormat) -> Result<String, StorageError> {
        let object = image_file_name(format);
        self.upload(&object, bytes, format.mime_type()).await?;
        Ok(self.public_url(&object))
    }

    fn backend(&self) -> &'static str {
        "gcs"
    }
}
