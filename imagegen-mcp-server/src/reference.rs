//! Image reference resolution.
//!
//! Edit requests name their source images and mask with plain strings. Each
//! string is classified as a `data:` URL, an `http(s)` URL or a filesystem
//! path, and resolved to raw bytes plus a MIME type.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use futures::future::try_join_all;
use imagegen_mcp_common::error::{Error, Result};
use tracing::{debug, instrument};

/// MIME type used when neither headers, bytes nor extension identify the image.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Default timeout for fetching images from URLs (30 seconds).
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A classified image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// `data:<mime>;base64,<payload>`
    DataUrl(String),
    /// Absolute `http` or `https` URL
    Url(reqwest::Url),
    /// Anything else, read from the local filesystem
    FilePath(PathBuf),
}

impl ImageReference {
    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ImageReference::DataUrl(_) => "data_url",
            ImageReference::Url(_) => "url",
            ImageReference::FilePath(_) => "file",
        }
    }
}

/// Classify a reference string. First match wins: `data:` prefix, then an
/// absolute http(s) URL, then a filesystem path.
pub fn classify(reference: &str) -> ImageReference {
    let trimmed = reference.trim();

    if trimmed
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
    {
        return ImageReference::DataUrl(trimmed.to_string());
    }

    if let Ok(url) = reqwest::Url::parse(trimmed) {
        if matches!(url.scheme(), "http" | "https") && url.has_host() {
            return ImageReference::Url(url);
        }
    }

    ImageReference::FilePath(PathBuf::from(trimmed))
}

/// Raw image bytes with their MIME type. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Image bytes
    pub bytes: Vec<u8>,
    /// Declared or inferred MIME type
    pub mime_type: String,
}

/// Identify an image format from its leading bytes.
pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|format| format.to_mime_type())
}

/// Decode a `data:<mime>;base64,<payload>` URL.
///
/// # Errors
/// Returns `Error::MalformedDataUrl` when the header is incomplete, the
/// encoding is not base64, or the payload does not decode.
pub fn decode_data_url(url: &str) -> Result<DecodedImage> {
    let rest = match (url.get(..5), url.get(5..)) {
        (Some(prefix), Some(rest)) if prefix.eq_ignore_ascii_case("data:") => rest,
        _ => return Err(Error::MalformedDataUrl("missing 'data:' prefix".to_string())),
    };

    let (header, payload) = rest.split_once(',').ok_or_else(|| {
        Error::MalformedDataUrl(
            "missing ',' separator (expected data:<mime>;base64,<data>)".to_string(),
        )
    })?;

    let media_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| Error::MalformedDataUrl("only base64 data URLs are supported".to_string()))?;

    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if payload.is_empty() {
        return Err(Error::MalformedDataUrl("empty base64 payload".to_string()));
    }

    let bytes = BASE64
        .decode(payload.as_bytes())
        .map_err(|e| Error::MalformedDataUrl(format!("invalid base64 payload: {}", e)))?;

    let mime_type = match media_type.split(';').next().map(str::trim) {
        Some(declared) if !declared.is_empty() => declared.to_ascii_lowercase(),
        _ => sniff_mime_type(&bytes).unwrap_or(FALLBACK_MIME_TYPE).to_string(),
    };

    Ok(DecodedImage { bytes, mime_type })
}

/// Resolves image references to bytes.
///
/// Holds one HTTP client so URL fetches share a connection pool.
#[derive(Debug, Clone)]
pub struct ImageResolver {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for ImageResolver {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_FETCH_TIMEOUT)
    }
}

impl ImageResolver {
    /// Create a resolver using `client` with a per-request `timeout`.
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Resolve a single reference.
    #[instrument(level = "debug", skip(self, reference))]
    pub async fn resolve(&self, reference: &str) -> Result<DecodedImage> {
        let classified = classify(reference);
        debug!(kind = classified.kind(), "Resolving image reference");

        let image = match classified {
            ImageReference::DataUrl(url) => decode_data_url(&url)?,
            ImageReference::Url(url) => self.fetch(url).await?,
            ImageReference::FilePath(path) => read_file(&path).await?,
        };

        debug!(bytes = image.bytes.len(), mime_type = %image.mime_type, "Resolved image reference");
        Ok(image)
    }

    /// Resolve every reference concurrently, preserving input order.
    ///
    /// The first failure is returned and the remaining resolutions are dropped.
    pub async fn resolve_all<S: AsRef<str>>(&self, references: &[S]) -> Result<Vec<DecodedImage>> {
        try_join_all(references.iter().map(|r| self.resolve(r.as_ref()))).await
    }

    async fn fetch(&self, url: reqwest::Url) -> Result<DecodedImage> {
        let url_str = url.to_string();

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("request timed out after {:?}", self.timeout)
                } else {
                    "request failed".to_string()
                };
                Error::Fetch {
                    url: url_str.clone(),
                    message,
                    source: Some(e),
                }
            })?;

        let status = response.status();
        let response = response.error_for_status().map_err(|e| Error::Fetch {
            url: url_str.clone(),
            message: format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ),
            source: Some(e),
        })?;

        let declared = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty() && v != FALLBACK_MIME_TYPE);

        let bytes = response.bytes().await.map_err(|e| Error::Fetch {
            url: url_str.clone(),
            message: "failed to read response body".to_string(),
            source: Some(e),
        })?;

        let mime_type = declared.unwrap_or_else(|| {
            sniff_mime_type(&bytes)
                .unwrap_or(FALLBACK_MIME_TYPE)
                .to_string()
        });

        Ok(DecodedImage {
            bytes: bytes.to_vec(),
            mime_type,
        })
    }
}

async fn read_file(path: &Path) -> Result<DecodedImage> {
    let bytes = tokio::fs::read(path).await.map_err(|e| Error::NotFound {
        path: path.display().to_string(),
        source: e,
    })?;

    let mime_type = sniff_mime_type(&bytes)
        .map(str::to_string)
        .or_else(|| mime_guess::from_path(path).first_raw().map(str::to_string))
        .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string());

    Ok(DecodedImage { bytes, mime_type })
}
