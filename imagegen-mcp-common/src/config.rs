//! Configuration module for loading environment variables and settings.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default OpenAI API base URL.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default directory for locally stored images.
pub const DEFAULT_TMP_PATH: &str = "./images";

/// Default number of locally stored images to keep.
pub const DEFAULT_MAX_IMAGES_TO_KEEP: usize = 50;

/// Port assumed for the default backend URL until the bound port is known.
pub const DEFAULT_PORT: u16 = 8080;

/// Credentials and endpoint for an OpenAI-compatible image API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    /// API key sent with every request
    pub api_key: String,
    /// OpenAI base URL (`https://api.openai.com/v1`) or Azure resource endpoint
    pub base_url: String,
    /// Azure OpenAI API version; `None` selects the plain OpenAI flavour
    pub api_version: Option<String>,
}

impl ProviderCredentials {
    /// Whether these credentials target an Azure OpenAI deployment.
    pub fn is_azure(&self) -> bool {
        self.api_version.is_some()
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credentials for `gpt-image-1` (required)
    pub openai: ProviderCredentials,
    /// Credentials for `FLUX.1-Kontext-pro`, when configured
    pub flux: Option<ProviderCredentials>,
    /// Public base URL under which locally stored images are served
    pub backend_server: String,
    /// Whether `backend_server` came from `BACKEND_SERVER`
    backend_server_explicit: bool,
    /// Directory for the local image store
    pub tmp_path: PathBuf,
    /// Number of newest local images kept after each write
    pub max_images_to_keep: usize,
    /// GCS bucket for image output; switches storage to GCS when set
    pub gcs_bucket: Option<String>,
    /// Timeout for fetching image references over HTTP
    pub fetch_timeout: Duration,
    /// Timeout for a single vendor generation call
    pub generation_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables and .env file.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingEnvVar` if OPENAI_API_KEY is not set and
    /// `ConfigError::InvalidValue` for unparseable numeric values.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let openai = ProviderCredentials {
            api_key: get("OPENAI_API_KEY")
                .ok_or_else(|| ConfigError::missing_env_var("OPENAI_API_KEY"))?,
            base_url: get("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            api_version: get("OPENAI_API_VERSION"),
        };

        let flux = get("FLUX_API_KEY").map(|api_key| ProviderCredentials {
            api_key,
            base_url: get("FLUX_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| openai.base_url.clone()),
            api_version: get("FLUX_API_VERSION").or_else(|| openai.api_version.clone()),
        });

        let explicit_backend = get("BACKEND_SERVER").map(|url| url.trim_end_matches('/').to_string());
        let backend_server_explicit = explicit_backend.is_some();
        let backend_server = explicit_backend.unwrap_or_else(|| local_backend(DEFAULT_PORT));

        let tmp_path = get("TMP_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TMP_PATH));

        let max_images_to_keep = parse_or(&get, "MAX_IMAGES_TO_KEEP", DEFAULT_MAX_IMAGES_TO_KEEP)?;
        if max_images_to_keep == 0 {
            return Err(ConfigError::invalid_value(
                "MAX_IMAGES_TO_KEEP",
                "must be at least 1",
            ));
        }

        let fetch_timeout = Duration::from_secs(parse_or(&get, "FETCH_TIMEOUT_SECS", 30u64)?);
        let generation_timeout =
            Duration::from_secs(parse_or(&get, "GENERATION_TIMEOUT_SECS", 300u64)?);

        Ok(Self {
            openai,
            flux,
            backend_server,
            backend_server_explicit,
            tmp_path,
            max_images_to_keep,
            gcs_bucket: get("GCS_BUCKET"),
            fetch_timeout,
            generation_timeout,
        })
    }

    /// Point the default backend URL at the port the server actually binds.
    ///
    /// An explicit `BACKEND_SERVER` is left untouched.
    pub fn with_listen_port(mut self, port: u16) -> Self {
        if !self.backend_server_explicit {
            self.backend_server = local_backend(port);
        }
        self
    }

    /// URL prefix under which the local store's files are served.
    pub fn upload_base_url(&self) -> String {
        format!("{}/_upload", self.backend_server)
    }
}

fn local_backend(port: u16) -> String {
    format!("http://localhost:{}", port)
}

fn parse_or<T, G>(get: &G, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid_value(name, format!("'{}': {}", raw, e))),
        None => Ok(default),
    }
}
