//! Error types for the common library.
//!
//! This module provides a unified error hierarchy using `thiserror` so the MCP
//! tool layer and the REST layer can report failures the same way.
//!
//! # Error Categories
//!
//! - `ConfigError`: Missing or invalid configuration
//! - `StorageError`: Persisting generated images (local directory or GCS)
//! - `Error::Validation`: Request shape violations, caught before any I/O
//! - `Error::MalformedDataUrl`: `data:` references that do not decode
//! - `Error::Fetch`: HTTP(S) image references that could not be downloaded
//! - `Error::NotFound`: File path references that could not be read
//! - `Error::UnsupportedFormat`: Unknown `response_format` values
//! - `Error::Serialization`: Response documents that failed to serialize
//! - `Error::Generator`: Failures reported by the hosted image model

use std::fmt;

use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    /// Create a new field validation error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Unified error type for the image service.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors (missing env vars, invalid values)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Image persistence errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Input validation errors, one entry per offending field
    #[error("Validation error: {}", join_validation(.0))]
    Validation(Vec<ValidationError>),

    /// A `data:` reference whose header or base64 payload is invalid
    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(String),

    /// An HTTP(S) reference that could not be fetched
    #[error("Failed to fetch image from {url}: {message}")]
    Fetch {
        /// The URL that was requested
        url: String,
        /// Description of the failure (status line or transport error)
        message: String,
        /// Underlying transport error, if any
        #[source]
        source: Option<reqwest::Error>,
    },

    /// A file path reference that does not exist or cannot be read
    #[error("Image file not found: {path}")]
    NotFound {
        /// The path that was read
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An unrecognized response format
    #[error("Unsupported response format '{0}'. Valid options: image, markdown, adaptive_card")]
    UnsupportedFormat(String),

    /// A response document failed to serialize
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure reported by the image generation vendor
    ///
    /// `details` carries the vendor response body verbatim.
    #[error("Generator error for {model} (HTTP {status_code}): {message}")]
    Generator {
        /// Model that was called
        model: String,
        /// HTTP status returned by the vendor (0 when no response was received)
        status_code: u16,
        /// Short description of the failure
        message: String,
        /// Vendor-provided detail, preserved as-is
        details: String,
    },

    /// File system I/O errors not tied to a reference
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Operation timeout errors
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),
}

impl Error {
    /// Create a validation error for a single field.
    ///
    /// # Example
    ///
    /// ```
    /// use imagegen_mcp_common::error::Error;
    ///
    /// let err = Error::validation("prompt", "Prompt cannot be empty");
    /// assert!(err.to_string().contains("prompt: Prompt cannot be empty"));
    /// ```
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation(vec![ValidationError::new(field, message)])
    }

    /// Create a fetch error without an underlying transport error.
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Fetch {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a generator error.
    ///
    /// # Example
    ///
    /// ```
    /// use imagegen_mcp_common::error::Error;
    ///
    /// let err = Error::generator("gpt-image-1", 400, "Request rejected", "{\"error\":\"bad\"}");
    /// assert!(err.to_string().contains("gpt-image-1"));
    /// assert!(err.to_string().contains("400"));
    /// assert_eq!(err.details(), "{\"error\":\"bad\"}");
    /// ```
    pub fn generator(
        model: impl Into<String>,
        status_code: u16,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Error::Generator {
            model: model.into(),
            status_code,
            message: message.into(),
            details: details.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(seconds: u64) -> Self {
        Error::Timeout(seconds)
    }

    /// Names of the fields rejected by a validation error.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Error::Validation(errors) => errors.iter().map(|e| e.field.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::MalformedDataUrl(_) => "MALFORMED_DATA_URL",
            Error::Fetch { .. } => "FETCH_ERROR",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Generator { .. } => "GENERATOR_ERROR",
            Error::Io(_) => "INTERNAL_ERROR",
            Error::Timeout(_) => "TIMEOUT",
        }
    }

    /// Additional detail for clients.
    ///
    /// Vendor detail from a generator error is returned verbatim; for errors
    /// with an underlying cause the cause's message is returned.
    pub fn details(&self) -> String {
        match self {
            Error::Generator { details, .. } => details.clone(),
            Error::Fetch {
                source: Some(source),
                ..
            } => source.to_string(),
            Error::NotFound { source, .. } => source.to_string(),
            Error::Storage(StorageError::OperationFailed { message, .. }) => message.clone(),
            _ => String::new(),
        }
    }

    /// Whether the error was caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::MalformedDataUrl(_)
                | Error::NotFound { .. }
                | Error::UnsupportedFormat(_)
        )
    }
}

/// Configuration errors.
///
/// These errors occur when loading or validating configuration from
/// environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("Required environment variable {0} is not set")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl ConfigError {
    /// Create a new missing environment variable error.
    pub fn missing_env_var(name: impl Into<String>) -> Self {
        ConfigError::MissingEnvVar(name.into())
    }

    /// Create a new invalid value error.
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue(name.into(), reason.into())
    }
}

/// Storage operation type for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOperation {
    /// Writing an image to the local store directory
    Write,
    /// Removing old images from the local store directory
    Prune,
    /// Uploading an image to a GCS bucket
    Upload,
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageOperation::Write => write!(f, "write"),
            StorageOperation::Prune => write!(f, "prune"),
            StorageOperation::Upload => write!(f, "upload"),
        }
    }
}

/// Image storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage location (directory, bucket) is unusable
    #[error("Invalid storage location: {0}")]
    InvalidLocation(String),

    /// A storage operation failed with context about the target and operation type
    #[error("Storage {operation} failed for {location}: {message}")]
    OperationFailed {
        /// The file path or object URI being written
        location: String,
        /// The type of operation that failed
        operation: StorageOperation,
        /// Error message describing the failure
        message: String,
    },

    /// Authentication error during a remote storage operation
    #[error("Storage authentication error: {0}")]
    AuthError(String),
}

impl StorageError {
    /// Create a new invalid location error.
    pub fn invalid_location(location: impl Into<String>) -> Self {
        StorageError::InvalidLocation(location.into())
    }

    /// Create a new operation failed error with full context.
    ///
    /// # Example
    ///
    /// ```
    /// use imagegen_mcp_common::error::{StorageError, StorageOperation};
    ///
    /// let err = StorageError::operation_failed(
    ///     "gs://my-bucket/gpt-image-1.png",
    ///     StorageOperation::Upload,
    ///     "Permission denied"
    /// );
    /// assert!(err.to_string().contains("gs://my-bucket"));
    /// assert!(err.to_string().contains("upload"));
    /// ```
    pub fn operation_failed(
        location: impl Into<String>,
        operation: StorageOperation,
        message: impl Into<String>,
    ) -> Self {
        StorageError::OperationFailed {
            location: location.into(),
            operation,
            message: message.into(),
        }
    }

    /// Create a new authentication error.
    pub fn auth_error(message: impl Into<String>) -> Self {
        StorageError::AuthError(message.into())
    }
}

/// Result type alias using the unified Error type.
pub type Result<T> = std::result::Result<T, Error>;
