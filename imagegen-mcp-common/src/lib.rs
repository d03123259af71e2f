//! Shared library for the imagegen MCP server.
//!
//! Configuration, error types, model and option definitions, image storage
//! backends, transport selection, the server builder and tracing setup.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod gcs;
pub mod models;
pub mod server;
pub mod storage;
pub mod tracing;
pub mod transport;

#[cfg(feature = "otel")]
#[cfg_attr(docsrs, doc(cfg(feature = "otel")))]
pub mod otel;

#[cfg(test)]
mod config_test;

pub use config::{Config, ProviderCredentials};
pub use error::{
    ConfigError, Error, Result, StorageError, StorageOperation, ValidationError,
};
pub use models::{Background, ImageModel, ImageSize, ModelRegistry, OutputFormat, Quality};
pub use server::{McpServerBuilder, ServerError, shutdown_channel};
pub use storage::{ImageStore, LocalImageStore};
pub use transport::{Transport, TransportArgs, TransportMode};
