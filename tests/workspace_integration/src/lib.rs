//! Workspace-level integration tests for the imagegen MCP server.
//!
//! These tests verify:
//! - The server starts with a test configuration and advertises tools and resources
//! - Tool schemas are valid and carry the documented defaults
//! - Invalid input is rejected before any provider is contacted
//! - Tool results use MCP content with image MIME types or the error envelope

pub mod input_validation;
pub mod output_format;
pub mod server_startup;
pub mod tool_schema;

use std::sync::Arc;

use imagegen_mcp_common::Config;
use imagegen_mcp_common::storage::LocalImageStore;
use imagegen_mcp_server::{ImageHandler, ImageServer};

/// Configuration with only an OpenAI key; FLUX stays unconfigured.
pub fn test_config() -> Config {
    Config::from_lookup(|name| match name {
        "OPENAI_API_KEY" => Some("sk-test".to_string()),
        "OPENAI_BASE_URL" => Some("http://127.0.0.1:9".to_string()),
        "TMP_PATH" => Some(std::env::temp_dir().join("imagegen-ws-tests").display().to_string()),
        _ => None,
    })
    .expect("test configuration is valid")
}

/// Server backed by a local store; nothing here contacts a provider.
pub fn test_server() -> ImageServer {
    let config = test_config();
    let store = LocalImageStore::from_config(&config);
    ImageServer::new(Arc::new(ImageHandler::new(&config, Arc::new(store))))
}
