//! Image generation MCP server.
//!
//! Serves the `generate_image` and `edit_image` tools over MCP and, on the
//! HTTP transports, the REST API and stored images from the same port.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use imagegen_mcp_common::storage::store_from_config;
use imagegen_mcp_common::{Config, McpServerBuilder, TransportArgs};
use imagegen_mcp_server::{ImageHandler, ImageServer, api};

#[cfg(feature = "otel")]
use imagegen_mcp_common::otel::{OtelConfig, init_tracing_with_optional_otel};

/// Command-line arguments for the image server.
#[derive(Parser, Debug)]
#[command(name = "imagegen-mcp-server")]
#[command(about = "MCP and REST server for image generation with gpt-image-1 and FLUX")]
struct Args {
    /// Transport configuration
    #[command(flatten)]
    transport: TransportArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(feature = "otel")]
    let _otel_guard = {
        let config = OtelConfig::from_env().with_service_name("imagegen-mcp-server");
        init_tracing_with_optional_otel(config).await
    };

    #[cfg(not(feature = "otel"))]
    imagegen_mcp_common::tracing::init_tracing();

    tracing::info!("imagegen-mcp-server starting...");

    let args = Args::parse();

    let config = Config::from_env()?.with_listen_port(args.transport.port);
    tracing::info!(
        backend_server = %config.backend_server,
        tmp_path = %config.tmp_path.display(),
        flux = config.flux.is_some(),
        gcs_bucket = ?config.gcs_bucket,
        "Configuration loaded"
    );

    let store = store_from_config(&config).await?;
    let handler = Arc::new(ImageHandler::new(&config, store));
    tracing::info!(
        models = ?handler.generators().model_ids(),
        image_store = handler.store_backend(),
        "Image pipeline ready"
    );

    let router = api::router(handler.clone(), &config.tmp_path);
    let server = ImageServer::new(handler);

    McpServerBuilder::new(server)
        .with_transport(args.transport.into_transport())
        .with_router(router)
        .run()
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
