//! MCP Server implementation for the image server.
//!
//! This module provides the MCP server handler that exposes:
//! - `generate_image` tool for text-to-image generation
//! - `edit_image` tool for editing source images with an optional mask
//! - Resources for models, request options and providers

use std::borrow::Cow;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    model::{
        CallToolResult, Content, JsonObject, ListResourcesResult, ListToolsResult, RawResource,
        ReadResourceResult, Resource, ResourceContents, ServerCapabilities, ServerInfo, Tool,
    },
};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::formatter::ResponsePayload;
use crate::handler::{
    EditImageParams, ErrorEnvelope, GenerateImageParams, ImageHandler, ResponseEnvelope,
    parse_params,
};
use crate::resources;

/// Name of the text-to-image tool.
pub const GENERATE_IMAGE_TOOL: &str = "generate_image";

/// Name of the image editing tool.
pub const EDIT_IMAGE_TOOL: &str = "edit_image";

/// MCP Server for image generation and editing.
#[derive(Clone)]
pub struct ImageServer {
    handler: Arc<ImageHandler>,
}

impl ImageServer {
    /// Create a new ImageServer around a shared handler.
    pub fn new(handler: Arc<ImageHandler>) -> Self {
        Self { handler }
    }

    /// Generate images from a text prompt.
    pub async fn generate_image(&self, params: GenerateImageParams) -> CallToolResult {
        info!(model = %params.model, response_format = %params.response_format, "Generating image");
        tool_result(self.handler.generate_image(params).await)
    }

    /// Edit images guided by a prompt.
    pub async fn edit_image(&self, params: EditImageParams) -> CallToolResult {
        info!(images = params.image_paths.len(), response_format = %params.response_format, "Editing image");
        tool_result(self.handler.edit_image(params).await)
    }

    fn configured_models(&self) -> Vec<&'static str> {
        self.handler.generators().model_ids()
    }
}

/// Deserialize tool arguments into handler parameters.
///
/// # Errors
/// `invalid_params` when arguments are missing or do not match the schema.
/// The error data carries the `VALIDATION_ERROR` code and the rejected fields.
pub fn parse_arguments<T: DeserializeOwned>(arguments: Option<JsonObject>) -> Result<T, McpError> {
    let arguments =
        arguments.ok_or_else(|| McpError::invalid_params("Missing parameters", None))?;
    parse_params(serde_json::Value::Object(arguments)).map_err(|e| {
        let data = serde_json::json!({
            "code": e.code(),
            "fields": e.fields(),
        });
        McpError::invalid_params(format!("Invalid parameters: {}", e), Some(data))
    })
}

/// MCP content blocks for a formatted payload.
pub fn payload_content(payload: &ResponsePayload) -> Vec<Content> {
    match payload {
        ResponsePayload::Image(images) => images
            .iter()
            .map(|img| Content::image(BASE64.encode(&img.bytes), img.mime_type()))
            .collect(),
        ResponsePayload::Markdown(doc) => vec![Content::text(doc.clone())],
        ResponsePayload::AdaptiveCard(card) => vec![Content::text(
            serde_json::to_string_pretty(card).unwrap_or_else(|_| card.to_string()),
        )],
    }
}

/// Convert a handler outcome into a tool result.
///
/// Pipeline failures become tool errors carrying the JSON error envelope so
/// the calling model can see what went wrong.
pub fn tool_result(outcome: Result<ResponseEnvelope, ErrorEnvelope>) -> CallToolResult {
    match outcome {
        Ok(envelope) => CallToolResult::success(payload_content(&envelope.payload)),
        Err(envelope) => {
            let body = serde_json::to_string_pretty(&envelope.to_json())
                .unwrap_or_else(|_| envelope.error.to_string());
            CallToolResult::error(vec![Content::text(body)])
        }
    }
}

fn input_schema<T: schemars::JsonSchema>() -> Arc<JsonObject> {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(&schema).unwrap_or_default() {
        serde_json::Value::Object(map) => Arc::new(map),
        _ => Arc::new(JsonObject::new()),
    }
}

/// Tool definitions advertised by the server.
pub fn tools() -> Vec<Tool> {
    vec![
        Tool {
            name: Cow::Borrowed(GENERATE_IMAGE_TOOL),
            description: Some(Cow::Borrowed(
                "Generate an image from a text prompt with gpt-image-1 or FLUX.1-Kontext-pro. \
                 Returns image content, a markdown document or an Adaptive Card \
                 depending on response_format.",
            )),
            input_schema: input_schema::<GenerateImageParams>(),
            annotations: None,
            icons: None,
            meta: None,
            output_schema: None,
            title: None,
        },
        Tool {
            name: Cow::Borrowed(EDIT_IMAGE_TOOL),
            description: Some(Cow::Borrowed(
                "Edit 1-16 source images guided by a prompt, optionally restricted by a mask \
                 with an alpha channel. Images may be http(s) URLs, data URLs or local file paths.",
            )),
            input_schema: input_schema::<EditImageParams>(),
            annotations: None,
            icons: None,
            meta: None,
            output_schema: None,
            title: None,
        },
    ]
}

fn json_resource(uri: &str, name: &str, description: &str) -> Resource {
    Resource {
        raw: RawResource {
            uri: uri.to_string(),
            name: name.to_string(),
            title: None,
            description: Some(description.to_string()),
            mime_type: Some("application/json".to_string()),
            size: None,
            icons: None,
            meta: None,
        },
        annotations: None,
    }
}

/// Resources advertised by the server.
pub fn resource_list() -> Vec<Resource> {
    vec![
        json_resource(
            "image://models",
            "Available Image Models",
            "Image models and whether they are configured on this server",
        ),
        json_resource(
            "image://options",
            "Request Options",
            "Accepted sizes, output formats, backgrounds and response formats",
        ),
        json_resource(
            "image://providers",
            "Available Providers",
            "Image API providers and the image store backend",
        ),
    ]
}

impl ServerHandler for ImageServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Image generation and editing server. \
                 Use generate_image to create images from text prompts \
                 and edit_image to modify existing images."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _params: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            Ok(ListToolsResult {
                tools: tools(),
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn call_tool(
        &self,
        params: rmcp::model::CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            match params.name.as_ref() {
                GENERATE_IMAGE_TOOL => {
                    let params: GenerateImageParams = parse_arguments(params.arguments)?;
                    Ok(self.generate_image(params).await)
                }
                EDIT_IMAGE_TOOL => {
                    let params: EditImageParams = parse_arguments(params.arguments)?;
                    Ok(self.edit_image(params).await)
                }
                _ => Err(McpError::invalid_params(
                    format!("Unknown tool: {}", params.name),
                    None,
                )),
            }
        }
    }

    fn list_resources(
        &self,
        _params: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move {
            debug!("Listing resources");
            Ok(ListResourcesResult {
                resources: resource_list(),
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn read_resource(
        &self,
        params: rmcp::model::ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            let uri = &params.uri;
            debug!(uri = %uri, "Reading resource");

            let configured = self.configured_models();
            let content = match uri.as_str() {
                "image://models" => resources::models_resource_json(&configured),
                "image://options" => resources::options_resource_json(),
                "image://providers" => {
                    resources::providers_resource_json(&configured, self.handler.store_backend())
                }
                _ => {
                    return Err(McpError::resource_not_found(
                        format!("Unknown resource: {}", uri),
                        None,
                    ));
                }
            };

            Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(content, uri.clone())],
            })
        }
    }
}
