//! REST API served next to the MCP endpoint.
//!
//! - `POST /api/v1/generate_image`
//! - `POST /api/v1/edit_image`
//! - `GET /_upload/{file}` serves the local image store directory
//! - `GET /health`
//!
//! Every API response, success or failure, uses the same JSON envelope.

use std::path::Path;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use imagegen_mcp_common::error::Error;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::formatter::ResponsePayload;
use crate::handler::{
    EditImageParams, ErrorDetail, ErrorEnvelope, GenerateImageParams, ImageHandler,
    ResponseEnvelope, ResponseMetadata, parse_params,
};

/// Field reported when the body is not a JSON document.
pub const BODY_FIELD: &str = "body";

/// Largest accepted request body; edit requests may inline images as data URLs.
pub const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Image bytes in a JSON response.
#[derive(Debug, Clone, Serialize)]
pub struct ApiImage {
    /// Base64-encoded image bytes
    pub data: String,
    pub mime_type: &'static str,
}

/// Response body; exactly one field is populated on success.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiData {
    pub images: Vec<ApiImage>,
    pub markdown: Option<String>,
    pub adaptive_card: Option<serde_json::Value>,
}

/// JSON envelope of every API response.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    /// "success" or "error"
    pub status: &'static str,
    pub data: Option<ApiData>,
    pub metadata: Option<ResponseMetadata>,
    pub error: Option<ErrorDetail>,
}

impl From<ResponseEnvelope> for ApiResponse {
    fn from(envelope: ResponseEnvelope) -> Self {
        let data = match envelope.payload {
            ResponsePayload::Image(images) => ApiData {
                images: images
                    .iter()
                    .map(|img| ApiImage {
                        data: BASE64.encode(&img.bytes),
                        mime_type: img.mime_type(),
                    })
                    .collect(),
                ..Default::default()
            },
            ResponsePayload::Markdown(doc) => ApiData {
                markdown: Some(doc),
                ..Default::default()
            },
            ResponsePayload::AdaptiveCard(card) => ApiData {
                adaptive_card: Some(card),
                ..Default::default()
            },
        };
        Self {
            status: "success",
            data: Some(data),
            metadata: Some(envelope.metadata),
            error: None,
        }
    }
}

impl From<&ErrorEnvelope> for ApiResponse {
    fn from(envelope: &ErrorEnvelope) -> Self {
        Self {
            status: "error",
            data: None,
            metadata: Some(envelope.metadata.clone()),
            error: Some(envelope.detail()),
        }
    }
}

/// HTTP status for a pipeline error.
///
/// Request problems are 400, upstream failures 502, everything else 500.
pub fn status_for(error: &Error) -> StatusCode {
    if error.is_client_error() {
        return StatusCode::BAD_REQUEST;
    }
    match error {
        Error::Fetch { .. } | Error::Generator { .. } | Error::Timeout(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wrapper turning a handler outcome into an HTTP response.
pub struct ApiResult(pub Result<ResponseEnvelope, ErrorEnvelope>);

impl IntoResponse for ApiResult {
    fn into_response(self) -> Response {
        match self.0 {
            Ok(envelope) => (StatusCode::OK, Json(ApiResponse::from(envelope))).into_response(),
            Err(envelope) => {
                let status = status_for(&envelope.error);
                (status, Json(ApiResponse::from(&envelope))).into_response()
            }
        }
    }
}

/// 400 for a body that never reached the handler; no metadata can be read.
fn argument_error_response(error: &Error) -> Response {
    let body = ApiResponse {
        status: "error",
        data: None,
        metadata: None,
        error: Some(ErrorDetail::from(error)),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Parse a route body, answering 400 with the rejected field on failure.
fn parse_body<T: DeserializeOwned>(
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<T, Response> {
    let Json(value) = body.map_err(|rejection| {
        argument_error_response(&Error::validation(BODY_FIELD, rejection.body_text()))
    })?;
    parse_params(value).map_err(|e| argument_error_response(&e))
}

async fn generate_image(
    State(handler): State<Arc<ImageHandler>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    match parse_body::<GenerateImageParams>(body) {
        Ok(params) => ApiResult(handler.generate_image(params).await).into_response(),
        Err(response) => response,
    }
}

async fn edit_image(
    State(handler): State<Arc<ImageHandler>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    match parse_body::<EditImageParams>(body) {
        Ok(params) => ApiResult(handler.edit_image(params).await).into_response(),
        Err(response) => response,
    }
}

async fn health(State(handler): State<Arc<ImageHandler>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "models": handler.generators().model_ids(),
        "image_store": handler.store_backend(),
    }))
}

/// Build the REST router. Files under `upload_dir` are served at `/_upload`.
pub fn router(handler: Arc<ImageHandler>, upload_dir: &Path) -> Router {
    Router::new()
        .route("/api/v1/generate_image", post(generate_image))
        .route("/api/v1/edit_image", post(edit_image))
        .route("/health", get(health))
        .nest_service("/_upload", ServeDir::new(upload_dir))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}
