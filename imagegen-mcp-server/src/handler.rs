//! Image generation and editing handler.
//!
//! This module provides the `ImageHandler` struct and parameter types shared by
//! the MCP tools and the REST routes. A request is validated in full before
//! any I/O, references are resolved, the mask is checked against the first
//! source image, the generator is called once and the result is formatted.

use std::sync::Arc;
use std::time::Instant;

use imagegen_mcp_common::config::Config;
use imagegen_mcp_common::error::{Error, Result, ValidationError};
use imagegen_mcp_common::models::{
    Background, DEFAULT_MODEL, IMAGE_MODELS, ImageModel, ImageSize, MAX_EDIT_IMAGES,
    MAX_IMAGES_PER_REQUEST, MAX_PROMPT_LENGTH, ModelRegistry, OutputFormat, Quality,
};
use imagegen_mcp_common::storage::ImageStore;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::formatter::{ResponseFormat, ResponseFormatter, ResponsePayload};
use crate::generator::{
    EditInput, GenerateInput, GenerationOutput, GeneratorRegistry, ImageGenerator,
};
use crate::reference::{DecodedImage, ImageResolver};

// =============================================================================
// Parameters
// =============================================================================

/// Text-to-image generation parameters.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GenerateImageParams {
    /// Text prompt describing the image to generate (max 32000 characters).
    pub prompt: String,

    /// Number of images to generate (1-4).
    #[serde(default = "default_n")]
    pub n: u8,

    /// Image size: "1024x1024", "1536x1024", "1024x1536" or "auto".
    #[serde(default = "default_generate_size")]
    pub size: String,

    /// Rendering quality: "low", "medium", "high" or "auto".
    #[serde(default = "default_quality")]
    pub quality: String,

    /// Output format: "png", "jpeg" or "webp".
    #[serde(default = "default_generate_output_format")]
    pub output_format: String,

    /// Random seed; 0 lets the model choose. Only used by models that accept seeds.
    #[serde(default)]
    pub seed: u64,

    /// Rewrite the prompt with a chat model before generating.
    #[serde(default = "default_true")]
    pub enhance_prompt: bool,

    /// Response shape: "image", "markdown" or "adaptive_card".
    #[serde(default = "default_response_format")]
    pub response_format: String,

    /// Background: "transparent", "opaque" or "auto". "transparent" needs png or webp output.
    #[serde(default = "default_background")]
    pub background: String,

    /// Model to use: "gpt-image-1" or "FLUX.1-Kontext-pro" (aliases accepted).
    #[serde(default = "default_model")]
    pub model: String,
}

/// Image editing parameters.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct EditImageParams {
    /// Text prompt describing the edit.
    pub prompt: String,

    /// Source images (1-16): http(s) URLs, data URLs or local file paths.
    pub image_paths: Vec<String>,

    /// Optional mask with an alpha channel, same dimensions as the first image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask_path: Option<String>,

    /// Number of edited images to return (1-4).
    #[serde(default = "default_n")]
    pub n: u8,

    /// Image size: "1024x1024", "1536x1024", "1024x1536" or "auto".
    #[serde(default = "default_edit_size")]
    pub size: String,

    /// Rendering quality: "low", "medium", "high" or "auto".
    #[serde(default = "default_quality")]
    pub quality: String,

    /// Output format: "png", "jpeg" or "webp".
    #[serde(default = "default_edit_output_format")]
    pub output_format: String,

    /// Response shape: "image", "markdown" or "adaptive_card".
    #[serde(default = "default_response_format")]
    pub response_format: String,

    /// Background: "transparent", "opaque" or "auto". "transparent" needs png or webp output.
    #[serde(default = "default_background")]
    pub background: String,

    /// Model to use; must support editing.
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_n() -> u8 {
    1
}

fn default_quality() -> String {
    Quality::Auto.as_str().to_string()
}

fn default_generate_size() -> String {
    ImageSize::Square.as_str().to_string()
}

fn default_edit_size() -> String {
    ImageSize::Auto.as_str().to_string()
}

fn default_generate_output_format() -> String {
    OutputFormat::Jpeg.as_str().to_string()
}

fn default_edit_output_format() -> String {
    OutputFormat::Png.as_str().to_string()
}

fn default_response_format() -> String {
    ResponseFormat::Image.as_str().to_string()
}

fn default_background() -> String {
    Background::Auto.as_str().to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.id.to_string()
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Validation
// =============================================================================

/// Options shared by both operations after validation.
#[derive(Debug, Clone, Copy)]
pub struct ImageOptions {
    pub n: u8,
    pub size: ImageSize,
    pub quality: Quality,
    pub output_format: OutputFormat,
    pub background: Background,
    pub response_format: ResponseFormat,
    pub model: &'static ImageModel,
}

/// A validated generate request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub seed: u64,
    pub enhance_prompt: bool,
    pub options: ImageOptions,
}

/// A validated edit request; references are not yet resolved.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub prompt: String,
    pub image_paths: Vec<String>,
    pub mask_path: Option<String>,
    pub options: ImageOptions,
}

fn invalid_option<T: std::fmt::Display>(name: &str, value: &str, valid: &[T]) -> String {
    let valid: Vec<String> = valid.iter().map(ToString::to_string).collect();
    format!(
        "Invalid {} '{}'. Valid options: {}",
        name,
        value,
        valid.join(", ")
    )
}

/// Raw option values shared by both operations.
struct RawOptions<'a> {
    prompt: &'a str,
    n: u8,
    size: &'a str,
    output_format: &'a str,
    quality: &'a str,
    background: &'a str,
    model: &'a str,
}

/// Check the fields both operations share, pushing one error per bad field.
fn validate_options(
    raw: RawOptions<'_>,
    response_format: ResponseFormat,
    errors: &mut Vec<ValidationError>,
) -> Option<ImageOptions> {
    let resolved_model = ModelRegistry::resolve_image_model(raw.model);
    let max_prompt_length = resolved_model.map_or(MAX_PROMPT_LENGTH, |m| m.max_prompt_length);

    let prompt_length = raw.prompt.chars().count();
    if raw.prompt.trim().is_empty() {
        errors.push(ValidationError::new("prompt", "Prompt cannot be empty"));
    } else if prompt_length > max_prompt_length {
        errors.push(ValidationError::new(
            "prompt",
            format!(
                "Prompt exceeds maximum length of {} characters (got {})",
                max_prompt_length, prompt_length
            ),
        ));
    }

    if !(1..=MAX_IMAGES_PER_REQUEST).contains(&raw.n) {
        errors.push(ValidationError::new(
            "n",
            format!(
                "n must be between 1 and {} (got {})",
                MAX_IMAGES_PER_REQUEST, raw.n
            ),
        ));
    }

    let parsed_size = ImageSize::parse(raw.size);
    if parsed_size.is_none() {
        errors.push(ValidationError::new(
            "size",
            invalid_option("size", raw.size, ImageSize::ALL),
        ));
    }

    let parsed_format = OutputFormat::parse(raw.output_format);
    if parsed_format.is_none() {
        errors.push(ValidationError::new(
            "output_format",
            invalid_option("output format", raw.output_format, OutputFormat::ALL),
        ));
    }

    let parsed_quality = Quality::parse(raw.quality);
    if parsed_quality.is_none() {
        errors.push(ValidationError::new(
            "quality",
            invalid_option("quality", raw.quality, Quality::ALL),
        ));
    }

    let parsed_background = Background::parse(raw.background);
    match (parsed_background, parsed_format) {
        (None, _) => errors.push(ValidationError::new(
            "background",
            invalid_option("background", raw.background, Background::ALL),
        )),
        (Some(Background::Transparent), Some(OutputFormat::Jpeg)) => {
            errors.push(ValidationError::new(
                "background",
                "Transparent background requires png or webp output",
            ))
        }
        _ => {}
    }

    if resolved_model.is_none() {
        let ids: Vec<&str> = IMAGE_MODELS.iter().map(|m| m.id).collect();
        errors.push(ValidationError::new(
            "model",
            invalid_option("model", raw.model, &ids),
        ));
    }

    Some(ImageOptions {
        n: raw.n,
        size: parsed_size?,
        quality: parsed_quality?,
        output_format: parsed_format?,
        background: parsed_background?,
        response_format,
        model: resolved_model?,
    })
}

impl GenerateImageParams {
    /// Validate every field.
    ///
    /// # Errors
    /// `Error::UnsupportedFormat` for an unknown response format (checked
    /// first), otherwise `Error::Validation` listing every bad field.
    pub fn validate(&self) -> Result<GenerateRequest> {
        let response_format = ResponseFormat::parse(&self.response_format)?;
        let mut errors = Vec::new();
        let options = validate_options(
            RawOptions {
                prompt: &self.prompt,
                n: self.n,
                size: &self.size,
                output_format: &self.output_format,
                quality: &self.quality,
                background: &self.background,
                model: &self.model,
            },
            response_format,
            &mut errors,
        );

        match options {
            Some(options) if errors.is_empty() => Ok(GenerateRequest {
                prompt: self.prompt.trim().to_string(),
                seed: self.seed,
                enhance_prompt: self.enhance_prompt,
                options,
            }),
            _ => Err(Error::Validation(errors)),
        }
    }
}

impl EditImageParams {
    /// Validate every field.
    ///
    /// # Errors
    /// `Error::UnsupportedFormat` for an unknown response format (checked
    /// first), otherwise `Error::Validation` listing every bad field.
    pub fn validate(&self) -> Result<EditRequest> {
        let response_format = ResponseFormat::parse(&self.response_format)?;
        let mut errors = Vec::new();
        let options = validate_options(
            RawOptions {
                prompt: &self.prompt,
                n: self.n,
                size: &self.size,
                output_format: &self.output_format,
                quality: &self.quality,
                background: &self.background,
                model: &self.model,
            },
            response_format,
            &mut errors,
        );

        match self.image_paths.len() {
            0 => errors.push(ValidationError::new(
                "image_paths",
                "At least one image is required",
            )),
            n if n > MAX_EDIT_IMAGES => errors.push(ValidationError::new(
                "image_paths",
                format!(
                    "At most {} images can be edited at once (got {})",
                    MAX_EDIT_IMAGES, n
                ),
            )),
            _ => {
                if let Some(index) = self.image_paths.iter().position(|p| p.trim().is_empty()) {
                    errors.push(ValidationError::new(
                        "image_paths",
                        format!("Image reference {} is empty", index),
                    ));
                }
            }
        }

        if self.mask_path.as_deref().is_some_and(|m| m.trim().is_empty()) {
            errors.push(ValidationError::new("mask_path", "Mask path cannot be empty"));
        }

        if let Some(model) = ModelRegistry::resolve_image_model(&self.model) {
            if !model.supports_edit {
                let editors: Vec<&str> = ModelRegistry::list_edit_models().map(|m| m.id).collect();
                errors.push(ValidationError::new(
                    "model",
                    format!(
                        "Model '{}' does not support image editing. Valid options: {}",
                        model.id,
                        editors.join(", ")
                    ),
                ));
            }
        }

        match options {
            Some(options) if errors.is_empty() => Ok(EditRequest {
                prompt: self.prompt.trim().to_string(),
                image_paths: self.image_paths.iter().map(|p| p.trim().to_string()).collect(),
                mask_path: self.mask_path.as_ref().map(|m| m.trim().to_string()),
                options,
            }),
            _ => Err(Error::Validation(errors)),
        }
    }
}

// =============================================================================
// Argument parsing
// =============================================================================

/// Field reported when a bad argument cannot be isolated.
pub const ARGUMENTS_FIELD: &str = "arguments";

/// Deserialize request arguments into parameters.
///
/// # Errors
/// `Error::Validation` naming the argument that failed to deserialize, or
/// [`ARGUMENTS_FIELD`] when no single argument is to blame.
pub fn parse_params<T: DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    let error = match T::deserialize(&value) {
        Ok(params) => return Ok(params),
        Err(e) => e,
    };
    let message = error.to_string();
    let field = rejected_field::<T>(&value, &message);
    debug!(field = %field, error = %message, "Rejected arguments");
    Err(Error::validation(field, message))
}

/// The argument whose removal changes the deserialization error.
///
/// Serde stops at the first bad entry, so dropping any other entry leaves the
/// error unchanged.
fn rejected_field<T: DeserializeOwned>(value: &serde_json::Value, message: &str) -> String {
    if let Some(name) = message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
    {
        return name.to_string();
    }
    let serde_json::Value::Object(map) = value else {
        return ARGUMENTS_FIELD.to_string();
    };
    map.keys()
        .find(|key| {
            let mut rest = map.clone();
            rest.remove(key.as_str());
            match T::deserialize(&serde_json::Value::Object(rest)) {
                Ok(_) => true,
                Err(e) => e.to_string() != message,
            }
        })
        .cloned()
        .unwrap_or_else(|| ARGUMENTS_FIELD.to_string())
}

// =============================================================================
// Mask checks
// =============================================================================

/// Require the mask to match the first source image's dimensions and carry
/// an alpha channel.
///
/// # Errors
/// `Error::Validation` on `mask_path` (or `image_paths` when the source image
/// cannot be decoded).
pub fn check_mask(first_image: &DecodedImage, mask: &DecodedImage) -> Result<()> {
    let source = image::load_from_memory(&first_image.bytes).map_err(|e| {
        Error::validation(
            "image_paths",
            format!("First image could not be decoded to compare with the mask: {}", e),
        )
    })?;
    let mask_image = image::load_from_memory(&mask.bytes)
        .map_err(|e| Error::validation("mask_path", format!("Mask could not be decoded: {}", e)))?;

    let mut errors = Vec::new();
    let (source_dims, mask_dims) = (
        (source.width(), source.height()),
        (mask_image.width(), mask_image.height()),
    );
    if source_dims != mask_dims {
        errors.push(ValidationError::new(
            "mask_path",
            format!(
                "Mask dimensions {}x{} do not match the first image {}x{}",
                mask_dims.0, mask_dims.1, source_dims.0, source_dims.1
            ),
        ));
    }
    if !mask_image.color().has_alpha() {
        errors.push(ValidationError::new(
            "mask_path",
            "Mask must have an alpha channel",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

// =============================================================================
// Envelopes
// =============================================================================

/// Metadata attached to every response, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseMetadata {
    /// The caller's prompt, never the enhanced one
    pub prompt: String,
    pub size: String,
    pub response_format: String,
    pub model: String,
    pub enhanced_prompt: Option<String>,
    /// RFC 3339 time the request finished
    pub timestamp: String,
    pub processing_time_ms: u64,
}

impl ResponseMetadata {
    fn start(prompt: &str, size: &str, response_format: &str, model: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            size: size.to_string(),
            response_format: response_format.to_string(),
            model: model.to_string(),
            enhanced_prompt: None,
            timestamp: String::new(),
            processing_time_ms: 0,
        }
    }

    fn finish(mut self, started: Instant) -> Self {
        self.timestamp = chrono::Utc::now().to_rfc3339();
        self.processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self
    }
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub metadata: ResponseMetadata,
    pub payload: ResponsePayload,
}

/// Client-facing error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    pub details: String,
}

impl From<&Error> for ErrorDetail {
    fn from(error: &Error) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
            details: error.details(),
        }
    }
}

/// A failed response with the same metadata as a successful one.
#[derive(Debug)]
pub struct ErrorEnvelope {
    pub metadata: ResponseMetadata,
    pub error: Error,
}

impl ErrorEnvelope {
    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail::from(&self.error)
    }

    /// `{"error": {code, message, details}, "metadata": {...}}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.detail(),
            "metadata": self.metadata,
        })
    }
}

struct Outcome {
    payload: ResponsePayload,
    model: &'static ImageModel,
    enhanced_prompt: Option<String>,
}

// =============================================================================
// Handler
// =============================================================================

/// Image handler shared by the MCP tools and REST routes.
#[derive(Debug, Clone)]
pub struct ImageHandler {
    resolver: ImageResolver,
    generators: GeneratorRegistry,
    formatter: ResponseFormatter,
}

impl ImageHandler {
    /// Create a handler for `config` persisting URL-based responses to `store`.
    #[instrument(level = "debug", name = "image_handler_new", skip_all)]
    pub fn new(config: &Config, store: Arc<dyn ImageStore>) -> Self {
        let client = reqwest::Client::new();
        let generators = GeneratorRegistry::from_config(config, client.clone());
        debug!(models = ?generators.model_ids(), backend = store.backend(), "Initializing ImageHandler");

        Self {
            resolver: ImageResolver::new(client, config.fetch_timeout),
            generators,
            formatter: ResponseFormatter::new(store),
        }
    }

    /// Create a handler from prepared collaborators.
    pub fn with_deps(
        resolver: ImageResolver,
        generators: GeneratorRegistry,
        formatter: ResponseFormatter,
    ) -> Self {
        Self {
            resolver,
            generators,
            formatter,
        }
    }

    /// Generators for the configured models.
    pub fn generators(&self) -> &GeneratorRegistry {
        &self.generators
    }

    /// Backend name of the image store.
    pub fn store_backend(&self) -> &'static str {
        self.formatter.store_backend()
    }

    fn generator_for(&self, model: &'static ImageModel) -> Result<Arc<dyn ImageGenerator>> {
        self.generators.get(model).ok_or_else(|| {
            Error::validation(
                "model",
                format!(
                    "Model '{}' is not configured on this server (set {}_API_KEY)",
                    model.id,
                    model.provider.to_string().to_uppercase()
                ),
            )
        })
    }

    /// Generate images from a text prompt.
    #[instrument(level = "info", name = "generate_image", skip(self, params), fields(model = %params.model, response_format = %params.response_format))]
    pub async fn generate_image(
        &self,
        params: GenerateImageParams,
    ) -> std::result::Result<ResponseEnvelope, ErrorEnvelope> {
        let started = Instant::now();
        let metadata = ResponseMetadata::start(
            &params.prompt,
            &params.size,
            &params.response_format,
            &params.model,
        );
        let outcome = self.run_generate(&params).await;
        envelope(metadata, started, outcome)
    }

    /// Edit source images guided by a prompt and optional mask.
    #[instrument(level = "info", name = "edit_image", skip(self, params), fields(model = %params.model, images = params.image_paths.len(), response_format = %params.response_format))]
    pub async fn edit_image(
        &self,
        params: EditImageParams,
    ) -> std::result::Result<ResponseEnvelope, ErrorEnvelope> {
        let started = Instant::now();
        let metadata = ResponseMetadata::start(
            &params.prompt,
            &params.size,
            &params.response_format,
            &params.model,
        );
        let outcome = self.run_edit(&params).await;
        envelope(metadata, started, outcome)
    }

    async fn run_generate(&self, params: &GenerateImageParams) -> Result<Outcome> {
        let request = params.validate()?;
        let options = request.options;
        let generator = self.generator_for(options.model)?;

        info!(model_id = options.model.id, "Generating image");
        let GenerationOutput {
            images,
            enhanced_prompt,
        } = generator
            .generate(GenerateInput {
                prompt: request.prompt.clone(),
                n: options.n,
                size: options.size,
                quality: options.quality,
                output_format: options.output_format,
                background: options.background,
                seed: request.seed,
                enhance_prompt: request.enhance_prompt,
            })
            .await?;

        let payload = self
            .formatter
            .format(images, &request.prompt, options.response_format)
            .await?;

        Ok(Outcome {
            payload,
            model: options.model,
            enhanced_prompt,
        })
    }

    async fn run_edit(&self, params: &EditImageParams) -> Result<Outcome> {
        let request = params.validate()?;
        let options = request.options;
        let generator = self.generator_for(options.model)?;

        let mask_reference = request.mask_path.as_deref();
        let (images, mask) = tokio::try_join!(
            self.resolver.resolve_all(&request.image_paths),
            async {
                match mask_reference {
                    Some(reference) => self.resolver.resolve(reference).await.map(Some),
                    None => Ok(None),
                }
            }
        )?;
        debug!(images = images.len(), mask = mask.is_some(), "Resolved image references");

        if let (Some(first), Some(mask)) = (images.first(), &mask) {
            check_mask(first, mask)?;
        }

        info!(model_id = options.model.id, "Editing image");
        let output = generator
            .edit(EditInput {
                prompt: request.prompt.clone(),
                images,
                mask,
                n: options.n,
                size: options.size,
                quality: options.quality,
                output_format: options.output_format,
                background: options.background,
            })
            .await?;

        let payload = self
            .formatter
            .format(output.images, &request.prompt, options.response_format)
            .await?;

        Ok(Outcome {
            payload,
            model: options.model,
            enhanced_prompt: None,
        })
    }
}

fn envelope(
    mut metadata: ResponseMetadata,
    started: Instant,
    outcome: Result<Outcome>,
) -> std::result::Result<ResponseEnvelope, ErrorEnvelope> {
    match outcome {
        Ok(outcome) => {
            metadata.model = outcome.model.id.to_string();
            metadata.enhanced_prompt = outcome.enhanced_prompt;
            let metadata = metadata.finish(started);
            info!(
                processing_time_ms = metadata.processing_time_ms,
                response_format = %outcome.payload.format(),
                "Request completed"
            );
            Ok(ResponseEnvelope {
                metadata,
                payload: outcome.payload,
            })
        }
        Err(error) => {
            let metadata = metadata.finish(started);
            if error.is_client_error() {
                info!(code = error.code(), error = %error, "Request rejected");
            } else {
                warn!(code = error.code(), error = %error, "Request failed");
            }
            Err(ErrorEnvelope { metadata, error })
        }
    }
}
