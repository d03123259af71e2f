//! Image generator adapters.
//!
//! A generator wraps one hosted model behind the [`ImageGenerator`] trait and
//! returns raw image bytes. Both configured models speak the OpenAI Images
//! API, either directly or through an Azure OpenAI deployment.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use imagegen_mcp_common::config::{Config, ProviderCredentials};
use imagegen_mcp_common::error::{Error, Result};
use imagegen_mcp_common::models::{
    Background, FLUX_1_KONTEXT_PRO, GPT_IMAGE_1, ImageModel, ImageSize, OutputFormat, Quality,
};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::reference::DecodedImage;

/// Chat model used to rewrite prompts before generation.
pub const PROMPT_ENHANCER_MODEL: &str = "gpt-4.1-mini";

const PROMPT_ENHANCER_INSTRUCTIONS: &str = "You are an image generation assistant specialized in optimizing user prompts. Ensure content compliance rules are followed. Do not ask followup questions, just generate the optimized prompt.";

/// Raw image returned by a generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    /// Format the image was requested in
    pub format: OutputFormat,
}

impl GeneratedImage {
    /// MIME type of the encoded bytes.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Text-to-image request.
#[derive(Debug, Clone)]
pub struct GenerateInput {
    pub prompt: String,
    /// Number of images to request
    pub n: u8,
    pub size: ImageSize,
    pub quality: Quality,
    pub output_format: OutputFormat,
    pub background: Background,
    /// Zero means "no seed"
    pub seed: u64,
    pub enhance_prompt: bool,
}

/// Image edit request with resolved source images.
#[derive(Debug, Clone)]
pub struct EditInput {
    pub prompt: String,
    pub images: Vec<DecodedImage>,
    pub mask: Option<DecodedImage>,
    pub n: u8,
    pub size: ImageSize,
    pub quality: Quality,
    pub output_format: OutputFormat,
    pub background: Background,
}

/// What a generator produced.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    /// Images in the order the vendor returned them
    pub images: Vec<GeneratedImage>,
    /// Rewritten prompt, when enhancement ran and produced one
    pub enhanced_prompt: Option<String>,
}

/// A hosted image model.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Model this generator calls.
    fn model(&self) -> &'static ImageModel;

    /// Generate images from a prompt.
    async fn generate(&self, input: GenerateInput) -> Result<GenerationOutput>;

    /// Edit source images guided by a prompt and optional mask.
    async fn edit(&self, input: EditInput) -> Result<GenerationOutput>;
}

// =============================================================================
// OpenAI / Azure OpenAI endpoint
// =============================================================================

/// Builds request URLs and auth headers for one set of credentials.
#[derive(Debug, Clone)]
struct ApiEndpoint {
    credentials: ProviderCredentials,
}

impl ApiEndpoint {
    /// `{base}/{operation}` for OpenAI, or the deployment URL for Azure.
    fn url(&self, deployment: &str, operation: &str) -> String {
        let base = &self.credentials.base_url;
        match &self.credentials.api_version {
            Some(version) => format!(
                "{}/openai/deployments/{}/{}?api-version={}",
                base,
                urlencoding::encode(deployment),
                operation,
                urlencoding::encode(version)
            ),
            None => format!("{}/{}", base, operation),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.credentials.is_azure() {
            request.header("api-key", &self.credentials.api_key)
        } else {
            request.bearer_auth(&self.credentials.api_key)
        }
    }
}

/// JSON body of `images/generations`.
#[derive(Debug, Serialize)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub n: u8,
    pub size: &'a str,
    pub quality: &'a str,
    pub output_format: &'a str,
    pub background: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Response of both image endpoints.
#[derive(Debug, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
pub struct ImageData {
    #[serde(default)]
    pub b64_json: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

// =============================================================================
// Prompt enhancement
// =============================================================================

/// Rewrites prompts with a chat model before generation.
///
/// Enhancement never fails a request: any error or empty answer yields `None`
/// and the caller keeps the original prompt.
#[derive(Debug, Clone)]
pub struct PromptEnhancer {
    client: reqwest::Client,
    endpoint: ApiEndpoint,
    timeout: Duration,
}

impl PromptEnhancer {
    /// Create an enhancer calling the chat model with `credentials`.
    pub fn new(client: reqwest::Client, credentials: ProviderCredentials, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: ApiEndpoint { credentials },
            timeout,
        }
    }

    /// Return an optimized prompt, or `None` to keep the original.
    #[instrument(level = "debug", skip_all)]
    pub async fn enhance(&self, prompt: &str) -> Option<String> {
        match self.request(prompt).await {
            Ok(enhanced) if !enhanced.trim().is_empty() => {
                debug!(original_len = prompt.len(), enhanced_len = enhanced.len(), "Prompt enhanced");
                Some(enhanced.trim().to_string())
            }
            Ok(_) => {
                warn!("Prompt enhancement returned an empty prompt, using original");
                None
            }
            Err(e) => {
                warn!(error = %e, "Prompt enhancement failed, using original");
                None
            }
        }
    }

    async fn request(&self, prompt: &str) -> Result<String> {
        let url = self.endpoint.url(PROMPT_ENHANCER_MODEL, "chat/completions");
        let body = ChatRequest {
            model: PROMPT_ENHANCER_MODEL,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: PROMPT_ENHANCER_INSTRUCTIONS.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Enhance this prompt for image generation: {}", prompt),
                },
            ],
        };

        let response = self
            .endpoint
            .authorize(self.client.post(&url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::generator(PROMPT_ENHANCER_MODEL, 0, "Request failed", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generator(
                PROMPT_ENHANCER_MODEL,
                status.as_u16(),
                "Prompt enhancement rejected",
                body,
            ));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            Error::generator(PROMPT_ENHANCER_MODEL, status.as_u16(), "Invalid response", e.to_string())
        })?;

        Ok(chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }
}

// =============================================================================
// OpenAI Images API generator
// =============================================================================

/// Generator speaking the OpenAI Images API.
#[derive(Debug, Clone)]
pub struct OpenAiImageGenerator {
    model: &'static ImageModel,
    client: reqwest::Client,
    endpoint: ApiEndpoint,
    timeout: Duration,
    enhancer: Option<PromptEnhancer>,
}

impl OpenAiImageGenerator {
    /// Create a generator for `model` using `credentials`.
    pub fn new(
        model: &'static ImageModel,
        client: reqwest::Client,
        credentials: ProviderCredentials,
        timeout: Duration,
    ) -> Self {
        Self {
            model,
            client,
            endpoint: ApiEndpoint { credentials },
            timeout,
            enhancer: None,
        }
    }

    /// Enable prompt enhancement for `generate`.
    pub fn with_enhancer(mut self, enhancer: PromptEnhancer) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    /// Request URL for an images operation (`generations` or `edits`).
    pub fn images_url(&self, operation: &str) -> String {
        self.endpoint
            .url(self.model.id, &format!("images/{}", operation))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<Vec<u8>>> {
        let model = self.model.id;
        let response = self
            .endpoint
            .authorize(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(self.timeout.as_secs())
                } else {
                    Error::generator(model, 0, "Request failed", e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generator(
                model,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Request rejected"),
                body,
            ));
        }

        let parsed: ImagesResponse = response.json().await.map_err(|e| {
            Error::generator(model, status.as_u16(), "Failed to parse response", e.to_string())
        })?;

        decode_images(model, parsed)
    }
}

/// Decode every `b64_json` row, skipping rows without data.
fn decode_images(model: &str, response: ImagesResponse) -> Result<Vec<Vec<u8>>> {
    let mut images = Vec::with_capacity(response.data.len());
    for (index, row) in response.data.into_iter().enumerate() {
        let Some(b64) = row.b64_json else {
            warn!(index, "Response row has no image data, skipping");
            continue;
        };
        let bytes = BASE64.decode(b64.as_bytes()).map_err(|e| {
            Error::generator(model, 200, "Invalid base64 image data", e.to_string())
        })?;
        images.push(bytes);
    }

    if images.is_empty() {
        return Err(Error::generator(model, 200, "No images returned from API", ""));
    }
    Ok(images)
}

fn image_part(image: &DecodedImage, name: &str, field: &str) -> Result<Part> {
    let extension = mime_guess::get_mime_extensions_str(&image.mime_type)
        .and_then(|exts| exts.first())
        .copied()
        .unwrap_or("png");
    Part::bytes(image.bytes.clone())
        .file_name(format!("{}.{}", name, extension))
        .mime_str(&image.mime_type)
        .map_err(|e| {
            Error::validation(field, format!("Invalid MIME type '{}': {}", image.mime_type, e))
        })
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    fn model(&self) -> &'static ImageModel {
        self.model
    }

    #[instrument(level = "info", name = "vendor_generate", skip(self, input), fields(model = self.model.id, size = %input.size))]
    async fn generate(&self, input: GenerateInput) -> Result<GenerationOutput> {
        let original = input.prompt.trim();

        let enhanced_prompt = match (&self.enhancer, input.enhance_prompt) {
            (Some(enhancer), true) => enhancer.enhance(original).await,
            _ => None,
        };
        let prompt = enhanced_prompt.as_deref().unwrap_or(original);

        let seed = (input.seed != 0 && self.model.supports_seed).then_some(input.seed);
        if input.seed != 0 && seed.is_none() {
            debug!(seed = input.seed, "Model does not accept a seed, ignoring");
        }

        let body = GenerationRequest {
            model: self.model.id,
            prompt,
            n: input.n,
            size: input.size.as_str(),
            quality: input.quality.as_str(),
            output_format: input.output_format.as_str(),
            background: input.background.as_str(),
            seed,
        };

        let url = self.images_url("generations");
        debug!(url = %url, "Calling images/generations");
        let images = self.send(self.client.post(&url).json(&body)).await?;

        info!(count = images.len(), "Received generated images");
        Ok(GenerationOutput {
            images: images
                .into_iter()
                .map(|bytes| GeneratedImage {
                    bytes,
                    format: input.output_format,
                })
                .collect(),
            enhanced_prompt,
        })
    }

    #[instrument(level = "info", name = "vendor_edit", skip(self, input), fields(model = self.model.id, images = input.images.len()))]
    async fn edit(&self, input: EditInput) -> Result<GenerationOutput> {
        if !self.model.supports_edit {
            return Err(Error::validation(
                "model",
                format!("Model '{}' does not support image editing", self.model.id),
            ));
        }

        let mut form = Form::new()
            .text("model", self.model.id)
            .text("prompt", input.prompt.trim().to_string())
            .text("n", input.n.to_string())
            .text("size", input.size.as_str())
            .text("quality", input.quality.as_str())
            .text("output_format", input.output_format.as_str())
            .text("background", input.background.as_str());

        for (index, image) in input.images.iter().enumerate() {
            form = form.part("image[]", image_part(image, &format!("image-{}", index), "image_paths")?);
        }
        if let Some(mask) = &input.mask {
            form = form.part("mask", image_part(mask, "mask", "mask_path")?);
        }

        let url = self.images_url("edits");
        debug!(url = %url, "Calling images/edits");
        let images = self.send(self.client.post(&url).multipart(form)).await?;

        info!(count = images.len(), "Received edited images");
        Ok(GenerationOutput {
            images: images
                .into_iter()
                .map(|bytes| GeneratedImage {
                    bytes,
                    format: input.output_format,
                })
                .collect(),
            enhanced_prompt: None,
        })
    }
}

// =============================================================================
// Registry of configured generators
// =============================================================================

/// Generators for every model with configured credentials, keyed by model id.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: HashMap<&'static str, Arc<dyn ImageGenerator>>,
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("models", &self.model_ids())
            .finish()
    }
}

impl GeneratorRegistry {
    /// Build generators for every model whose credentials are configured.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        let enhancer = PromptEnhancer::new(
            client.clone(),
            config.openai.clone(),
            config.generation_timeout,
        );

        let mut registry = Self::default();
        registry.insert(Arc::new(
            OpenAiImageGenerator::new(
                &GPT_IMAGE_1,
                client.clone(),
                config.openai.clone(),
                config.generation_timeout,
            )
            .with_enhancer(enhancer.clone()),
        ));

        if let Some(flux) = &config.flux {
            registry.insert(Arc::new(
                OpenAiImageGenerator::new(
                    &FLUX_1_KONTEXT_PRO,
                    client,
                    flux.clone(),
                    config.generation_timeout,
                )
                .with_enhancer(enhancer),
            ));
        } else {
            debug!(model = FLUX_1_KONTEXT_PRO.id, "FLUX_API_KEY not set, model disabled");
        }

        registry
    }

    /// Register a generator, replacing any generator for the same model.
    pub fn insert(&mut self, generator: Arc<dyn ImageGenerator>) {
        self.generators.insert(generator.model().id, generator);
    }

    /// Generator for `model`, if configured.
    pub fn get(&self, model: &ImageModel) -> Option<Arc<dyn ImageGenerator>> {
        self.generators.get(model.id).cloned()
    }

    /// Ids of every configured model, sorted.
    pub fn model_ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.generators.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
