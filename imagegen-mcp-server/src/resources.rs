//! MCP Resources for the image server.
//!
//! - `image://models` - Image models and whether this server has them configured
//! - `image://options` - Accepted request option values and limits
//! - `image://providers` - Configured API providers and the image store backend

use imagegen_mcp_common::models::{
    Background, IMAGE_MODELS, ImageSize, MAX_EDIT_IMAGES, MAX_IMAGES_PER_REQUEST,
    MAX_PROMPT_LENGTH, OutputFormat, ProviderKind, Quality,
};
use serde::Serialize;

use crate::formatter::ResponseFormat;

/// Information about an image model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub aliases: Vec<&'static str>,
    pub provider: ProviderKind,
    pub supports_edit: bool,
    pub supports_seed: bool,
    pub max_prompt_length: usize,
    /// Whether credentials for the model are configured
    pub configured: bool,
}

/// Accepted request option values.
#[derive(Debug, Clone, Serialize)]
pub struct OptionsInfo {
    pub sizes: Vec<&'static str>,
    pub output_formats: Vec<&'static str>,
    pub qualities: Vec<&'static str>,
    pub backgrounds: Vec<&'static str>,
    pub response_formats: Vec<&'static str>,
    pub max_images_per_request: u8,
    pub max_edit_images: usize,
    pub max_prompt_length: usize,
}

/// Information about an API provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub id: ProviderKind,
    pub name: &'static str,
    pub models: Vec<&'static str>,
    pub configured: bool,
}

/// Providers plus the storage backend used for URL responses.
#[derive(Debug, Clone, Serialize)]
pub struct ProvidersInfo {
    pub providers: Vec<ProviderInfo>,
    pub image_store: &'static str,
}

/// List every model, flagging those in `configured`.
pub fn list_models(configured: &[&str]) -> Vec<ModelInfo> {
    IMAGE_MODELS
        .iter()
        .map(|m| ModelInfo {
            id: m.id,
            aliases: m.aliases.to_vec(),
            provider: m.provider,
            supports_edit: m.supports_edit,
            supports_seed: m.supports_seed,
            max_prompt_length: m.max_prompt_length,
            configured: configured.contains(&m.id),
        })
        .collect()
}

pub fn list_options() -> OptionsInfo {
    OptionsInfo {
        sizes: ImageSize::ALL.iter().map(|s| s.as_str()).collect(),
        output_formats: OutputFormat::ALL.iter().map(|f| f.as_str()).collect(),
        qualities: Quality::ALL.iter().map(|q| q.as_str()).collect(),
        backgrounds: Background::ALL.iter().map(|b| b.as_str()).collect(),
        response_formats: ResponseFormat::ALL.iter().map(|f| f.as_str()).collect(),
        max_images_per_request: MAX_IMAGES_PER_REQUEST,
        max_edit_images: MAX_EDIT_IMAGES,
        max_prompt_length: MAX_PROMPT_LENGTH,
    }
}

/// List providers; a provider is configured when any of its models is.
pub fn list_providers(configured: &[&str], image_store: &'static str) -> ProvidersInfo {
    let provider = |id: ProviderKind, name: &'static str| {
        let models: Vec<&'static str> = IMAGE_MODELS
            .iter()
            .filter(|m| m.provider == id)
            .map(|m| m.id)
            .collect();
        ProviderInfo {
            id,
            name,
            configured: models.iter().any(|m| configured.contains(m)),
            models,
        }
    };

    ProvidersInfo {
        providers: vec![
            provider(ProviderKind::OpenAi, "OpenAI Images API"),
            provider(ProviderKind::Flux, "FLUX via OpenAI-compatible Images API"),
        ],
        image_store,
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Get the models resource content as JSON.
pub fn models_resource_json(configured: &[&str]) -> String {
    to_json(&list_models(configured))
}

/// Get the options resource content as JSON.
pub fn options_resource_json() -> String {
    to_json(&list_options())
}

/// Get the providers resource content as JSON.
pub fn providers_resource_json(configured: &[&str], image_store: &'static str) -> String {
    to_json(&list_providers(configured, image_store))
}
