//! Model definitions, image option enums and the model registry.
//!
//! This module provides static model definitions and a registry for resolving
//! model names and aliases to their full definitions, along with the closed
//! sets of sizes, output formats and backgrounds the image APIs accept.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum prompt length in characters.
pub const MAX_PROMPT_LENGTH: usize = 32_000;

/// Maximum number of source images for one edit request.
pub const MAX_EDIT_IMAGES: usize = 16;

/// Most images a single request may ask the model for.
pub const MAX_IMAGES_PER_REQUEST: u8 = 4;

/// Which configured credentials a model is called with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `OPENAI_*` credentials
    #[serde(rename = "openai")]
    OpenAi,
    /// `FLUX_*` credentials
    Flux,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Flux => write!(f, "flux"),
        }
    }
}

/// Image model definition.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ImageModel {
    /// Full model identifier, also the deployment name on Azure
    pub id: &'static str,
    /// Model aliases for convenience
    #[serde(skip)]
    pub aliases: &'static [&'static str],
    /// Credentials used to call the model
    pub provider: ProviderKind,
    /// Whether the model accepts `/images/edits` requests
    pub supports_edit: bool,
    /// Whether a non-zero seed is forwarded to the model
    pub supports_seed: bool,
    /// Maximum prompt length in characters
    pub max_prompt_length: usize,
}

// =============================================================================
// Static Model Definitions
// =============================================================================

/// OpenAI gpt-image-1 (generation and editing)
pub const GPT_IMAGE_1: ImageModel = ImageModel {
    id: "gpt-image-1",
    aliases: &["gpt-image", "openai"],
    provider: ProviderKind::OpenAi,
    supports_edit: true,
    supports_seed: false,
    max_prompt_length: MAX_PROMPT_LENGTH,
};

/// FLUX.1 Kontext [pro] behind an OpenAI-compatible endpoint (generation only)
pub const FLUX_1_KONTEXT_PRO: ImageModel = ImageModel {
    id: "FLUX.1-Kontext-pro",
    aliases: &["flux", "flux-kontext"],
    provider: ProviderKind::Flux,
    supports_edit: false,
    supports_seed: true,
    max_prompt_length: MAX_PROMPT_LENGTH,
};

/// All available image models
pub const IMAGE_MODELS: &[ImageModel] = &[GPT_IMAGE_1, FLUX_1_KONTEXT_PRO];

/// Model used when a request does not name one.
pub const DEFAULT_MODEL: &ImageModel = &GPT_IMAGE_1;

// =============================================================================
// Image Options
// =============================================================================

/// Output image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSize {
    /// Square 1024x1024
    #[serde(rename = "1024x1024")]
    Square,
    /// Landscape 1536x1024
    #[serde(rename = "1536x1024")]
    Landscape,
    /// Portrait 1024x1536
    #[serde(rename = "1024x1536")]
    Portrait,
    /// Chosen by the model
    #[serde(rename = "auto")]
    Auto,
}

impl ImageSize {
    /// Every accepted size.
    pub const ALL: &'static [ImageSize] = &[
        ImageSize::Square,
        ImageSize::Landscape,
        ImageSize::Portrait,
        ImageSize::Auto,
    ];

    /// Wire value sent to the image API.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Square => "1024x1024",
            ImageSize::Landscape => "1536x1024",
            ImageSize::Portrait => "1024x1536",
            ImageSize::Auto => "auto",
        }
    }

    /// Parse a wire value.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == value)
    }
}

/// Encoded format of generated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG
    Png,
    /// JPEG
    Jpeg,
    /// WebP
    Webp,
}

impl OutputFormat {
    /// Every accepted output format.
    pub const ALL: &'static [OutputFormat] =
        &[OutputFormat::Png, OutputFormat::Jpeg, OutputFormat::Webp];

    /// Wire value sent to the image API.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Webp => "webp",
        }
    }

    /// MIME type of images in this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
        }
    }

    /// File extension used when persisting images.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// Parse a wire value.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == value)
    }
}

/// Background handling for generated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    /// Transparent background (png/webp only)
    Transparent,
    /// Opaque background
    Opaque,
    /// Chosen by the model
    Auto,
}

impl Background {
    /// Every accepted background.
    pub const ALL: &'static [Background] =
        &[Background::Transparent, Background::Opaque, Background::Auto];

    /// Wire value sent to the image API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Background::Transparent => "transparent",
            Background::Opaque => "opaque",
            Background::Auto => "auto",
        }
    }

    /// Parse a wire value.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| b.as_str() == value)
    }
}

/// Rendering quality requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
    /// Chosen by the model
    Auto,
}

impl Quality {
    /// Every accepted quality.
    pub const ALL: &'static [Quality] =
        &[Quality::Low, Quality::Medium, Quality::High, Quality::Auto];

    /// Wire value sent to the image API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
            Quality::Auto => "auto",
        }
    }

    /// Parse a wire value.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|q| q.as_str() == value)
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(ImageSize, OutputFormat, Background, Quality);

// =============================================================================
// Model Registry
// =============================================================================

/// Model registry for resolution and listing.
///
/// Provides methods to resolve model names or aliases to their full definitions,
/// and to list all available models.
pub struct ModelRegistry;

impl ModelRegistry {
    /// Resolve an image model name or alias to full model definition.
    ///
    /// Accepts either the canonical model ID (e.g., "gpt-image-1") or any of
    /// its aliases (e.g., "flux"). Matching is case-insensitive.
    ///
    /// # Examples
    ///
    /// ```
    /// use imagegen_mcp_common::models::ModelRegistry;
    ///
    /// // Resolve by canonical ID
    /// let model = ModelRegistry::resolve_image_model("gpt-image-1");
    /// assert!(model.is_some());
    ///
    /// // Resolve by alias
    /// let model = ModelRegistry::resolve_image_model("flux");
    /// assert_eq!(model.unwrap().id, "FLUX.1-Kontext-pro");
    /// ```
    pub fn resolve_image_model(name: &str) -> Option<&'static ImageModel> {
        let name = name.trim();
        IMAGE_MODELS.iter().find(|model| {
            model.id.eq_ignore_ascii_case(name)
                || model.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
        })
    }

    /// List all available image models.
    pub fn list_image_models() -> &'static [ImageModel] {
        IMAGE_MODELS
    }

    /// List the models that accept edit requests.
    pub fn list_edit_models() -> impl Iterator<Item = &'static ImageModel> {
        IMAGE_MODELS.iter().filter(|m| m.supports_edit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_id() {
        let model = ModelRegistry::resolve_image_model("gpt-image-1").unwrap();
        assert_eq!(model.id, "gpt-image-1");
        assert!(model.supports_edit);
        assert!(!model.supports_seed);
    }

    #[test]
    fn test_resolve_by_alias() {
        let model = ModelRegistry::resolve_image_model("flux-kontext").unwrap();
        assert_eq!(model.id, "FLUX.1-Kontext-pro");
        assert_eq!(model.provider, ProviderKind::Flux);
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let model = ModelRegistry::resolve_image_model("flux.1-kontext-PRO").unwrap();
        assert_eq!(model.id, "FLUX.1-Kontext-pro");
    }

    #[test]
    fn test_resolve_unknown() {
        assert!(ModelRegistry::resolve_image_model("dall-e-2").is_none());
        assert!(ModelRegistry::resolve_image_model("").is_none());
    }

    #[test]
    fn test_only_gpt_image_edits() {
        let ids: Vec<&str> = ModelRegistry::list_edit_models().map(|m| m.id).collect();
        assert_eq!(ids, vec!["gpt-image-1"]);
    }

    #[test]
    fn test_default_model() {
        assert_eq!(DEFAULT_MODEL.id, "gpt-image-1");
    }

    #[test]
    fn test_size_wire_values() {
        assert_eq!(ImageSize::parse("1536x1024"), Some(ImageSize::Landscape));
        assert_eq!(ImageSize::parse("auto"), Some(ImageSize::Auto));
        assert_eq!(ImageSize::parse("512x512"), None);
        assert_eq!(ImageSize::Portrait.to_string(), "1024x1536");
    }

    #[test]
    fn test_output_format_mime_types() {
        assert_eq!(OutputFormat::Png.mime_type(), "image/png");
        assert_eq!(OutputFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(OutputFormat::Webp.mime_type(), "image/webp");
        assert_eq!(OutputFormat::parse("jpg"), None);
    }

    #[test]
    fn test_quality_wire_values() {
        assert_eq!(Quality::parse("high"), Some(Quality::High));
        assert_eq!(Quality::parse("standard"), None);
        assert_eq!(Quality::Auto.to_string(), "auto");
        assert_eq!(serde_json::to_string(&Quality::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn test_background_serde() {
        let json = serde_json::to_string(&Background::Transparent).unwrap();
        assert_eq!(json, "\"transparent\"");
        let parsed: Background = serde_json::from_str("\"opaque\"").unwrap();
        assert_eq!(parsed, Background::Opaque);
    }
}
