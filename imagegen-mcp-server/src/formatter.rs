//! Response formatting.
//!
//! Turns generated images into one of three response shapes. URL-based
//! shapes persist every image through the configured [`ImageStore`] first;
//! storage failures fail the request.

use std::fmt;
use std::sync::Arc;

use imagegen_mcp_common::error::{Error, Result};
use imagegen_mcp_common::storage::ImageStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::card::AdaptiveCard;
use crate::generator::GeneratedImage;

/// Requested response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Raw image bytes with MIME type
    Image,
    /// Markdown document embedding stored image URLs
    Markdown,
    /// Adaptive Card JSON referencing stored image URLs
    AdaptiveCard,
}

impl ResponseFormat {
    pub const ALL: &'static [ResponseFormat] = &[
        ResponseFormat::Image,
        ResponseFormat::Markdown,
        ResponseFormat::AdaptiveCard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::Image => "image",
            ResponseFormat::Markdown => "markdown",
            ResponseFormat::AdaptiveCard => "adaptive_card",
        }
    }

    /// Parse a wire value.
    ///
    /// # Errors
    /// Returns `Error::UnsupportedFormat` for anything outside the three shapes.
    pub fn parse(value: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == value)
            .ok_or_else(|| Error::UnsupportedFormat(value.to_string()))
    }

    /// Whether the images must be persisted to build this shape.
    pub fn needs_storage(&self) -> bool {
        !matches!(self, ResponseFormat::Image)
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A formatted response body.
#[derive(Debug, Clone)]
pub enum ResponsePayload {
    Image(Vec<GeneratedImage>),
    Markdown(String),
    AdaptiveCard(serde_json::Value),
}

impl ResponsePayload {
    pub fn format(&self) -> ResponseFormat {
        match self {
            ResponsePayload::Image(_) => ResponseFormat::Image,
            ResponsePayload::Markdown(_) => ResponseFormat::Markdown,
            ResponsePayload::AdaptiveCard(_) => ResponseFormat::AdaptiveCard,
        }
    }
}

/// Characters that start inline Markdown syntax or block constructs.
const MARKDOWN_SPECIAL: &[char] = &[
    '\\', '`', '*', '_', '{', '}', '[', ']', '(', ')', '#', '+', '-', '!', '|', '<', '>', '~',
];

/// Escape `text` so it renders literally on a single Markdown line.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\r' | '\n' => escaped.push(' '),
            c if MARKDOWN_SPECIAL.contains(&c) => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}

/// Markdown document with one embed per image URL.
///
/// The prompt is escaped, so the only embeds are the images.
pub fn markdown_document(prompt: &str, urls: &[String]) -> String {
    let mut doc = format!(
        "# Generated {} Image(s)\n\n**Prompt:** {}\n\n",
        urls.len(),
        escape_markdown(prompt)
    );
    for (i, url) in urls.iter().enumerate() {
        doc.push_str(&format!("![Generated Image {}]({})\n\n", i + 1, url));
    }
    doc
}

/// Shapes generated images into the requested response.
#[derive(Clone)]
pub struct ResponseFormatter {
    store: Arc<dyn ImageStore>,
}

impl fmt::Debug for ResponseFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFormatter")
            .field("store", &self.store.backend())
            .finish()
    }
}

impl ResponseFormatter {
    pub fn new(store: Arc<dyn ImageStore>) -> Self {
        Self { store }
    }

    /// Backend name of the underlying store.
    pub fn store_backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Format `images` for `prompt`.
    ///
    /// # Errors
    /// Storage failures for URL-based shapes, or `Error::Serialization` when
    /// the card cannot be encoded.
    #[instrument(level = "debug", skip(self, images, prompt), fields(count = images.len()))]
    pub async fn format(
        &self,
        images: Vec<GeneratedImage>,
        prompt: &str,
        format: ResponseFormat,
    ) -> Result<ResponsePayload> {
        match format {
            ResponseFormat::Image => Ok(ResponsePayload::Image(images)),
            ResponseFormat::Markdown => {
                let urls = self.persist(&images).await?;
                Ok(ResponsePayload::Markdown(markdown_document(prompt, &urls)))
            }
            ResponseFormat::AdaptiveCard => {
                let urls = self.persist(&images).await?;
                let card = serde_json::to_value(AdaptiveCard::for_images(prompt, &urls))?;
                Ok(ResponsePayload::AdaptiveCard(card))
            }
        }
    }

    /// Store every image in order, returning their URLs.
    async fn persist(&self, images: &[GeneratedImage]) -> Result<Vec<String>> {
        let mut urls = Vec::with_capacity(images.len());
        for image in images {
            let url = self.store.store(&image.bytes, image.format).await?;
            debug!(url = %url, backend = self.store.backend(), "Stored image");
            urls.push(url);
        }
        Ok(urls)
    }
}
