//! Image generation MCP server library.
//!
//! Generates and edits images with gpt-image-1 and FLUX.1-Kontext-pro through
//! OpenAI-compatible Images APIs. The same pipeline is exposed as MCP tools
//! and as a JSON REST API; results come back as raw images, a Markdown
//! document or an Adaptive Card.

pub mod api;
pub mod card;
pub mod formatter;
pub mod generator;
pub mod handler;
pub mod reference;
pub mod resources;
pub mod server;

#[cfg(test)]
mod test_support;


pub use formatter::{ResponseFormat, ResponseFormatter, ResponsePayload};
pub use generator::{GeneratedImage, GeneratorRegistry, ImageGenerator, OpenAiImageGenerator};
pub use handler::{EditImageParams, GenerateImageParams, ImageHandler};
pub use reference::{DecodedImage, ImageResolver};
pub use server::ImageServer;
