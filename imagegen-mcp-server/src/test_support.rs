//! In-memory collaborators shared by the unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use imagegen_mcp_common::error::{Error, Result, StorageError, StorageOperation};
use imagegen_mcp_common::models::{ImageModel, OutputFormat};
use imagegen_mcp_common::storage::ImageStore;

use crate::generator::{
    EditInput, GenerateInput, GeneratedImage, GenerationOutput, ImageGenerator,
};

/// Store that records writes and hands out predictable URLs.
#[derive(Default)]
pub struct RecordingStore {
    pub writes: Mutex<Vec<(Vec<u8>, OutputFormat)>>,
    pub fail: bool,
}

impl RecordingStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageStore for RecordingStore {
    async fn store(&self, bytes: &[u8], format: OutputFormat) -> std::result::Result<String, StorageError> {
        if self.fail {
            return Err(StorageError::operation_failed(
                "memory",
                StorageOperation::Write,
                "disk full",
            ));
        }
        let mut writes = self.writes.lock().unwrap();
        writes.push((bytes.to_vec(), format));
        Ok(format!(
            "https://images.test/_upload/img-{}.{}",
            writes.len(),
            format.extension()
        ))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Generator returning fixed images and recording what it was asked.
pub struct FakeGenerator {
    pub model: &'static ImageModel,
    pub outputs: Vec<Vec<u8>>,
    pub enhanced_prompt: Option<String>,
    pub error: Option<fn() -> Error>,
    pub generate_calls: AtomicUsize,
    pub edit_calls: AtomicUsize,
    pub last_generate: Mutex<Option<GenerateInput>>,
    pub last_edit: Mutex<Option<EditInput>>,
}

impl FakeGenerator {
    pub fn new(model: &'static ImageModel, outputs: Vec<Vec<u8>>) -> Self {
        Self {
            model,
            outputs,
            enhanced_prompt: None,
            error: None,
            generate_calls: AtomicUsize::new(0),
            edit_calls: AtomicUsize::new(0),
            last_generate: Mutex::new(None),
            last_edit: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst) + self.edit_calls.load(Ordering::SeqCst)
    }

    fn output(&self, format: OutputFormat) -> Result<GenerationOutput> {
        if let Some(error) = self.error {
            return Err(error());
        }
        Ok(GenerationOutput {
            images: self
                .outputs
                .iter()
                .map(|bytes| GeneratedImage {
                    bytes: bytes.clone(),
                    format,
                })
                .collect(),
            enhanced_prompt: None,
        })
    }
}

#[async_trait]
impl ImageGenerator for FakeGenerator {
    fn model(&self) -> &'static ImageModel {
        self.model
    }

    async fn generate(&self, input: GenerateInput) -> Result<GenerationOutput> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let format = input.output_format;
        let enhance = input.enhance_prompt;
        *self.last_generate.lock().unwrap() = Some(input);
        let mut output = self.output(format)?;
        if enhance {
            output.enhanced_prompt = self.enhanced_prompt.clone();
        }
        Ok(output)
    }

    async fn edit(&self, input: EditInput) -> Result<GenerationOutput> {
        self.edit_calls.fetch_add(1, Ordering::SeqCst);
        let format = input.output_format;
        *self.last_edit.lock().unwrap() = Some(input);
        self.output(format)
    }
}

/// Encode an RGBA or RGB PNG of the given size.
pub fn png_fixture(width: u32, height: u32, alpha: bool) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    let image = if alpha {
        image::DynamicImage::ImageRgba8(image::RgbaImage::new(width, height))
    } else {
        image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
    };
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}
