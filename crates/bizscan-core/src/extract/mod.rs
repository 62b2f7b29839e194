//! Extraction gateway: image in, canonical record out.
//!
//! The service behind the gateway is a black box. Its failures carry internal
//! detail for logs only; the review session replaces them with a fixed
//! user-facing message.

#[cfg(feature = "native")]
mod gemini;
mod prompt;

#[cfg(feature = "native")]
pub use gemini::GeminiGateway;
pub use prompt::{REQUIRED_FIELDS, build_prompt, response_schema};

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ExtractionError;
use crate::models::record::CanonicalRecord;

/// Which script the extraction should prefer for name and position.
///
/// Company name always prefers Latin script unless none exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LanguageMode {
    /// Vietnamese/English text.
    #[default]
    Latin,
    /// Hangul text.
    Korean,
}

impl fmt::Display for LanguageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageMode::Latin => write!(f, "LATIN"),
            LanguageMode::Korean => write!(f, "KOREAN"),
        }
    }
}

/// Trait for extraction services.
#[async_trait]
pub trait ExtractionGateway: Send + Sync {
    /// Extract a record from an image. Fields the service could not resolve
    /// are empty strings.
    async fn extract(
        &self,
        image: &ImageInput,
        language: LanguageMode,
    ) -> Result<CanonicalRecord, ExtractionError>;
}

/// Binary image content with its detected MIME type.
#[derive(Clone)]
pub struct ImageInput {
    bytes: Vec<u8>,
    mime_type: String,
}

impl fmt::Debug for ImageInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageInput")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl ImageInput {
    /// Wrap raw bytes, detecting the format from content.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ExtractionError> {
        let format = image::guess_format(&bytes)
            .map_err(|e| ExtractionError::UnsupportedImage(e.to_string()))?;
        Ok(Self {
            bytes,
            mime_type: format.to_mime_type().to_string(),
        })
    }

    /// Read an image file.
    pub fn from_path(path: &Path) -> crate::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(bytes)?)
    }

    /// Shrink the image so its longer side is at most `max_size`.
    ///
    /// Images already within bounds (or `max_size == 0`) are returned as-is.
    /// Resized images are re-encoded as JPEG.
    pub fn downscaled(self, max_size: u32) -> Result<Self, ExtractionError> {
        if max_size == 0 {
            return Ok(self);
        }

        let decoded = image::load_from_memory(&self.bytes)
            .map_err(|e| ExtractionError::UnsupportedImage(e.to_string()))?;
        let (width, height) = decoded.dimensions();
        if width.max(height) <= max_size {
            return Ok(self);
        }

        let resized = decoded.resize(max_size, max_size, FilterType::Triangle);
        debug!(
            "Downscaled image from {}x{} to {}x{}",
            width,
            height,
            resized.width(),
            resized.height()
        );

        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(resized.to_rgb8())
            .write_to(&mut out, ImageFormat::Jpeg)
            .map_err(|e| ExtractionError::UnsupportedImage(e.to_string()))?;

        Ok(Self {
            bytes: out.into_inner(),
            mime_type: ImageFormat::Jpeg.to_mime_type().to_string(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
