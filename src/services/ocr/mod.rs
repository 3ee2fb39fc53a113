// OCR collaborator: image in, raw text out

pub mod vision;

use async_trait::async_trait;

use crate::core::errors::OcrResult;
use crate::core::types::{ImageData, LanguageTag};

pub use vision::VisionOcrClient;

/// Text extraction backend
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Raw text of the image, line breaks preserved. An image without text
    /// yields `Ok("")`. `language` is the expected source language.
    async fn extract_text(&self, image: &ImageData, language: &LanguageTag) -> OcrResult<String>;
}
