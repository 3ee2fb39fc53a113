// Domain types shared by the capture, segmentation and translation stages

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::errors::OcrResult;
use std::sync::Arc;

/// Opaque language identifier such as `zh-CN` or `ko`.
///
/// No validation happens here; lookups that don't recognise a tag fall back
/// to a configured default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageTag(String);

impl LanguageTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased primary subtag (`zh-CN` -> `zh`, `ko_KR` -> `ko`)
    pub fn primary(&self) -> String {
        self.0
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LanguageTag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// How captured text is split into units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    Paragraph,
    #[default]
    Sentence,
    Full,
}

impl std::str::FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paragraph" => Ok(Self::Paragraph),
            "sentence" => Ok(Self::Sentence),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown processing mode: {}", other)),
        }
    }
}

/// What the reader view shows for each unit. Passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Full,
    OriginalOnly,
    TranslationOnly,
}

/// One segmented piece of captured text.
///
/// Units are never edited in place; translation produces a new unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextUnit {
    pub original_text: String,
    pub translated_text: String,
    pub pinyin: String,
    pub source_language: LanguageTag,
    pub target_language: LanguageTag,
}

impl TextUnit {
    /// Untranslated unit, as produced by segmentation
    pub fn untranslated(
        original_text: impl Into<String>,
        source_language: LanguageTag,
        target_language: LanguageTag,
    ) -> Self {
        Self {
            original_text: original_text.into(),
            translated_text: String::new(),
            pinyin: String::new(),
            source_language,
            target_language,
        }
    }

    pub fn with_translation(&self, translated_text: impl Into<String>, pinyin: impl Into<String>) -> Self {
        Self {
            original_text: self.original_text.clone(),
            translated_text: translated_text.into(),
            pinyin: pinyin.into(),
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
        }
    }

    pub fn is_translated(&self) -> bool {
        !self.translated_text.is_empty()
    }
}

/// Full processing result for one capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedText {
    pub mode: ProcessingMode,
    pub display_mode: DisplayMode,
    pub full_original_text: String,
    pub full_translated_text: String,
    pub units: Vec<TextUnit>,
    pub source_language: LanguageTag,
    pub target_language: LanguageTag,
}

impl ProcessedText {
    /// Blank result carrying only the languages
    pub fn empty(mode: ProcessingMode, source_language: LanguageTag, target_language: LanguageTag) -> Self {
        Self {
            mode,
            display_mode: DisplayMode::default(),
            full_original_text: String::new(),
            full_translated_text: String::new(),
            units: Vec::new(),
            source_language,
            target_language,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.full_original_text.is_empty() && self.units.is_empty()
    }
}

/// Result of turning one image into a [`ProcessedText`].
///
/// Every variant carries a usable `ProcessedText`; the variant tells callers
/// whether an empty result means "no text on the page" or "a collaborator
/// failed".
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Processed(ProcessedText),
    NoText(ProcessedText),
    Degraded { result: ProcessedText, reason: String },
}

impl ProcessOutcome {
    pub fn processed_text(&self) -> &ProcessedText {
        match self {
            Self::Processed(text) | Self::NoText(text) => text,
            Self::Degraded { result, .. } => result,
        }
    }

    pub fn into_processed_text(self) -> ProcessedText {
        match self {
            Self::Processed(text) | Self::NoText(text) => text,
            Self::Degraded { result, .. } => result,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Processed(_) => "processed",
            Self::NoText(_) => "no_text",
            Self::Degraded { .. } => "degraded",
        }
    }
}

/// Result of a fail-soft translation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Translated(String),
    Empty,
    Degraded { reason: String },
}

impl TranslationOutcome {
    /// Translated text, or `""` when nothing was produced
    pub fn text(&self) -> &str {
        match self {
            Self::Translated(text) => text,
            Self::Empty | Self::Degraded { .. } => "",
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Translated(_) => "translated",
            Self::Empty => "empty",
            Self::Degraded { .. } => "degraded",
        }
    }
}

/// Captured image handed to the OCR collaborator
#[derive(Clone)]
pub struct ImageData {
    pub filename: String,
    pub image_bytes: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

impl ImageData {
    /// Decode just enough of an uploaded image to validate it and read its size
    pub fn decode(filename: impl Into<String>, bytes: Vec<u8>) -> OcrResult<Self> {
        let img = image::load_from_memory(&bytes)?;

        Ok(Self {
            filename: filename.into(),
            width: img.width(),
            height: img.height(),
            image_bytes: Arc::new(bytes),
        })
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("filename", &self.filename)
            .field("bytes", &self.image_bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Per-call options for the image pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    pub mode: ProcessingMode,
    pub display_mode: DisplayMode,
    /// Skip the usage-counter increment (re-processing an already counted capture)
    pub count_usage: bool,
    pub allow_over_limit: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::default(),
            display_mode: DisplayMode::default(),
            count_usage: true,
            allow_over_limit: false,
        }
    }
}

impl ProcessOptions {
    pub fn with_mode(mode: ProcessingMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}
