// Error types for the capture and translation pipeline
//
// One enum per collaborator concern, plus PipelineError wrapping them with
// the stage that failed.

use thiserror::Error;

/// OCR collaborator errors
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("OCR service returned {status}: {message}")]
    ServiceError { status: u16, message: String },

    #[error("Invalid OCR response: {0}")]
    InvalidResponse(String),

    #[error("OCR engine is not configured (set VISION_API_KEY)")]
    NotConfigured,

    #[error("Image could not be decoded: {0}")]
    InvalidImage(#[from] image::ImageError),
}

/// Translation collaborator errors
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("API request failed: {0}")]
    ApiRequestFailed(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    ApiStatus { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Circuit breaker is open, translation backend unavailable")]
    CircuitOpen,

    #[error("Translation backend is not configured (set TRANSLATION_API_KEY)")]
    NotConfigured,

    #[error("Translation of chunk {chunk_index} failed: {source}")]
    ChunkFailed {
        chunk_index: usize,
        #[source]
        source: Box<TranslationError>,
    },
}

/// Preferences collaborator errors
#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("Failed to read preferences from {path}: {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write preferences to {path}: {source}")]
    WriteFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Preferences file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Usage counter errors
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("Usage limit reached ({used}/{limit})")]
    LimitExceeded { used: u64, limit: u64 },
}

/// Translation cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to load cache from {path}: {source}")]
    LoadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to save cache to {path}: {source}")]
    SaveFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Cache serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Cache directory creation failed: {0}")]
    DirectoryCreationFailed(std::io::Error),

    #[error("Cache capacity must be > 0")]
    ZeroCapacity,
}

/// Image-to-text pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Text extraction failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("Preferences lookup failed: {0}")]
    Preferences(#[from] PreferencesError),

    #[error("Usage counter rejected capture: {0}")]
    Usage(#[from] UsageError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Chunk threshold must be in 1..=100000, got {0}")]
    InvalidChunkThreshold(usize),

    #[error("Language tag for {field} must not be empty")]
    EmptyLanguage { field: &'static str },

    #[error("Invalid cache config: {0}")]
    InvalidCacheConfig(String),

    #[error("Invalid translation config: {0}")]
    InvalidTranslationConfig(String),

    #[error("Environment variable parsing failed: {0}")]
    EnvVarError(String),
}

pub type OcrResult<T> = Result<T, OcrError>;
pub type TranslationResult<T> = Result<T, TranslationError>;
pub type PreferencesResult<T> = Result<T, PreferencesError>;
pub type UsageResult<T> = Result<T, UsageError>;
pub type CacheResult<T> = Result<T, CacheError>;
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Attaches the chunk index to a translation failure
pub trait ChunkContext<T> {
    fn with_chunk_context(self, chunk_index: usize) -> TranslationResult<T>;
}

impl<T> ChunkContext<T> for TranslationResult<T> {
    fn with_chunk_context(self, chunk_index: usize) -> TranslationResult<T> {
        self.map_err(|e| TranslationError::ChunkFailed {
            chunk_index,
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_context_wraps_source() {
        let failed: TranslationResult<()> = Err(TranslationError::CircuitOpen);
        let err = failed.with_chunk_context(3).unwrap_err();

        assert!(matches!(err, TranslationError::ChunkFailed { chunk_index: 3, .. }));
        assert!(err.to_string().contains("chunk 3"));
    }

    #[test]
    fn test_pipeline_error_from_usage() {
        let err: PipelineError = UsageError::LimitExceeded { used: 10, limit: 10 }.into();
        assert_eq!(err.to_string(), "Usage counter rejected capture: Usage limit reached (10/10)");
    }
}
