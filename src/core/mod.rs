pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::{Config, LanguageDefaults, PipelineConfig};
pub use errors::{
    CacheError, ConfigError, OcrError, PipelineError, PreferencesError, TranslationError,
    UsageError,
};
pub use types::{
    DisplayMode, ImageData, LanguageTag, ProcessOptions, ProcessOutcome, ProcessedText,
    ProcessingMode, TextUnit, TranslationOutcome,
};
