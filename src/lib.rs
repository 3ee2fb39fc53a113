// Library exports for the capture-to-translation reading workflow

pub mod core;
pub mod middleware;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use core::{
    config::{Config, LanguageDefaults, PipelineConfig},
    errors::{CacheError, ConfigError, OcrError, PipelineError, TranslationError, UsageError},
    types::{
        DisplayMode, ImageData, LanguageTag, ProcessOptions, ProcessOutcome, ProcessedText,
        ProcessingMode, TextUnit, TranslationOutcome,
    },
};

pub use middleware::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

pub use orchestration::{TextPipeline, TranslationOrchestrator};

pub use services::{
    clean, LlmTranslator, OcrEngine, PreferencesSource, Segmenter, SplitRules, TranslationCache,
    Translator, UsageCounter, VisionOcrClient,
};

pub use utils::{Metrics, MetricsSnapshot};
