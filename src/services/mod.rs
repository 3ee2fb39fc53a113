pub mod ocr;
pub mod preferences;
pub mod segmentation;
pub mod translation;
pub mod usage;

// Re-export commonly used services
pub use ocr::{OcrEngine, VisionOcrClient};
pub use preferences::{JsonFilePreferences, Preferences, PreferencesSource, StaticPreferences};
pub use segmentation::{clean, Segmenter, SplitRule, SplitRules};
pub use translation::{LlmTranslator, TranslatedBatch, TranslatedSentence, TranslationCache, Translator};
pub use usage::{LocalUsageCounter, UsageCounter};
