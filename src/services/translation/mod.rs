pub mod api_client;
pub mod cache;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::TranslationResult;
use crate::core::types::LanguageTag;

pub use api_client::LlmTranslator;
pub use cache::TranslationCache;

/// One sentence of a translation response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedSentence {
    #[serde(default)]
    pub original: String,
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinyin: Option<String>,
}

/// Sentence-aligned translation of one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedBatch {
    pub sentences: Vec<TranslatedSentence>,
}

impl TranslatedBatch {
    /// Non-empty sentence translations joined with `separator`
    pub fn joined(&self, separator: &str) -> String {
        self.sentences
            .iter()
            .map(|s| s.translation.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Pinyin of every sentence that has one, space separated
    pub fn joined_pinyin(&self) -> String {
        self.sentences
            .iter()
            .filter_map(|s| s.pinyin.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Remote translation backend
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: &LanguageTag,
        target: &LanguageTag,
    ) -> TranslationResult<TranslatedBatch>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joined_translation_skips_blank_sentences() {
        let batch = TranslatedBatch {
            sentences: vec![
                TranslatedSentence {
                    original: "你好。".into(),
                    translation: " 안녕하세요. ".into(),
                    pinyin: Some("nǐ hǎo".into()),
                },
                TranslatedSentence {
                    original: "".into(),
                    translation: "  ".into(),
                    pinyin: None,
                },
                TranslatedSentence {
                    original: "再见。".into(),
                    translation: "안녕히 가세요.".into(),
                    pinyin: Some("zài jiàn".into()),
                },
            ],
        };

        assert_eq!(batch.joined("\n"), "안녕하세요.\n안녕히 가세요.");
        assert_eq!(batch.joined(" "), "안녕하세요. 안녕히 가세요.");
        assert_eq!(batch.joined_pinyin(), "nǐ hǎo zài jiàn");
    }

    #[test]
    fn test_sentence_deserializes_without_optional_fields() {
        let batch: TranslatedBatch =
            serde_json::from_str(r#"{"sentences":[{"translation":"안녕"}]}"#).unwrap();
        assert_eq!(batch.sentences[0].translation, "안녕");
        assert!(batch.sentences[0].pinyin.is_none());
    }
}
