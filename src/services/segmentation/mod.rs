// Text segmentation: cleaning OCR output and splitting it into reading units

pub mod cleaner;
pub mod split_rules;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::types::{LanguageTag, ProcessingMode};

pub use cleaner::clean;
pub use split_rules::{ScriptFamily, SplitRule, SplitRules};

/// Delimiter between paragraphs in cleaned and translated text
pub const PARAGRAPH_DELIMITER: &str = "\n\n";

static BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("static regex"));

/// Length in UTF-16 code units, the unit translation limits are expressed in
pub fn text_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Splits cleaned text into units for a [`ProcessingMode`]
#[derive(Debug, Clone)]
pub struct Segmenter {
    rules: SplitRules,
}

impl Segmenter {
    pub fn new(rules: SplitRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &SplitRules {
        &self.rules
    }

    /// Units in reading order. Blank paragraphs and sentences are skipped.
    pub fn segment(&self, text: &str, mode: ProcessingMode, language: &LanguageTag) -> Vec<String> {
        match mode {
            ProcessingMode::Full => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Vec::new()
                } else {
                    vec![trimmed.to_string()]
                }
            }
            ProcessingMode::Paragraph => BLANK_LINE
                .split(text)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            ProcessingMode::Sentence => self
                .rules
                .pattern_for(language)
                .split(text)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> Segmenter {
        Segmenter::new(SplitRules::new(&"zh-CN".into()))
    }

    #[test]
    fn test_sentence_mode() {
        let units = segmenter().segment("Hello.\n\nWorld.", ProcessingMode::Sentence, &"en".into());
        assert_eq!(units, vec!["Hello.", "World."]);
    }

    #[test]
    fn test_paragraph_mode() {
        let text = "第一段。还是第一段。\n\n第二段。\n \n\n第三段";
        let units = segmenter().segment(text, ProcessingMode::Paragraph, &"zh-CN".into());
        assert_eq!(units, vec!["第一段。还是第一段。", "第二段。", "第三段"]);
    }

    #[test]
    fn test_full_mode() {
        let seg = segmenter();
        assert_eq!(
            seg.segment("  一。\n\n二。 ", ProcessingMode::Full, &"zh".into()),
            vec!["一。\n\n二。"]
        );
        assert!(seg.segment("   ", ProcessingMode::Full, &"zh".into()).is_empty());
    }

    #[test]
    fn test_text_len_counts_utf16_units() {
        assert_eq!(text_len("abc"), 3);
        assert_eq!(text_len("你好"), 2);
        assert_eq!(text_len("𠀀"), 2);
    }
}
