// Per-language sentence boundary rules
//
// Each rule is a regex matching one sentence: a run of non-terminators, then
// the terminators and any closing quotes/brackets that follow them. A newline
// always ends a sentence.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::types::LanguageTag;

/// Punctuation family a language's sentences end with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFamily {
    /// Chinese and Japanese: `。！？…` plus their half-width fallbacks `!?`
    FullWidth,
    /// Korean: both `.!?` and the full-width set, since both appear in print
    Mixed,
    /// Latin and Cyrillic scripts: `.!?`
    HalfWidth,
}

impl ScriptFamily {
    /// Family for a tag's primary subtag, `None` if the language is unknown
    pub fn for_language(tag: &LanguageTag) -> Option<Self> {
        match tag.primary().as_str() {
            "zh" | "ja" | "yue" | "lzh" | "wuu" => Some(Self::FullWidth),
            "ko" => Some(Self::Mixed),
            "en" | "fr" | "de" | "es" | "it" | "pt" | "nl" | "vi" | "id" | "ms" | "tr" | "pl"
            | "sv" | "da" | "no" | "nb" | "fi" | "cs" | "ro" | "hu" | "ca" | "tl" | "ru"
            | "uk" => Some(Self::HalfWidth),
            _ => None,
        }
    }
}

static FULL_WIDTH_RULE: Lazy<SplitRule> = Lazy::new(|| {
    SplitRule::compile(
        ScriptFamily::FullWidth,
        r#"[^。！？!?…\n]+(?:[。！？!?…]+[”’」』）》"')]*)?|[。！？!?…]+"#,
    )
});

static MIXED_RULE: Lazy<SplitRule> = Lazy::new(|| {
    SplitRule::compile(
        ScriptFamily::Mixed,
        r#"[^.!?。！？…\n]+(?:[.!?。！？…]+[”’」』）"')\]]*)?|[.!?。！？…]+"#,
    )
});

static HALF_WIDTH_RULE: Lazy<SplitRule> = Lazy::new(|| {
    SplitRule::compile(
        ScriptFamily::HalfWidth,
        r#"[^.!?\n]+(?:[.!?]+[”’"')\]]*)?|[.!?]+"#,
    )
});

/// Compiled sentence boundary rule
#[derive(Debug)]
pub struct SplitRule {
    family: ScriptFamily,
    sentence: Regex,
}

impl SplitRule {
    fn compile(family: ScriptFamily, pattern: &str) -> Self {
        Self {
            family,
            // Patterns are fixed literals above; a failure here is a programming error
            sentence: Regex::new(pattern).unwrap_or_else(|e| panic!("invalid split rule: {}", e)),
        }
    }

    /// Rule for a script family
    pub fn for_family(family: ScriptFamily) -> &'static SplitRule {
        match family {
            ScriptFamily::FullWidth => &FULL_WIDTH_RULE,
            ScriptFamily::Mixed => &MIXED_RULE,
            ScriptFamily::HalfWidth => &HALF_WIDTH_RULE,
        }
    }

    pub fn family(&self) -> ScriptFamily {
        self.family
    }

    /// Split text into trimmed, non-empty sentences in reading order
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.sentence
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Language → rule lookup with a fallback language
#[derive(Debug, Clone)]
pub struct SplitRules {
    default_family: ScriptFamily,
}

impl SplitRules {
    /// Unknown tags resolve to `default_language`'s rule. If the default is
    /// itself unknown, the mixed rule (every terminator) is used.
    pub fn new(default_language: &LanguageTag) -> Self {
        Self {
            default_family: ScriptFamily::for_language(default_language).unwrap_or(ScriptFamily::Mixed),
        }
    }

    pub fn pattern_for(&self, language: &LanguageTag) -> &'static SplitRule {
        let family = ScriptFamily::for_language(language).unwrap_or(self.default_family);
        SplitRule::for_family(family)
    }

    pub fn default_family(&self) -> ScriptFamily {
        self.default_family
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> SplitRules {
        SplitRules::new(&LanguageTag::from("zh-CN"))
    }

    #[test]
    fn test_period_split_ignores_blank_lines() {
        let rule = rules().pattern_for(&"en".into());
        assert_eq!(rule.split("Hello.\n\nWorld."), vec!["Hello.", "World."]);
    }

    #[test]
    fn test_latin_terminators_and_quotes() {
        let rule = rules().pattern_for(&"en-US".into());
        let sentences = rule.split(r#"He said "Stop." Then he left! Why? no ending"#);
        assert_eq!(
            sentences,
            vec![r#"He said "Stop.""#, "Then he left!", "Why?", "no ending"]
        );
    }

    #[test]
    fn test_full_width_split() {
        let rule = rules().pattern_for(&"zh-CN".into());
        assert_eq!(rule.family(), ScriptFamily::FullWidth);
        assert_eq!(
            rule.split("今天天气很好。你去哪儿？「走吧！」他说"),
            vec!["今天天气很好。", "你去哪儿？", "「走吧！」", "他说"]
        );
    }

    #[test]
    fn test_full_width_keeps_decimal_points() {
        let rule = rules().pattern_for(&"zh".into());
        assert_eq!(rule.split("价格是3.5元。好的"), vec!["价格是3.5元。", "好的"]);
    }

    #[test]
    fn test_korean_uses_both_sets() {
        let rule = rules().pattern_for(&"ko".into());
        assert_eq!(rule.family(), ScriptFamily::Mixed);
        assert_eq!(rule.split("안녕하세요. 반가워요！"), vec!["안녕하세요.", "반가워요！"]);
    }

    #[test]
    fn test_unknown_tag_falls_back_to_default() {
        let rules = rules();
        assert_eq!(rules.pattern_for(&"xx-YY".into()).family(), ScriptFamily::FullWidth);
        assert_eq!(rules.pattern_for(&"".into()).family(), ScriptFamily::FullWidth);

        let english_default = SplitRules::new(&"en".into());
        assert_eq!(english_default.pattern_for(&"tlh".into()).family(), ScriptFamily::HalfWidth);

        let unknown_default = SplitRules::new(&"tlh".into());
        assert_eq!(unknown_default.default_family(), ScriptFamily::Mixed);
    }

    #[test]
    fn test_stray_terminators_are_kept() {
        let rule = rules().pattern_for(&"en".into());
        assert_eq!(rule.split("Wait\n...\nok."), vec!["Wait", "...", "ok."]);
    }

    #[test]
    fn test_lookup_is_deterministic() {
        let rules = rules();
        let a = rules.pattern_for(&"ja".into()) as *const SplitRule;
        let b = rules.pattern_for(&"ja".into()) as *const SplitRule;
        assert_eq!(a, b);
    }
}
