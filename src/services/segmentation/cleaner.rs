// OCR noise removal
//
// Runs before segmentation. The transform is idempotent: every step leaves
// text that the same step would not change again.

use once_cell::sync::Lazy;
use regex::Regex;

static HORIZONTAL_SPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\t\x0B\x0C \u{00A0}\u{1680}\u{2000}-\u{200B}\u{202F}\u{205F}\u{3000}\u{FEFF}]+")
        .expect("static regex")
});

/// `12`, `- 12 -`, `p. 12`, `Page 12`, `12 / 300`, `第12页`, `12쪽`
static PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)^(?:
            (?:[-–—~·•]\s*)?(?:pp?\.?\s*|page\s+)?\d{1,4}(?:\s*/\s*\d{1,4})?(?:\s*[-–—~·•])?
          | 第\s*\d{1,4}\s*[页頁]
          | \d{1,4}\s*(?:[页頁쪽]|ページ)
        )$",
    )
    .expect("static regex")
});

static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// Strip OCR artefacts from extracted text.
///
/// Collapses horizontal whitespace, drops spaces OCR inserts between CJK
/// characters, removes isolated page numbers and symbol-only lines, and
/// normalises paragraph breaks to a single blank line.
pub fn clean(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");

    let lines: Vec<String> = normalized
        .split('\n')
        .map(clean_line)
        .filter(|line| line.is_empty() || !is_noise_line(line))
        .collect();

    let joined = lines.join("\n");
    EXCESS_NEWLINES
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

fn clean_line(line: &str) -> String {
    let collapsed = HORIZONTAL_SPACE.replace_all(line, " ");
    remove_cjk_gaps(&collapsed).trim().to_string()
}

/// Remove single spaces between two CJK characters
fn remove_cjk_gaps(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ' ' {
            let prev_is_cjk = out.chars().next_back().is_some_and(is_cjk);
            let next_is_cjk = chars.peek().copied().is_some_and(is_cjk);
            if prev_is_cjk && next_is_cjk {
                continue;
            }
        }
        out.push(c);
    }

    out
}

fn is_noise_line(line: &str) -> bool {
    PAGE_NUMBER.is_match(line) || !line.chars().any(char::is_alphanumeric)
}

/// Han ideographs, kana, and CJK/full-width punctuation. Hangul is excluded
/// because Korean separates words with spaces.
pub(crate) fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3001}'..='\u{303F}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FF01}'..='\u{FF60}'
        | '\u{20000}'..='\u{2FA1F}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_page_numbers() {
        let raw = "第一章\n\n天下大势，分久必合。\n\n12\n\n合久必分。\n- 13 -\nPage 14\n第15页\n3 / 200";
        assert_eq!(clean(raw), "第一章\n\n天下大势，分久必合。\n\n合久必分。");
    }

    #[test]
    fn test_removes_symbol_noise() {
        let raw = "Hello world.\n•••\n|\n~~~\nSecond line.";
        assert_eq!(clean(raw), "Hello world.\nSecond line.");
    }

    #[test]
    fn test_collapses_whitespace_and_cjk_gaps() {
        assert_eq!(clean("  你 好 ，世　界  "), "你好，世界");
        assert_eq!(clean("中 文 字"), "中文字");
        assert_eq!(clean("Hello \t  there"), "Hello there");
        assert_eq!(clean("안녕 하세요"), "안녕 하세요");
        assert_eq!(clean("中文 text 中文"), "中文 text 中文");
    }

    #[test]
    fn test_normalizes_paragraph_breaks() {
        assert_eq!(clean("A\r\n\r\n\r\n\r\nB\rC"), "A\n\nB\nC");
        assert_eq!(clean("A\n  \n \nB"), "A\n\nB");
    }

    #[test]
    fn test_keeps_numbers_inside_content() {
        assert_eq!(clean("2024年3月\n共12人"), "2024年3月\n共12人");
    }

    #[test]
    fn test_empty_and_noise_only_input() {
        assert_eq!(clean(""), "");
        assert_eq!(clean("  \n\n 7 \n***"), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "Hello.\n\nWorld.",
            "  你 好 ，世　界  \n\n\n\n12\n再见 。",
            "中 文 字\r\n\r\n- 3 -\r\n\t第二段 落",
            "\u{FEFF}Page 1\n\n\nText\u{00A0}\u{00A0}here .\n...\n",
            "a\n\n \n\nb\n\n\n\n\nc",
            "、 。",
        ];

        for sample in samples {
            let once = clean(sample);
            assert_eq!(clean(&once), once, "not idempotent for {:?}", sample);
        }
    }
}
