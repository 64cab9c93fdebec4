//! 文本清洗
//!
//! 原始文本流中的噪声（不间断空格、控制字符、复选框字形、页眉）
//! 在这里统一处理，检测器只面对干净的行。

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// 选项前的复选框字形
pub const CHECKBOX_GLYPHS: [char; 3] = ['\u{f0a8}', '☐', '□'];

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static PAGE_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Heilpraktiker.*?(?:Gruppe\s+[AB]|Psychotherapie)\s*(?:\d+\s*)?").expect("static regex")
});
static HEADER_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:Heilpraktiker(?:über)?prüfung|Heilpraktikerueberpruefung)|Korrekturrand")
        .expect("static regex")
});
static AUFGABE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[Aa]ufgabe\s*").expect("static regex"));
static LEADING_INSTRUCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Wählen Sie[^?!]*[?!]\s*").expect("static regex"));
static TRAILING_INSTRUCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*Wählen Sie[^?]*$").expect("static regex"));
static LEADING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s+").expect("static regex"));

/// 原始提取结果的字符级清洗，保留换行结构
pub fn clean_raw_text(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| match c {
            '\u{a0}' => Some(' '),
            '\u{0c}' => Some('\n'),
            '\r' | '\u{01}' | '\u{02}' => None,
            other => Some(other),
        })
        .collect()
}

/// 去掉复选框字形、合并空白
pub fn normalize_text(text: &str) -> String {
    let without_glyphs: String = text.chars().filter(|c| !CHECKBOX_GLYPHS.contains(c)).collect();
    WHITESPACE_RE.replace_all(&without_glyphs, " ").trim().to_string()
}

/// 整行都是页眉或装订线提示
pub fn is_header_line(line: &str) -> bool {
    HEADER_LINE_RE.is_match(line)
}

/// 删除混入正文的页眉片段
pub fn strip_page_headers(text: &str) -> String {
    PAGE_HEADER_RE.replace_all(text, " ").trim().to_string()
}

/// 题干清洗
pub fn clean_stem(text: &str) -> String {
    let mut stem = strip_page_headers(&normalize_text(text));
    stem = normalize_text(&stem);
    stem = AUFGABE_PREFIX_RE.replace(&stem, "").trim().to_string();
    stem = LEADING_INSTRUCTION_RE.replace(&stem, "").trim().to_string();
    stem = TRAILING_INSTRUCTION_RE.replace(&stem, "").trim().to_string();
    LEADING_NUMBER_RE.replace(&stem, "").trim().to_string()
}

/// 陈述、选项的清洗
pub fn clean_field(text: &str) -> String {
    normalize_text(&strip_page_headers(&normalize_text(text)))
}

/// 向下取到最近的字符边界
pub fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// 按行切分并保留每行在原文中的字节偏移（不含换行符）
pub fn line_spans(text: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        spans.push((offset, line.trim_end_matches(['\n', '\r'])));
        offset += line.len();
    }
    spans
}

fn comparable_words(text: &str) -> HashSet<String> {
    normalize_text(text)
        .chars()
        .map(|c| match c {
            '„' | '“' | '”' | '‟' | '»' | '«' | '‚' => '"',
            '‘' | '’' | '‛' | '`' => '\'',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// 词重叠率：|交集| / max(|A|, |B|)
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let words_a = comparable_words(a);
    let words_b = comparable_words(b);
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let common = words_a.intersection(&words_b).count();
    common as f64 / words_a.len().max(words_b.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_raw_text_keeps_lines() {
        let raw = "1 Einfachauswahl\u{0c}Welche\u{a0}Aussage\u{02}\r\n";
        assert_eq!(clean_raw_text(raw), "1 Einfachauswahl\nWelche Aussage\n");
    }

    #[test]
    fn test_normalize_removes_checkboxes() {
        assert_eq!(normalize_text("\u{f0a8}  Depression\n  mit Wahn "), "Depression mit Wahn");
    }

    #[test]
    fn test_clean_stem_removes_prefix_and_instruction() {
        let stem = "Aufgabe Wählen Sie eine Antwort! Welche Aussage trifft zu?";
        assert_eq!(clean_stem(stem), "Welche Aussage trifft zu?");

        let trailing = "Welche Aussagen treffen zu? Wählen Sie zwei Antworten";
        assert_eq!(clean_stem(trailing), "Welche Aussagen treffen zu?");
    }

    #[test]
    fn test_page_header_fragment_removed() {
        let text = "Die Schizophrenie Heilpraktikerüberprüfung März 2019 Gruppe A 3 ist eine Psychose";
        assert_eq!(clean_field(text), "Die Schizophrenie ist eine Psychose");
        assert!(is_header_line("Heilpraktikerüberprüfung Psychotherapie"));
        assert!(!is_header_line("Ein Heilpraktiker darf"));
    }

    #[test]
    fn test_floor_char_boundary() {
        let text = "aü";
        assert_eq!(floor_char_boundary(text, 2), 1);
        assert_eq!(floor_char_boundary(text, 3), 3);
        assert_eq!(floor_char_boundary(text, 99), 3);
    }

    #[test]
    fn test_line_spans_offsets() {
        let text = "ab\n\ncd";
        let spans = line_spans(text);
        assert_eq!(spans, vec![(0, "ab"), (3, ""), (4, "cd")]);
        assert_eq!(&text[spans[2].0..], "cd");
    }

    #[test]
    fn test_word_overlap() {
        assert_eq!(word_overlap("a b c d", "a b c d"), 1.0);
        assert_eq!(word_overlap("a b", "c d"), 0.0);
        assert_eq!(word_overlap("", "a"), 0.0);
        assert!((word_overlap("„Welche“ Aussage", "\"welche\" aussage trifft zu") - 0.5).abs() < 1e-9);
    }
}
