//! 字段分类服务 - 业务能力层
//!
//! 在一道题的范围内区分题干、陈述和选项

use regex::Regex;
use std::sync::LazyLock;

use crate::config::ExtractionConfig;
use crate::models::{MarkerStyle, QuestionType};
use crate::utils::text::{clean_field, clean_stem, is_header_line};

static PAREN_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[\u{f0a8}☐□]?\s*([A-E])\)(?:\s+(.*))?$").expect("static regex")
});
static PERIOD_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[\u{f0a8}☐□]?\s*([A-E])\.(?:\s+(.*))?$").expect("static regex")
});
static STATEMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d)\.\s+(.*)$").expect("static regex"));
static NUMBER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d{1,3}\s*$").expect("static regex"));

/// 判定文档使用的选项标记写法
///
/// 统计行首 `A)` 与 `A.` 的出现次数，数量相同时取 `A)`。
pub fn detect_marker_style(text: &str) -> MarkerStyle {
    let mut paren = 0usize;
    let mut period = 0usize;
    for line in text.lines() {
        if PAREN_OPTION_RE.is_match(line) {
            paren += 1;
        } else if PERIOD_OPTION_RE.is_match(line) {
            period += 1;
        }
    }
    if period > paren {
        MarkerStyle::Period
    } else {
        MarkerStyle::Paren
    }
}

/// 选项行匹配：返回字母下标与同一行上的文字
pub fn match_option_line(style: MarkerStyle, line: &str) -> Option<(usize, String)> {
    let re = match style {
        MarkerStyle::Paren => &*PAREN_OPTION_RE,
        MarkerStyle::Period => &*PERIOD_OPTION_RE,
    };
    let caps = re.captures(line)?;
    let letter = caps[1].chars().next()?;
    let rest = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
    Some((letter as usize - 'A' as usize, rest))
}

/// 只有题号的行（页码或未识别的题号）
pub fn is_number_line(line: &str) -> bool {
    NUMBER_LINE_RE.is_match(line)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Stem,
    Statements,
    Options,
}

/// 一道题的原始字段行
///
/// 行保持原样（包括单独的数字行），清洗在取值时进行，
/// 这样合并题拆分时仍能看到漏掉的题号。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftFields {
    pub stem_lines: Vec<String>,
    pub statement_lines: Vec<Vec<String>>,
    pub option_lines: Vec<Vec<String>>,
}

fn join_lines(lines: &[String]) -> String {
    lines
        .iter()
        .map(String::as_str)
        .filter(|l| !is_number_line(l) && !is_header_line(l))
        .collect::<Vec<_>>()
        .join(" ")
}

impl DraftFields {
    pub fn stem(&self) -> String {
        clean_stem(&join_lines(&self.stem_lines))
    }

    pub fn statements(&self) -> Vec<String> {
        self.statement_lines
            .iter()
            .map(|lines| clean_field(&join_lines(lines)))
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn options(&self) -> Vec<String> {
        self.option_lines
            .iter()
            .map(|lines| clean_field(&join_lines(lines)))
            .collect()
    }

    pub fn option_count(&self) -> usize {
        self.option_lines.len()
    }
}

/// 字段分类服务
///
/// 职责：
/// - 第一个选项标记之前（陈述之后）是题干
/// - 陈述标记 `1.` 只在陈述组合题中、且编号递增且接近连续时才接受
/// - 非标记行接到当前字段后面
pub struct FieldClassifier<'a> {
    config: &'a ExtractionConfig,
    style: MarkerStyle,
}

impl<'a> FieldClassifier<'a> {
    pub fn new(config: &'a ExtractionConfig, style: MarkerStyle) -> Self {
        Self { config, style }
    }

    pub fn style(&self) -> MarkerStyle {
        self.style
    }

    /// 对一段正文分类
    pub fn classify(&self, kind: QuestionType, body: &str) -> DraftFields {
        let lines: Vec<&str> = body.lines().collect();
        self.classify_lines(kind, &lines)
    }

    /// 对若干行分类
    pub fn classify_lines(&self, kind: QuestionType, lines: &[&str]) -> DraftFields {
        let allow_statements = kind == QuestionType::StatementCombination;
        let mut fields = DraftFields::default();
        let mut part = Part::Stem;
        let mut last_statement: Option<u32> = None;

        for line in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some((_, rest)) = match_option_line(self.style, line) {
                fields.option_lines.push(vec![rest]);
                part = Part::Options;
                continue;
            }

            if allow_statements && part != Part::Options {
                if let Some(caps) = STATEMENT_RE.captures(line) {
                    let n: u32 = caps[1].parse().unwrap_or(0);
                    if self.accepts_statement(last_statement, n) {
                        last_statement = Some(n);
                        fields.statement_lines.push(vec![caps[2].to_string()]);
                        part = Part::Statements;
                        continue;
                    }
                }
            }

            let target = match part {
                Part::Stem => Some(&mut fields.stem_lines),
                Part::Statements => fields.statement_lines.last_mut(),
                Part::Options => fields.option_lines.last_mut(),
            };
            if let Some(target) = target {
                target.push(trimmed.to_string());
            }
        }

        fields
    }

    /// 第一条必须是 1；之后必须严格递增且跳跃不超过配置值
    fn accepts_statement(&self, last: Option<u32>, n: u32) -> bool {
        match last {
            None => n == 1,
            Some(prev) => n > prev && n <= prev + self.config.statement_max_gap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_and_options() {
        let cfg = ExtractionConfig::default();
        let classifier = FieldClassifier::new(&cfg, MarkerStyle::Paren);
        let fields = classifier.classify(
            QuestionType::SingleChoice,
            "\nStem\nA) o1\nB) o2\nC) o3\nD) o4\nE) o5\n",
        );
        assert_eq!(fields.stem(), "Stem");
        assert_eq!(fields.options(), vec!["o1", "o2", "o3", "o4", "o5"]);
        assert!(fields.statements().is_empty());
    }

    #[test]
    fn test_statements_reject_incidental_numbering() {
        let cfg = ExtractionConfig::default();
        let classifier = FieldClassifier::new(&cfg, MarkerStyle::Paren);
        let body = "Welche Aussagen treffen zu?\n1. Beginn vor dem\n6. Lebensjahr\n2. Zweite\n3. Dritte\nA) Nur 1\nB) 1 und 2\nC) 2 und 3\nD) 1 und 3\nE) Alle";
        let fields = classifier.classify(QuestionType::StatementCombination, body);

        assert_eq!(fields.stem(), "Welche Aussagen treffen zu?");
        assert_eq!(
            fields.statements(),
            vec!["Beginn vor dem 6. Lebensjahr", "Zweite", "Dritte"]
        );
        assert_eq!(fields.option_count(), 5);
    }

    #[test]
    fn test_statements_ignored_for_single_choice() {
        let cfg = ExtractionConfig::default();
        let classifier = FieldClassifier::new(&cfg, MarkerStyle::Paren);
        let body = "Frage\n1. keine Aussage\nA) a\nB) b\nC) c\nD) d\nE) e";
        let fields = classifier.classify(QuestionType::SingleChoice, body);
        assert!(fields.statements().is_empty());
        assert_eq!(fields.stem(), "Frage 1. keine Aussage");
    }

    #[test]
    fn test_period_style_and_continuation_lines() {
        let cfg = ExtractionConfig::default();
        let classifier = FieldClassifier::new(&cfg, MarkerStyle::Period);
        let body = "Frage\nA. erste\nZeile\n12\nB. b\nC. c\nD. d\nE. e";
        let fields = classifier.classify(QuestionType::SingleChoice, body);
        assert_eq!(fields.options()[0], "erste Zeile");
        assert_eq!(fields.option_lines[0], vec!["erste", "Zeile", "12"]);
    }

    #[test]
    fn test_merged_region_keeps_all_option_markers() {
        let cfg = ExtractionConfig::default();
        let classifier = FieldClassifier::new(&cfg, MarkerStyle::Paren);
        let body = "F1\nA) a\nB) b\nC) c\nD) d\nE) e\n2\nF2\nA) f\nB) g\nC) h\nD) i\nE) j";
        let fields = classifier.classify(QuestionType::SingleChoice, body);
        assert_eq!(fields.option_count(), 10);
        assert_eq!(fields.options()[4], "e F2");
    }

    #[test]
    fn test_marker_style_detection_and_tie() {
        assert_eq!(detect_marker_style("A. x\nB. y\nC) z"), MarkerStyle::Period);
        assert_eq!(detect_marker_style("A) x\nB) y\nC. z"), MarkerStyle::Paren);
        assert_eq!(detect_marker_style("A) x\nB. y"), MarkerStyle::Paren);
        assert_eq!(detect_marker_style("kein Marker"), MarkerStyle::Paren);
    }
}
