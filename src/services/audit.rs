//! 质量检查服务 - 业务能力层
//!
//! 对合成后的题目做只读检查，结果写入问题清单供人工复核

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::models::{Exam, Finding, FindingKind, Question, QuestionType};

const MAX_OPTION_CHARS: usize = 120;
const MIN_OPTION_CHARS: usize = 3;

static ARTIFACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Korrekturrand|Gruppe\s*[AB]\b|Heilpraktikerüberprüfung|Institut\s+Ehlert")
        .expect("static regex")
});
static TYPE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^a-zäöüß])(?:Einfachauswahl|Aussagenkombination|Mehrfachauswahl)(?:$|[^a-zäöüß])")
        .expect("static regex")
});
static CONTROL_CHAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]").expect("static regex"));
static MERGED_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d\s*[A-E]\)|[A-E]\)\s*[A-E]\)").expect("static regex"));

fn option_label(index: usize) -> char {
    (b'A' + index as u8) as char
}

/// 质量检查服务
///
/// 检查项：空题干、空选项或重复选项、选项过长过短、
/// 题型与陈述不一致、文本中残留页眉与题型关键字、缺少答案。
#[derive(Debug, Default, Clone, Copy)]
pub struct QualityAudit;

impl QualityAudit {
    pub fn new() -> Self {
        Self
    }

    pub fn audit(&self, exam: &Exam) -> Vec<Finding> {
        let mut findings = Vec::new();
        for question in &exam.questions {
            self.audit_question(&exam.id, question, &mut findings);
        }
        findings
    }

    fn audit_question(&self, exam_id: &str, q: &Question, findings: &mut Vec<Finding>) {
        let mut add = |kind: FindingKind, detail: String| {
            findings.push(Finding::question(exam_id, q.id, kind, detail));
        };

        if q.text.trim().is_empty() {
            add(FindingKind::EmptyText, "题干为空".to_string());
        }
        if q.correct_indices.is_empty() {
            add(FindingKind::MissingAnswer, "没有正确答案".to_string());
        }

        let mut seen: HashMap<String, usize> = HashMap::new();
        for (i, option) in q.options.iter().enumerate() {
            let trimmed = option.trim();
            let chars = trimmed.chars().count();
            if chars == 0 {
                add(FindingKind::OptionQuality, format!("选项 {} 为空", option_label(i)));
                continue;
            }
            if chars > MAX_OPTION_CHARS {
                add(FindingKind::OptionQuality, format!("选项 {} 过长（{} 字符）", option_label(i), chars));
            } else if chars < MIN_OPTION_CHARS {
                add(FindingKind::OptionQuality, format!("选项 {} 过短: '{}'", option_label(i), trimmed));
            }
            if let Some(first) = seen.insert(trimmed.to_lowercase(), i) {
                add(
                    FindingKind::OptionQuality,
                    format!("选项 {} 与选项 {} 重复", option_label(i), option_label(first)),
                );
            }
            if MERGED_LABEL_RE.is_match(option) {
                add(FindingKind::TextArtifact, format!("选项 {} 中有选项标记", option_label(i)));
            }
        }

        if q.kind != QuestionType::StatementCombination && !q.statements.is_empty() {
            add(
                FindingKind::TypeMismatch,
                format!("{} 道陈述但题型为 {}", q.statements.len(), q.kind.keyword()),
            );
        }

        let fields = std::iter::once(("题干", q.text.as_str()))
            .chain(q.statements.iter().map(|s| ("陈述", s.as_str())))
            .chain(q.options.iter().map(|o| ("选项", o.as_str())));
        for (label, value) in fields {
            if let Some(m) = ARTIFACT_RE.find(value) {
                add(FindingKind::TextArtifact, format!("{}中残留 '{}'", label, m.as_str()));
            }
            if label != "题干" && TYPE_MARKER_RE.is_match(value) {
                add(FindingKind::TextArtifact, format!("{}中残留题型关键字", label));
            }
            if CONTROL_CHAR_RE.is_match(value) {
                add(FindingKind::TextArtifact, format!("{}中有控制字符", label));
            }
        }
    }
}
