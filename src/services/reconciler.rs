//! 合并服务 - 业务能力层
//!
//! 把字段分类、选项块、答案表和人工覆盖合成最终题目。
//!
//! 字段优先级：覆盖表 > 答案表（仅答案）> 字段分类（题干、陈述，选项够 5 个时含选项）> 选项块

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::config::ExtractionConfig;
use crate::models::{
    AnswerKey, Exam, ExamId, ExamOverride, Finding, FindingKind, MarkerStyle, Question,
    QuestionType, Track, OPTION_COUNT,
};
use crate::services::field_classifier::{is_number_line, DraftFields, FieldClassifier};
use crate::services::question_segmenter::TYPE_KEYWORD_PATTERN;

static KEYWORD_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*({})\s*$", TYPE_KEYWORD_PATTERN)).expect("static regex")
});

/// 字段分类得到的一道题草稿
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionDraft {
    pub id: u32,
    pub kind: QuestionType,
    pub fields: DraftFields,
}

/// 合并所需的全部输入
#[derive(Debug, Clone, Copy)]
pub struct ReconcileInput<'i> {
    pub exam_id: ExamId,
    pub track: Option<Track>,
    pub source: Option<&'i str>,
    pub drafts: &'i [QuestionDraft],
    pub blocks: &'i BTreeMap<u32, Vec<String>>,
    pub answers: &'i AnswerKey,
    pub overrides: Option<&'i ExamOverride>,
    /// 参考题库中的同一场考试，用来确定应有的最后题号
    pub reference: Option<&'i Exam>,
}

/// 合并结果
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub exam: Exam,
    pub findings: Vec<Finding>,
}

/// 合并题中恢复出的后一题
struct Recovery {
    /// 在上一题最后一个选项的原始行中的拆分位置
    split: usize,
    kind: QuestionType,
    fields: DraftFields,
}

/// 合并服务
///
/// 职责：
/// - 按优先级合成每道题的字段
/// - 拆分漏掉起始标记而合在一起的题目
/// - 校验结构约束，违反时标记 incomplete 并记录问题
pub struct Reconciler<'a> {
    config: &'a ExtractionConfig,
    classifier: FieldClassifier<'a>,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a ExtractionConfig, style: MarkerStyle) -> Self {
        Self {
            config,
            classifier: FieldClassifier::new(config, style),
        }
    }

    pub fn reconcile(&self, input: ReconcileInput<'_>) -> Reconciliation {
        let exam_key = input.exam_id.to_string();
        let mut findings = Vec::new();
        let mut questions: BTreeMap<u32, Question> = BTreeMap::new();

        let draft_ids: BTreeSet<u32> = input.drafts.iter().map(|d| d.id).collect();
        for draft in input.drafts {
            for question in self.build_from_draft(&exam_key, draft, &draft_ids, input.blocks, &mut findings) {
                questions.entry(question.id).or_insert(question);
            }
        }

        // 只有选项块、没有起始标记的题
        for (id, options) in input.blocks {
            if questions.contains_key(id) {
                continue;
            }
            let mut question = Question::new(*id, QuestionType::SingleChoice);
            question.options = options.clone();
            question.incomplete = true;
            findings.push(Finding::question(
                &exam_key,
                *id,
                FindingKind::StemRecoveryFailed,
                "只找到选项块，没有题干",
            ));
            questions.insert(*id, question);
        }

        for question in questions.values_mut() {
            self.attach_answer(&exam_key, question, input.answers, &mut findings);
        }

        if let Some(overrides) = input.overrides {
            self.apply_overrides(&exam_key, &mut questions, overrides);
        }

        for question in questions.values_mut() {
            self.validate(&exam_key, question, &mut findings);
        }

        // 应有的最后题号：答案表与参考题库中较大者，都没有时取配置值
        let expected_last = input
            .answers
            .last_id()
            .max(input.reference.and_then(|r| r.questions.iter().map(|q| q.id).max()))
            .or(self.config.expected_question_count);
        if let Some(last) = expected_last.max(questions.keys().next_back().copied()) {
            for id in self.config.min_question_id..=last {
                if !questions.contains_key(&id) {
                    findings.push(Finding::question(&exam_key, id, FindingKind::MissingQuestion, "题号缺失"));
                }
            }
        }

        let mut exam = Exam::empty(input.exam_id);
        exam.track = input.track;
        exam.source = input.source.map(str::to_string);
        exam.questions = questions.into_values().collect();

        Reconciliation { exam, findings }
    }

    /// 一份草稿产生的题目；选项数是 5 的整数倍且大于 5 时拆分
    fn build_from_draft(
        &self,
        exam_key: &str,
        draft: &QuestionDraft,
        draft_ids: &BTreeSet<u32>,
        blocks: &BTreeMap<u32, Vec<String>>,
        findings: &mut Vec<Finding>,
    ) -> Vec<Question> {
        let count = draft.fields.option_count();
        if count > OPTION_COUNT && count % OPTION_COUNT == 0 {
            return self.repair_merged(exam_key, draft, draft_ids, findings);
        }

        let mut question = Question::new(draft.id, draft.kind);
        question.text = draft.fields.stem();
        question.statements = draft.fields.statements();
        let options = draft.fields.options();
        question.options = if options.len() >= OPTION_COUNT {
            options
        } else {
            match blocks.get(&draft.id) {
                Some(block) => {
                    debug!("题 {} 的选项取自选项块", draft.id);
                    block.clone()
                }
                None => options,
            }
        };
        vec![question]
    }

    fn repair_merged(
        &self,
        exam_key: &str,
        draft: &QuestionDraft,
        draft_ids: &BTreeSet<u32>,
        findings: &mut Vec<Finding>,
    ) -> Vec<Question> {
        let slices = draft.fields.option_count() / OPTION_COUNT;
        let mut option_lines = draft.fields.option_lines.clone();

        let mut recoveries = Vec::with_capacity(slices - 1);
        for k in 1..slices {
            let next_id = draft.id + k as u32;
            let boundary = k * OPTION_COUNT - 1;
            let recovery = self.recover(next_id, &option_lines[boundary]);
            if let Some(r) = &recovery {
                option_lines[boundary].truncate(r.split);
            }
            recoveries.push(recovery);
        }

        let slice_options = |k: usize| -> Vec<String> {
            DraftFields {
                option_lines: option_lines[k * OPTION_COUNT..(k + 1) * OPTION_COUNT].to_vec(),
                ..DraftFields::default()
            }
            .options()
        };

        let mut first = Question::new(draft.id, draft.kind);
        first.text = draft.fields.stem();
        first.statements = draft.fields.statements();
        first.options = slice_options(0);
        let mut out = vec![first];

        for (k, recovery) in (1..slices).zip(recoveries) {
            let id = draft.id + k as u32;
            if !self.config.is_valid_id(id) {
                debug!("拆分出的题 {} 超出题号范围，丢弃", id);
                continue;
            }
            if draft_ids.contains(&id) {
                debug!("拆分出的题 {} 已有独立段落，丢弃", id);
                findings.push(Finding::question(
                    exam_key,
                    draft.id,
                    FindingKind::MergedSliceDiscarded,
                    format!("第 {} 组选项属于已有段落的题 {}: {}", k + 1, id, slice_options(k).join(" | ")),
                ));
                continue;
            }

            let mut question = match &recovery {
                Some(r) => {
                    let mut q = Question::new(id, r.kind);
                    q.text = r.fields.stem();
                    q.statements = r.fields.statements();
                    q
                }
                None => Question::new(id, draft.kind),
            };
            question.options = slice_options(k);

            if question.text.is_empty() {
                question.incomplete = true;
                findings.push(Finding::question(
                    exam_key,
                    id,
                    FindingKind::StemRecoveryFailed,
                    format!("由题 {} 拆分而来，题干无法恢复", draft.id),
                ));
            }
            out.push(question);
        }

        info!("🔧 题 {} 含 {} 组选项，已拆分", draft.id, slices);
        findings.push(Finding::question(
            exam_key,
            draft.id,
            FindingKind::MergedQuestionRepaired,
            format!("{} 个选项拆分为 {} 道题", draft.fields.option_count(), out.len()),
        ));
        out
    }

    /// 在上一题最后一个选项的原始行里寻找后一题的题号
    fn recover(&self, next_id: u32, lines: &[String]) -> Option<Recovery> {
        let id_text = next_id.to_string();
        let split = lines.iter().position(|line| {
            let trimmed = line.trim();
            trimmed == id_text
                || trimmed
                    .strip_prefix(&id_text)
                    .is_some_and(|rest| rest.starts_with(char::is_whitespace) && !rest.trim().is_empty())
        })?;

        let mut tail: Vec<&str> = Vec::new();
        let head = lines[split].trim();
        let remainder = head[id_text.len()..].trim();
        if !remainder.is_empty() {
            tail.push(remainder);
        }
        tail.extend(lines[split + 1..].iter().map(String::as_str));

        let mut kind = None;
        if let Some(&first) = tail.first() {
            if let Some(caps) = KEYWORD_LINE_RE.captures(first) {
                kind = QuestionType::from_keyword(&caps[1]);
                tail.remove(0);
            }
        }

        let fields = self.classifier.classify_lines(
            kind.unwrap_or(QuestionType::StatementCombination),
            &tail,
        );
        let kind = kind.unwrap_or(if fields.statement_lines.is_empty() {
            QuestionType::SingleChoice
        } else {
            QuestionType::StatementCombination
        });

        if tail.iter().all(|l| l.trim().is_empty() || is_number_line(l)) {
            debug!("题 {} 的拆分行之后没有题干", next_id);
        }
        Some(Recovery { split, kind, fields })
    }

    fn attach_answer(
        &self,
        exam_key: &str,
        question: &mut Question,
        answers: &AnswerKey,
        findings: &mut Vec<Finding>,
    ) {
        let Some(entry) = answers.get(question.id) else { return };
        let limit = question.options.len().min(OPTION_COUNT);
        let (kept, dropped): (Vec<usize>, Vec<usize>) = entry.indices.iter().partition(|&&i| i < limit);
        if !dropped.is_empty() {
            findings.push(Finding::question(
                exam_key,
                question.id,
                FindingKind::CorrectIndexOutOfRange,
                format!("答案下标 {:?} 超出 {} 个选项", dropped, question.options.len()),
            ));
        }
        question.correct_indices = kept;
    }

    fn apply_overrides(
        &self,
        exam_key: &str,
        questions: &mut BTreeMap<u32, Question>,
        overrides: &ExamOverride,
    ) {
        for entry in overrides.answers.entries() {
            if let Some(question) = questions.get_mut(&entry.question_id) {
                question.correct_indices = entry.indices.iter().copied().collect();
            }
        }

        for (id, patch) in &overrides.questions {
            match questions.get_mut(id) {
                Some(question) => {
                    patch.apply_to(question);
                    question.incomplete = question.text.is_empty();
                }
                None if patch.is_complete() => {
                    let mut question = patch.to_question(*id);
                    if let Some(entry) = overrides.answers.get(*id) {
                        if patch.correct.is_none() {
                            question.correct_indices = entry.indices.iter().copied().collect();
                        }
                    }
                    questions.insert(*id, question);
                }
                None => debug!("[{}] 题 {} 的覆盖内容不完整且没有自动提取结果，跳过", exam_key, id),
            }
        }
    }

    fn validate(&self, exam_key: &str, question: &mut Question, findings: &mut Vec<Finding>) {
        if question.kind != QuestionType::StatementCombination {
            question.statements.clear();
        } else if question.statements.is_empty() {
            question.incomplete = true;
            findings.push(Finding::question(
                exam_key,
                question.id,
                FindingKind::MissingStatements,
                "陈述组合题没有陈述",
            ));
        }

        if question.options.len() != OPTION_COUNT {
            question.incomplete = true;
            findings.push(Finding::question(
                exam_key,
                question.id,
                FindingKind::OptionCount,
                format!("有 {} 个选项", question.options.len()),
            ));
        }

        question.correct_indices.retain(|&i| i < question.options.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerSource, OverrideTable, Session};

    fn exam_id() -> ExamId {
        ExamId::new(2022, Session::October)
    }

    fn draft(cfg: &ExtractionConfig, id: u32, kind: QuestionType, body: &str) -> QuestionDraft {
        QuestionDraft {
            id,
            kind,
            fields: FieldClassifier::new(cfg, MarkerStyle::Paren).classify(kind, body),
        }
    }

    fn run(
        cfg: &ExtractionConfig,
        drafts: &[QuestionDraft],
        blocks: &BTreeMap<u32, Vec<String>>,
        answers: &AnswerKey,
        overrides: Option<&ExamOverride>,
    ) -> Reconciliation {
        Reconciler::new(cfg, MarkerStyle::Paren).reconcile(ReconcileInput {
            exam_id: exam_id(),
            track: None,
            source: Some("Oktober-2022.pdf"),
            drafts,
            blocks,
            answers,
            overrides,
            reference: None,
        })
    }

    #[test]
    fn test_merged_question_is_split() {
        let cfg = ExtractionConfig::default();
        let body = "Erste Frage?\nA) a\nB) b\nC) c\nD) d\nE) e\n5\nZweite Frage?\nA) f\nB) g\nC) h\nD) i\nE) j";
        let drafts = [draft(&cfg, 4, QuestionType::SingleChoice, body)];
        let result = run(&cfg, &drafts, &BTreeMap::new(), &AnswerKey::new(), None);

        let questions = &result.exam.questions;
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].id, 4);
        assert_eq!(questions[0].options, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(questions[1].id, 5);
        assert_eq!(questions[1].text, "Zweite Frage?");
        assert_eq!(questions[1].options, vec!["f", "g", "h", "i", "j"]);
        assert!(!questions[1].incomplete);
        assert!(result
            .findings
            .iter()
            .any(|f| f.kind == FindingKind::MergedQuestionRepaired && f.question_id == Some(4)));
    }

    #[test]
    fn test_merged_question_without_stem_is_incomplete() {
        let cfg = ExtractionConfig::default();
        let body = "Frage\nA) a\nB) b\nC) c\nD) d\nE) e\nA) f\nB) g\nC) h\nD) i\nE) j";
        let drafts = [draft(&cfg, 9, QuestionType::SingleChoice, body)];
        let result = run(&cfg, &drafts, &BTreeMap::new(), &AnswerKey::new(), None);

        let second = &result.exam.questions[1];
        assert_eq!(second.id, 10);
        assert!(second.text.is_empty());
        assert!(second.incomplete);
        assert_eq!(second.options.len(), 5);
        assert!(result.findings.iter().any(|f| f.kind == FindingKind::StemRecoveryFailed));
    }

    #[test]
    fn test_block_options_fill_short_draft_and_answers_attach() {
        let cfg = ExtractionConfig::default();
        let drafts = [draft(&cfg, 1, QuestionType::MultiChoice, "Frage\nA) a\nB) b")];
        let mut blocks = BTreeMap::new();
        blocks.insert(1, vec!["v".to_string(), "w".into(), "x".into(), "y".into(), "z".into()]);
        let mut answers = AnswerKey::new();
        answers.insert(1, BTreeSet::from([1, 3]), AnswerSource::Grid);

        let result = run(&cfg, &drafts, &blocks, &answers, None);
        let q = &result.exam.questions[0];
        assert_eq!(q.options[0], "v");
        assert_eq!(q.correct_indices, vec![1, 3]);
        assert!(q.is_well_formed());
        assert!(result.findings.is_empty());
    }

    #[test]
    fn test_short_options_flagged_and_gap_reported() {
        let cfg = ExtractionConfig::default();
        let drafts = [
            draft(&cfg, 1, QuestionType::SingleChoice, "F\nA) a\nB) b\nC) c\nD) d\nE) e"),
            draft(&cfg, 3, QuestionType::SingleChoice, "F\nA) a\nB) b\nC) c\nD) d"),
        ];
        let mut answers = AnswerKey::new();
        answers.insert(3, BTreeSet::from([4]), AnswerSource::LinearList);
        let result = run(&cfg, &drafts, &BTreeMap::new(), &answers, None);

        let q3 = &result.exam.questions[1];
        assert!(q3.incomplete);
        assert!(q3.correct_indices.is_empty());
        let kinds: Vec<FindingKind> = result.findings.iter().map(|f| f.kind).collect();
        assert!(kinds.contains(&FindingKind::OptionCount));
        assert!(kinds.contains(&FindingKind::CorrectIndexOutOfRange));
        assert!(kinds.contains(&FindingKind::MissingQuestion));
    }

    #[test]
    fn test_trailing_missing_questions_are_reported() {
        let cfg = ExtractionConfig::default();
        let drafts = [
            draft(&cfg, 1, QuestionType::SingleChoice, "F\nA) a\nB) b\nC) c\nD) d\nE) e"),
            draft(&cfg, 2, QuestionType::SingleChoice, "F\nA) a\nB) b\nC) c\nD) d\nE) e"),
        ];
        let missing = |result: &Reconciliation| -> Vec<u32> {
            result
                .findings
                .iter()
                .filter(|f| f.kind == FindingKind::MissingQuestion)
                .filter_map(|f| f.question_id)
                .collect()
        };

        let mut answers = AnswerKey::new();
        for id in 1..=4 {
            answers.insert(id, BTreeSet::from([0]), AnswerSource::Grid);
        }
        let by_key = run(&cfg, &drafts, &BTreeMap::new(), &answers, None);
        assert_eq!(missing(&by_key), vec![3, 4]);

        let mut reference = Exam::empty(exam_id());
        reference.questions = (1..=5).map(|id| Question::new(id, QuestionType::SingleChoice)).collect();
        let by_reference = Reconciler::new(&cfg, MarkerStyle::Paren).reconcile(ReconcileInput {
            exam_id: exam_id(),
            track: None,
            source: None,
            drafts: &drafts,
            blocks: &BTreeMap::new(),
            answers: &answers,
            overrides: None,
            reference: Some(&reference),
        });
        assert_eq!(missing(&by_reference), vec![3, 4, 5]);

        let configured = ExtractionConfig {
            expected_question_count: Some(3),
            ..ExtractionConfig::default()
        };
        let by_config = run(&configured, &drafts, &BTreeMap::new(), &AnswerKey::new(), None);
        assert_eq!(missing(&by_config), vec![3]);

        let unbounded = run(&cfg, &drafts, &BTreeMap::new(), &AnswerKey::new(), None);
        assert!(missing(&unbounded).is_empty());
    }

    #[test]
    fn test_slice_for_existing_question_is_recorded() {
        let cfg = ExtractionConfig::default();
        let body = "Erste Frage?\nA) a\nB) b\nC) c\nD) d\nE) e\nA) f\nB) g\nC) h\nD) i\nE) j";
        let drafts = [
            draft(&cfg, 6, QuestionType::SingleChoice, body),
            draft(&cfg, 7, QuestionType::SingleChoice, "Eigene Frage?\nA) p\nB) q\nC) r\nD) s\nE) t"),
        ];
        let result = run(&cfg, &drafts, &BTreeMap::new(), &AnswerKey::new(), None);

        assert_eq!(result.exam.questions[1].options, vec!["p", "q", "r", "s", "t"]);
        let discarded: Vec<&Finding> = result
            .findings
            .iter()
            .filter(|f| f.kind == FindingKind::MergedSliceDiscarded)
            .collect();
        assert_eq!(discarded.len(), 1);
        assert_eq!(discarded[0].question_id, Some(6));
        assert!(discarded[0].detail.contains("f | g | h | i | j"));
    }

    #[test]
    fn test_statement_question_without_statements_is_flagged() {
        let cfg = ExtractionConfig::default();
        let drafts = [draft(
            &cfg,
            2,
            QuestionType::StatementCombination,
            "Welche Aussagen?\nA) 1\nB) 2\nC) 3\nD) 4\nE) 5",
        )];
        let result = run(&cfg, &drafts, &BTreeMap::new(), &AnswerKey::new(), None);
        assert!(result.exam.questions[0].incomplete);
        assert!(result.findings.iter().any(|f| f.kind == FindingKind::MissingStatements));
    }

    #[test]
    fn test_overrides_take_precedence_and_add_questions() {
        let cfg = ExtractionConfig::default();
        let table = OverrideTable::from_toml_str(
            r#"
version = 1
[[exam]]
id = "2022-october"
answers = { "1" = "E" }

[[exam.question]]
id = 2
type = "Einfachauswahl"
text = "Aus dem Scan"
options = ["a", "b", "c", "d", "e"]
correct = "B"
"#,
        )
        .unwrap();
        let overrides = table.for_exam(&exam_id());

        let drafts = [draft(&cfg, 1, QuestionType::SingleChoice, "F\nA) a\nB) b\nC) c\nD) d\nE) e")];
        let mut answers = AnswerKey::new();
        answers.insert(1, BTreeSet::from([0]), AnswerSource::Grid);
        let result = run(&cfg, &drafts, &BTreeMap::new(), &answers, overrides);

        let questions = &result.exam.questions;
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].correct_indices, vec![4]);
        assert_eq!(questions[1].text, "Aus dem Scan");
        assert_eq!(questions[1].correct_indices, vec![1]);
    }

    #[test]
    fn test_no_drafts_uses_overrides_only() {
        let cfg = ExtractionConfig::default();
        let result = run(&cfg, &[], &BTreeMap::new(), &AnswerKey::new(), None);
        assert!(result.exam.questions.is_empty());
        assert!(result.findings.is_empty());
        assert_eq!(result.exam.source.as_deref(), Some("Oktober-2022.pdf"));
    }
}
