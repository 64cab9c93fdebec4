//! 人工覆盖表
//!
//! 扫描件、乱码或无法自动恢复的题目由人工整理后放在 TOML 文件里，
//! 在合并阶段拥有最高优先级。检测逻辑中不写任何针对具体考试的特例。

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use super::answer_key::{parse_letters, AnswerKey, AnswerSource};
use super::exam_id::ExamId;
use super::question::{Question, QuestionType, OPTION_COUNT};
use crate::error::{AppError, AppResult};

/// 当前支持的覆盖表格式版本
pub const OVERRIDE_TABLE_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct RawOverrideFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default, rename = "exam")]
    exams: Vec<RawExamOverride>,
}

fn default_version() -> u32 {
    OVERRIDE_TABLE_VERSION
}

#[derive(Debug, Deserialize)]
struct RawExamOverride {
    id: String,
    #[serde(default)]
    answers: BTreeMap<String, String>,
    #[serde(default, rename = "question")]
    questions: Vec<RawQuestionOverride>,
}

#[derive(Debug, Deserialize)]
struct RawQuestionOverride {
    id: u32,
    #[serde(default, rename = "type")]
    kind: Option<QuestionType>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    statements: Option<Vec<String>>,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default)]
    correct: Option<String>,
}

/// 单题覆盖：每个字段都可选，存在即替换
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionOverride {
    pub kind: Option<QuestionType>,
    pub text: Option<String>,
    pub statements: Option<Vec<String>>,
    pub options: Option<Vec<String>>,
    pub correct: Option<BTreeSet<usize>>,
}

impl QuestionOverride {
    /// 覆盖内容足以单独构成一道题
    pub fn is_complete(&self) -> bool {
        self.kind.is_some()
            && self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
            && self.options.as_ref().is_some_and(|o| o.len() == OPTION_COUNT)
    }

    /// 把覆盖字段写入题目
    pub fn apply_to(&self, question: &mut Question) {
        if let Some(kind) = self.kind {
            question.kind = kind;
        }
        if let Some(text) = &self.text {
            question.text = text.clone();
        }
        if let Some(statements) = &self.statements {
            question.statements = statements.clone();
        }
        if let Some(options) = &self.options {
            question.options = options.clone();
        }
        if let Some(correct) = &self.correct {
            question.correct_indices = correct.iter().copied().collect();
        }
    }

    /// 由覆盖内容新建一道题
    pub fn to_question(&self, id: u32) -> Question {
        let mut question = Question::new(id, self.kind.unwrap_or(QuestionType::SingleChoice));
        self.apply_to(&mut question);
        question
    }
}

/// 单场考试的覆盖内容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExamOverride {
    pub answers: AnswerKey,
    pub questions: BTreeMap<u32, QuestionOverride>,
}

/// 整个覆盖表（只读）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideTable {
    pub version: u32,
    exams: BTreeMap<ExamId, ExamOverride>,
}

impl OverrideTable {
    pub fn empty() -> Self {
        Self {
            version: OVERRIDE_TABLE_VERSION,
            exams: BTreeMap::new(),
        }
    }

    /// 解析并校验 TOML 内容
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let raw: RawOverrideFile = toml::from_str(content)?;
        if raw.version != OVERRIDE_TABLE_VERSION {
            return Err(AppError::invalid_override(
                "*",
                format!("不支持的版本 {}", raw.version),
            ));
        }

        let mut exams = BTreeMap::new();
        for raw_exam in raw.exams {
            let exam_id: ExamId = raw_exam.id.parse()?;
            let entry: &mut ExamOverride = exams.entry(exam_id).or_default();

            for (qid, letters) in &raw_exam.answers {
                let id = qid.trim().parse::<u32>().map_err(|_| {
                    AppError::invalid_override(&raw_exam.id, format!("无效题号 '{}'", qid))
                })?;
                let indices = parse_letters(letters).ok_or_else(|| {
                    AppError::invalid_override(&raw_exam.id, format!("题 {} 的答案 '{}' 无效", id, letters))
                })?;
                entry.answers.insert(id, indices, AnswerSource::Override);
            }

            for raw_question in raw_exam.questions {
                let correct = match &raw_question.correct {
                    Some(letters) => Some(parse_letters(letters).ok_or_else(|| {
                        AppError::invalid_override(
                            &raw_exam.id,
                            format!("题 {} 的答案 '{}' 无效", raw_question.id, letters),
                        )
                    })?),
                    None => None,
                };
                if let Some(statements) = &raw_question.statements {
                    if statements.len() > OPTION_COUNT {
                        return Err(AppError::invalid_override(
                            &raw_exam.id,
                            format!("题 {} 的陈述超过 {} 条", raw_question.id, OPTION_COUNT),
                        ));
                    }
                }
                entry.questions.insert(
                    raw_question.id,
                    QuestionOverride {
                        kind: raw_question.kind,
                        text: raw_question.text,
                        statements: raw_question.statements,
                        options: raw_question.options,
                        correct,
                    },
                );
            }
        }

        Ok(Self {
            version: raw.version,
            exams,
        })
    }

    pub fn for_exam(&self, exam_id: &ExamId) -> Option<&ExamOverride> {
        self.exams.get(exam_id)
    }

    pub fn exam_ids(&self) -> impl Iterator<Item = &ExamId> {
        self.exams.keys()
    }

    pub fn len(&self) -> usize {
        self.exams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam_id::Session;

    const SAMPLE: &str = r#"
version = 1

[[exam]]
id = "2003-march"
answers = { 1 = "A", 25 = "A+D+E" }

[[exam.question]]
id = 7
type = "Aussagenkombination"
text = "Welche Aussagen treffen zu?"
statements = ["eins", "zwei"]
options = ["a", "b", "c", "d", "e"]
correct = "B+D"

[[exam]]
id = "2014-october"

[[exam.question]]
id = 3
text = "Nur der Stamm"
"#;

    #[test]
    fn test_parse_override_table() {
        let table = OverrideTable::from_toml_str(SAMPLE).unwrap();
        assert_eq!(table.len(), 2);

        let exam = table.for_exam(&ExamId::new(2003, Session::March)).unwrap();
        assert_eq!(exam.answers.indices(25), Some(vec![0, 3, 4]));
        let q7 = &exam.questions[&7];
        assert!(q7.is_complete());
        assert_eq!(q7.correct, Some(BTreeSet::from([1, 3])));

        let partial = table.for_exam(&ExamId::new(2014, Session::October)).unwrap();
        assert!(!partial.questions[&3].is_complete());
    }

    #[test]
    fn test_invalid_answer_is_rejected() {
        let bad = "[[exam]]\nid = \"2003-march\"\nanswers = { 1 = \"Z\" }\n";
        assert!(OverrideTable::from_toml_str(bad).is_err());
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        assert!(OverrideTable::from_toml_str("version = 2\n").is_err());
    }

    #[test]
    fn test_partial_override_applies_only_given_fields() {
        let mut q = Question::new(3, QuestionType::SingleChoice);
        q.options = vec![String::from("x"); 5];
        let ov = QuestionOverride {
            text: Some("Neu".to_string()),
            ..Default::default()
        };
        ov.apply_to(&mut q);
        assert_eq!(q.text, "Neu");
        assert_eq!(q.options.len(), 5);
    }
}
