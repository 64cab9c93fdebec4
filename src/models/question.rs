use phf::phf_map;
use serde::{Deserialize, Serialize};

use super::document::Track;
use super::exam_id::{ExamId, Session};

/// 每道题的目标选项数
pub const OPTION_COUNT: usize = 5;

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    /// 单选
    #[serde(rename = "Einfachauswahl")]
    SingleChoice,
    /// 固定数量多选
    #[serde(rename = "Mehrfachauswahl", alias = "Mehrfachauswahlaufgabe")]
    MultiChoice,
    /// 陈述组合
    #[serde(rename = "Aussagenkombination", alias = "Aussagekombination")]
    StatementCombination,
}

/// 文档中的题型关键字（去掉空白后的小写形式）
static TYPE_KEYWORDS: phf::Map<&'static str, QuestionType> = phf_map! {
    "einfachauswahl" => QuestionType::SingleChoice,
    "mehrfachauswahl" => QuestionType::MultiChoice,
    "mehrfachauswahlaufgabe" => QuestionType::MultiChoice,
    "aussagenkombination" => QuestionType::StatementCombination,
    "aussagekombination" => QuestionType::StatementCombination,
};

impl QuestionType {
    /// 把文档里的关键字（可能带有断开的空白，如 `Aussagen kombination`）映射为题型
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let compact: String = keyword
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        TYPE_KEYWORDS.get(compact.as_str()).copied()
    }

    pub fn keyword(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "Einfachauswahl",
            QuestionType::MultiChoice => "Mehrfachauswahl",
            QuestionType::StatementCombination => "Aussagenkombination",
        }
    }
}

/// 一道题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub text: String,
    #[serde(default)]
    pub statements: Vec<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_indices: Vec<usize>,
    /// 预留字段，目前总是空
    #[serde(default)]
    pub explanation: String,
    /// 无法凑齐 5 个选项或题干时置位
    #[serde(default, skip_serializing_if = "is_false")]
    pub incomplete: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Question {
    pub fn new(id: u32, kind: QuestionType) -> Self {
        Self {
            id,
            kind,
            text: String::new(),
            statements: Vec::new(),
            options: Vec::new(),
            correct_indices: Vec::new(),
            explanation: String::new(),
            incomplete: false,
        }
    }

    /// 是否满足最终题目的结构约束
    pub fn is_well_formed(&self) -> bool {
        let options_ok = self.options.len() == OPTION_COUNT;
        let statements_ok = match self.kind {
            QuestionType::StatementCombination => {
                (1..=OPTION_COUNT).contains(&self.statements.len())
            }
            _ => self.statements.is_empty(),
        };
        let indices_ok = self
            .correct_indices
            .iter()
            .all(|&i| i < OPTION_COUNT && i < self.options.len());
        options_ok && statements_ok && indices_ok && !self.text.is_empty()
    }
}

/// 一场考试
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: String,
    pub year: u16,
    #[serde(alias = "month")]
    pub session: Session,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "gruppe")]
    pub track: Option<Track>,
    /// 来源文档的文件名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Exam {
    pub fn empty(exam_id: ExamId) -> Self {
        Self {
            id: exam_id.to_string(),
            year: exam_id.year,
            session: exam_id.session,
            track: None,
            source: None,
            questions: Vec::new(),
        }
    }

    /// 前两道题的题干，用于选组
    pub fn opening_texts(&self) -> Vec<&str> {
        self.questions
            .iter()
            .take(2)
            .map(|q| q.text.as_str())
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn incomplete_count(&self) -> usize {
        self.questions.iter().filter(|q| q.incomplete).count()
    }
}
