use serde::Serialize;
use std::fmt;

/// 数据质量问题类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingKind {
    /// 找不到源文档
    DocumentMissing,
    /// 外部提取工具失败
    ExtractionFailed,
    /// 文档没有可用文本或没有任何题号标记
    NonExtractable,
    /// 选组没有把握，默认使用第一组
    TrackAmbiguous,
    /// 合并题已拆分
    MergedQuestionRepaired,
    /// 拆分出的题目无法恢复题干
    StemRecoveryFailed,
    /// 拆分出的题号已有独立段落，这组选项被丢弃
    MergedSliceDiscarded,
    /// 所有步骤之后选项数仍不是 5
    OptionCount,
    /// 陈述组合题没有陈述
    MissingStatements,
    /// 答案下标超出选项范围，已丢弃
    CorrectIndexOutOfRange,
    /// 文档中没有可解析的答案表
    AnswerKeyMissing,
    /// 题目没有答案
    MissingAnswer,
    /// 题号缺失
    MissingQuestion,
    /// 题干为空
    EmptyText,
    /// 选项为空或重复
    OptionQuality,
    /// 文本中残留页眉、题型关键字等
    TextArtifact,
    /// 题型与陈述不符
    TypeMismatch,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        write!(f, "{}", name)
    }
}

/// 一条可供人工复核的问题记录
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub exam_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<u32>,
    pub kind: FindingKind,
    pub detail: String,
}

impl Finding {
    pub fn exam(exam_id: impl Into<String>, kind: FindingKind, detail: impl Into<String>) -> Self {
        Self {
            exam_id: exam_id.into(),
            question_id: None,
            kind,
            detail: detail.into(),
        }
    }

    pub fn question(
        exam_id: impl Into<String>,
        question_id: u32,
        kind: FindingKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            exam_id: exam_id.into(),
            question_id: Some(question_id),
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.question_id {
            Some(qid) => write!(f, "[{}] Q{} {}: {}", self.exam_id, qid, self.kind, self.detail),
            None => write!(f, "[{}] {}: {}", self.exam_id, self.kind, self.detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_serializes_kind_in_screaming_case() {
        let f = Finding::question("2019-march", 4, FindingKind::OptionCount, "Has 4 options");
        let json = serde_json::to_string(&f).unwrap();
        assert!(json.contains("\"kind\":\"OPTION_COUNT\""));
        assert!(json.contains("\"questionId\":4"));
        assert_eq!(f.to_string(), "[2019-march] Q4 OPTION_COUNT: Has 4 options");
    }
}
