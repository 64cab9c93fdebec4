//! 考试处理上下文
//!
//! 封装"我正在处理哪一场考试"这一信息

use std::fmt::Display;

use crate::models::ExamId;

/// 考试处理上下文
#[derive(Debug, Clone, Copy)]
pub struct ExamCtx {
    /// 考试标识
    pub exam_id: ExamId,

    /// 考试索引（从 1 开始，仅用于日志显示）
    pub exam_index: usize,
}

impl ExamCtx {
    pub fn new(exam_id: ExamId, exam_index: usize) -> Self {
        Self {
            exam_id,
            exam_index,
        }
    }
}

impl Display for ExamCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[试卷 {} {}]", self.exam_index, self.exam_id)
    }
}
