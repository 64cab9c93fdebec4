//! 单场考试处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责处理单场考试，是考试级别的编排器。
//!
//! 1. **上下文**：为考试建立 `ExamCtx`
//! 2. **流程调度**：委托 `ExamFlow` 完成提取与合并
//! 3. **统计输出**：记录题目数、不完整数和问题记录数

use tracing::info;

use crate::models::{Exam, ExamId, ExamOverride};
use crate::workflow::{ExamCtx, ExamFlow, ExamOutcome, ExamStatus};

/// 处理单场考试
///
/// # 参数
/// - `flow`: 考试处理流程
/// - `exam_id`: 考试标识
/// - `exam_index`: 考试索引（用于日志）
/// - `overrides`: 该考试的人工覆盖
/// - `reference`: 参考题库中的同一场考试
pub async fn process_exam(
    flow: &ExamFlow,
    exam_id: ExamId,
    exam_index: usize,
    overrides: Option<&ExamOverride>,
    reference: Option<&Exam>,
) -> ExamOutcome {
    let ctx = ExamCtx::new(exam_id, exam_index);
    log_exam_start(&ctx, overrides.is_some(), reference.is_some());

    let outcome = flow.run(&ctx, overrides, reference).await;

    log_exam_complete(&ctx, &outcome);
    outcome
}

// ========== 日志辅助函数 ==========

fn log_exam_start(ctx: &ExamCtx, has_overrides: bool, has_reference: bool) {
    info!("\n{}", "─".repeat(60));
    info!("{} 📝 开始处理", ctx);
    if has_overrides {
        info!("{} 📌 存在人工覆盖", ctx);
    }
    if has_reference {
        info!("{} 📚 存在参考题库", ctx);
    }
}

fn log_exam_complete(ctx: &ExamCtx, outcome: &ExamOutcome) {
    let status = match outcome.status {
        ExamStatus::Extracted => "✅ 已提取",
        ExamStatus::NonExtractable => "🖼️ 无法提取",
        ExamStatus::Missing => "❓ 缺少文档",
        ExamStatus::Failed => "❌ 提取失败",
    };
    info!(
        "{} {} | 题目: {} | 不完整: {} | 问题记录: {}",
        ctx,
        status,
        outcome.exam.questions.len(),
        outcome.exam.incomplete_count(),
        outcome.findings.len()
    );
}
