use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅器
///
/// 级别由 `RUST_LOG` 控制，默认 `info`；`verbose` 为真时默认 `debug`。
/// 重复调用无副作用（测试中会多次调用）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n题库导入日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `max_concurrent`: 最大并发数
/// - `documents_dir`: 文档目录
pub fn log_startup(max_concurrent: usize, documents_dir: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 试卷题库导入");
    info!("📂 文档目录: {}", documents_dir);
    info!("📊 最大并发数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 记录考试列表信息
///
/// # 参数
/// - `total`: 考试总数
/// - `max_concurrent`: 最大并发数
pub fn log_exams_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 场待处理的考试", total);
    info!("📋 将以每批 {} 个的方式处理", max_concurrent);
}

/// 记录批次开始信息
pub fn log_batch_start(
    batch_num: usize,
    total_batches: usize,
    start: usize,
    end: usize,
    total: usize,
) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("📄 本批试卷: {}-{} / 共 {} 个", start, end, total);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
pub fn log_batch_complete(batch_num: usize, success: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 第 {} 批完成: 成功 {}/{}", batch_num, success, total);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 每场考试一行的摘要 `(考试标识, 题目数, 不完整题数)`
/// - `non_extractable`: 无法提取的考试
/// - `skipped`: 找不到文档或提取失败的考试
/// - `findings`: 问题记录总数
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(
    summary: &[(String, usize, usize)],
    non_extractable: &[String],
    skipped: &[String],
    findings: usize,
    log_file_path: &str,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    for (exam_id, questions, incomplete) in summary {
        info!("  {:<14} {:>3} 题 (不完整 {})", exam_id, questions, incomplete);
    }
    info!("{}", "─".repeat(60));
    let total_questions: usize = summary.iter().map(|(_, q, _)| q).sum();
    info!("✅ 考试: {} | 题目: {}", summary.len(), total_questions);
    if !non_extractable.is_empty() {
        info!("🖼️ 无法提取(扫描件): {}", non_extractable.join(", "));
    }
    if !skipped.is_empty() {
        info!("❌ 跳过: {}", skipped.join(", "));
    }
    info!("⚠️ 问题记录: {}", findings);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("Größenwahn", 5), "Größe...");
        assert_eq!(truncate_text("kurz", 10), "kurz");
    }
}
