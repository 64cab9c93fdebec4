use crate::models::question::Exam;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 加载参考题库（上一版发布的 JSON）
pub async fn load_reference_corpus(json_file_path: &Path) -> Result<Vec<Exam>> {
    let content = fs::read_to_string(json_file_path)
        .await
        .with_context(|| format!("无法读取JSON文件: {}", json_file_path.display()))?;

    let mut exams: Vec<Exam> = serde_json::from_str(&content)
        .with_context(|| format!("无法解析JSON文件: {}", json_file_path.display()))?;
    exams.sort_by(|a, b| (a.year, a.session).cmp(&(b.year, b.session)));

    tracing::info!(
        "成功加载参考题库: {} 场考试, {} 道题",
        exams.len(),
        exams.iter().map(|e| e.questions.len()).sum::<usize>()
    );

    Ok(exams)
}

/// 写出题库
///
/// 相同输入必须得到逐字节相同的输出，调用方负责排序。
pub async fn save_corpus(json_file_path: &Path, exams: &[Exam]) -> Result<()> {
    let mut content = serde_json::to_string_pretty(exams).context("无法序列化题库")?;
    content.push('\n');
    fs::write(json_file_path, content)
        .await
        .with_context(|| format!("无法写入题库: {}", json_file_path.display()))?;
    Ok(())
}
