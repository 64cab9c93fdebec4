//! 问题清单写入服务 - 业务能力层
//!
//! 只负责"写 findings.jsonl"能力，不关心流程

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use tracing::debug;

use crate::models::Finding;

/// 问题清单写入服务
///
/// 职责：
/// - 每条问题一行 JSON
/// - 按考试、题号、类别排序后写出，重复运行结果一致
pub struct FindingWriter {
    findings_file_path: String,
}

impl FindingWriter {
    pub fn new() -> Self {
        Self {
            findings_file_path: "findings.jsonl".to_string(),
        }
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            findings_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.findings_file_path
    }

    /// 覆盖写入全部问题
    pub async fn write_all(&self, findings: &[Finding]) -> Result<()> {
        let mut sorted = findings.to_vec();
        sorted.sort();
        sorted.dedup();

        debug!("写入问题清单: {} 条 -> {}", sorted.len(), self.findings_file_path);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.findings_file_path)
            .with_context(|| format!("无法打开问题清单 {}", self.findings_file_path))?;
        let mut writer = BufWriter::new(file);
        for finding in &sorted {
            serde_json::to_writer(&mut writer, finding)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        Ok(())
    }
}

impl Default for FindingWriter {
    fn default() -> Self {
        Self::new()
    }
}
