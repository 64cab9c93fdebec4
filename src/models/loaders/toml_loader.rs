use crate::models::overrides::OverrideTable;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载人工覆盖表
///
/// 文件不存在时返回空表；内容无效时报错。
pub async fn load_override_table(toml_file_path: &Path) -> Result<OverrideTable> {
    if fs::metadata(toml_file_path).await.is_err() {
        tracing::info!("未找到覆盖表 {}，使用空表", toml_file_path.display());
        return Ok(OverrideTable::empty());
    }

    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let table = OverrideTable::from_toml_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    tracing::info!(
        "成功加载覆盖表: {} 场考试 (版本 {})",
        table.len(),
        table.version
    );

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_override_file_yields_empty_table() {
        let path = std::env::temp_dir().join("exam_bank_import_no_such_overrides.toml");
        let table = tokio_test::block_on(load_override_table(&path)).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_load_override_file() {
        let path = std::env::temp_dir().join(format!(
            "exam_bank_import_overrides_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[[exam]]\nid = \"2005-october\"\nanswers = { 3 = \"C\" }\n").unwrap();

        let table = tokio_test::block_on(load_override_table(&path)).unwrap();
        let _ = std::fs::remove_file(&path);

        let exam_id: crate::models::ExamId = "2005-october".parse().unwrap();
        assert_eq!(table.for_exam(&exam_id).unwrap().answers.indices(3), Some(vec![2]));
    }
}
