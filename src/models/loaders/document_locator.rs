use crate::models::exam_id::ExamId;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 按文件名约定查找考试文档
///
/// 模板中的 `{month}` 替换为德语场次（`Maerz`/`Oktober`），`{year}` 替换为年份。
#[derive(Debug, Clone)]
pub struct DocumentLocator {
    documents_dir: PathBuf,
    templates: Vec<String>,
}

impl DocumentLocator {
    pub fn new(documents_dir: impl Into<PathBuf>, templates: Vec<String>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
            templates,
        }
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    fn render(template: &str, month: &str, exam_id: &ExamId) -> String {
        template
            .replace("{month}", month)
            .replace("{year}", &exam_id.year.to_string())
    }

    /// 查找文档：先按模板顺序，再按前缀扫描目录，最后按文件名识别
    ///
    /// 能被 [`discover`](Self::discover) 识别的文件一定能在这里找到。
    pub async fn locate(&self, exam_id: &ExamId) -> Option<PathBuf> {
        let month = exam_id.session.german_token();
        for template in &self.templates {
            let candidate = self.documents_dir.join(Self::render(template, month, exam_id));
            if fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
                return Some(candidate);
            }
        }

        let names = self.list_pdf_names().await.ok()?;
        let prefixes: Vec<String> = exam_id
            .session
            .german_spellings()
            .iter()
            .flat_map(|month| {
                [
                    Self::render("HPP_Pruefung_{month}_{year}", month, exam_id),
                    Self::render("{month}-{year}", month, exam_id),
                ]
            })
            .collect();
        names
            .iter()
            .find(|name| prefixes.iter().any(|p| name.starts_with(p.as_str())))
            .or_else(|| names.iter().find(|name| ExamId::from_file_name(name) == Some(*exam_id)))
            .map(|name| self.documents_dir.join(name))
    }

    /// 从目录中的文件名识别所有考试
    pub async fn discover(&self) -> Result<BTreeSet<ExamId>> {
        let names = self.list_pdf_names().await?;
        let ids: BTreeSet<ExamId> = names
            .iter()
            .filter_map(|name| ExamId::from_file_name(name))
            .collect();
        tracing::debug!("目录 {} 中识别到 {} 场考试", self.documents_dir.display(), ids.len());
        Ok(ids)
    }

    /// 排序后的 PDF 文件名
    async fn list_pdf_names(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.documents_dir)
            .await
            .with_context(|| format!("无法读取文件夹: {}", self.documents_dir.display()))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_pdf = path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if is_pdf {
                if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam_id::Session;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("exam_bank_import_{}_{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_template_order_wins() {
        let dir = scratch_dir("locate");
        std::fs::write(dir.join("Maerz-2016.pdf"), b"x").unwrap();
        std::fs::write(dir.join("HPP_Pruefung_Maerz_2016_mit_Loesungen.pdf"), b"x").unwrap();

        let locator = DocumentLocator::new(
            &dir,
            vec![
                "HPP_Pruefung_{month}_{year}_mit_Loesungen.pdf".to_string(),
                "{month}-{year}.pdf".to_string(),
            ],
        );
        let found = tokio_test::block_on(locator.locate(&ExamId::new(2016, Session::March))).unwrap();
        assert!(found.ends_with("HPP_Pruefung_Maerz_2016_mit_Loesungen.pdf"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_prefix_scan_and_discovery() {
        let dir = scratch_dir("discover");
        std::fs::write(dir.join("HPP_Pruefung_Oktober_2024_Sonderfall.pdf"), b"x").unwrap();
        std::fs::write(dir.join("notes.txt"), b"x").unwrap();

        let locator = DocumentLocator::new(&dir, vec!["{month}-{year}.pdf".to_string()]);
        let id = ExamId::new(2024, Session::October);
        let found = tokio_test::block_on(locator.locate(&id)).unwrap();
        assert!(found.ends_with("HPP_Pruefung_Oktober_2024_Sonderfall.pdf"));
        assert!(tokio_test::block_on(locator.locate(&ExamId::new(2023, Session::March))).is_none());

        let ids = tokio_test::block_on(locator.discover()).unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![id]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_umlaut_spelling_is_located() {
        let dir = scratch_dir("umlaut");
        std::fs::write(dir.join("März-2019.pdf"), b"x").unwrap();
        std::fs::write(dir.join("Pruefung_maerz_2018.pdf"), b"x").unwrap();

        let locator = DocumentLocator::new(&dir, vec!["{month}-{year}.pdf".to_string()]);
        let ids = tokio_test::block_on(locator.discover()).unwrap();
        assert_eq!(ids.len(), 2);
        for id in ids {
            let found = tokio_test::block_on(locator.locate(&id));
            assert!(found.is_some(), "{} discovered but not located", id);
        }
        let found = tokio_test::block_on(locator.locate(&ExamId::new(2019, Session::March))).unwrap();
        assert!(found.ends_with("März-2019.pdf"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
