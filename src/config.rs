use serde::Deserialize;
use std::path::Path;

use crate::error::{AppError, AppResult, FileError};

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的文档数量
    pub max_concurrent_documents: usize,
    /// PDF 文档目录
    pub documents_dir: String,
    /// 输出题库文件
    pub output_corpus: String,
    /// 数据质量问题输出文件（JSON Lines）
    pub findings_file: String,
    /// 人工覆盖表（TOML）
    pub override_table: String,
    /// 参考题库（上一版 JSON，可选）
    pub reference_corpus: Option<String>,
    /// 只处理这些考试（为空时自动发现）
    pub exam_ids: Vec<String>,
    /// 文件名模板，按顺序尝试
    pub filename_templates: Vec<String>,
    /// pdftotext 可执行文件
    pub pdftotext_bin: String,
    /// pdftohtml 可执行文件
    pub pdftohtml_bin: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 检测阈值
    pub extraction: ExtractionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_documents: 4,
            documents_dir: "fragen".to_string(),
            output_corpus: "exams.json".to_string(),
            findings_file: "findings.jsonl".to_string(),
            override_table: "overrides.toml".to_string(),
            reference_corpus: None,
            exam_ids: Vec::new(),
            filename_templates: default_filename_templates(),
            pdftotext_bin: "pdftotext".to_string(),
            pdftohtml_bin: "pdftohtml".to_string(),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        let extraction = std::env::var("EXTRACTION_CONFIG")
            .ok()
            .and_then(|path| match ExtractionConfig::from_toml_file(Path::new(&path)) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    tracing::warn!("⚠️ 无法加载阈值配置 {}: {}，使用默认值", path, e);
                    None
                }
            })
            .unwrap_or(default.extraction);

        Self {
            max_concurrent_documents: std::env::var("MAX_CONCURRENT_DOCUMENTS").ok().and_then(|v| v.parse().ok()).filter(|n| *n > 0).unwrap_or(default.max_concurrent_documents),
            documents_dir: std::env::var("EXAM_DOCS_DIR").unwrap_or(default.documents_dir),
            output_corpus: std::env::var("EXAM_OUTPUT").unwrap_or(default.output_corpus),
            findings_file: std::env::var("EXAM_FINDINGS").unwrap_or(default.findings_file),
            override_table: std::env::var("EXAM_OVERRIDES").unwrap_or(default.override_table),
            reference_corpus: std::env::var("EXAM_REFERENCE").ok().or(default.reference_corpus),
            exam_ids: std::env::var("EXAM_IDS").ok().map(|v| split_list(&v)).unwrap_or(default.exam_ids),
            filename_templates: std::env::var("EXAM_FILENAME_TEMPLATES").ok().map(|v| split_list(&v)).filter(|t| !t.is_empty()).unwrap_or(default.filename_templates),
            pdftotext_bin: std::env::var("PDFTOTEXT_BIN").unwrap_or(default.pdftotext_bin),
            pdftohtml_bin: std::env::var("PDFTOHTML_BIN").unwrap_or(default.pdftohtml_bin),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            extraction,
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_filename_templates() -> Vec<String> {
    [
        "{month}-{year}.pdf",
        "HPP_Pruefung_{month}_{year}_mit_Loesungen_.pdf",
        "HPP_Pruefung_{month}_{year}_mit_Loesungen.pdf",
        "HPP_Pruefung_{month}_{year}_.pdf",
        "HPP_Pruefung_{month}_{year}_mit_Loesungen_A_B.pdf",
        "HPP_Pruefung_{month}_{year}_Gruppe_A_mit_Loesungen.pdf",
        "HPP_Pruefung_{month}_{year}_mit_Loesungen_Gruppe_A.pdf",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// 检测阈值
///
/// 所有检测器共用的启发式常量，集中在一处调整，
/// 按引用传入每个检测器。
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    /// 题号下限
    pub min_question_id: u32,
    /// 题号上限
    pub max_question_id: u32,
    /// 每场考试应有的题数；答案表和参考题库都无法给出最后题号时用于报告缺题
    pub expected_question_count: Option<u32>,
    /// 少于此数量的非空白字符视为扫描件
    pub min_text_chars: usize,

    /// 陈述编号允许的最大跳跃（1. 之后最多接受 1+gap）
    pub statement_max_gap: u32,

    /// 从 A 标记向后搜索 B–E 的窗口（字节）
    pub option_search_window: usize,
    /// 相邻选项标记之间的最大距离
    pub max_option_gap: usize,
    /// 第五个选项结尾的前瞻长度
    pub last_option_lookahead: usize,
    /// 第五个选项找不到结尾时截取的长度
    pub last_option_fallback: usize,
    /// 向前寻找题号的窗口
    pub backward_window: usize,

    /// 第二组标签至少出现在文档的这个比例之后
    pub track_min_position: f64,
    /// 标签之后寻找题号重启的范围
    pub track_restart_window: usize,
    /// 标签出现次数达到此值时视为页眉
    pub track_header_repeat_limit: usize,
    /// 选组时认为"有把握"的最小词重叠
    pub track_min_similarity: f64,

    /// 纵向量化步长
    pub grid_row_quantum: f32,
    /// 表头行最少题号数
    pub grid_min_header_count: usize,
    /// 字母匹配列中心的容差（列宽比例）
    pub grid_column_tolerance: f32,
    /// 表头下方区域高度（表头字高的倍数）
    pub grid_section_height_factor: f32,
    /// 每题预期的正确字母数，用于识别"正确"样式
    pub grid_expected_correct_per_question: f32,
    /// 没有答案页标题时取最后几页的坐标
    pub key_tail_pages: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_question_id: 1,
            max_question_id: 30,
            expected_question_count: None,
            min_text_chars: 100,
            statement_max_gap: 2,
            option_search_window: 4000,
            max_option_gap: 800,
            last_option_lookahead: 500,
            last_option_fallback: 300,
            backward_window: 2500,
            track_min_position: 0.25,
            track_restart_window: 800,
            track_header_repeat_limit: 15,
            track_min_similarity: 0.3,
            grid_row_quantum: 8.0,
            grid_min_header_count: 8,
            grid_column_tolerance: 0.5,
            grid_section_height_factor: 12.0,
            grid_expected_correct_per_question: 1.0,
            key_tail_pages: 2,
        }
    }
}

impl ExtractionConfig {
    /// 题号是否在有效范围内
    pub fn is_valid_id(&self, id: u32) -> bool {
        (self.min_question_id..=self.max_question_id).contains(&id)
    }

    /// 从 TOML 文件加载，缺失字段使用默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        toml::from_str(&content).map_err(|e| {
            AppError::File(FileError::TomlParseFailed {
                path: path.display().to_string(),
                source: e,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: ExtractionConfig = toml::from_str("max_option_gap = 600\ngrid_min_header_count = 6\n").unwrap();
        assert_eq!(cfg.max_option_gap, 600);
        assert_eq!(cfg.grid_min_header_count, 6);
        assert_eq!(cfg.option_search_window, 4000);
        assert_eq!(cfg.max_question_id, 30);
    }

    #[test]
    fn test_valid_id_range() {
        let cfg = ExtractionConfig::default();
        assert!(cfg.is_valid_id(1));
        assert!(cfg.is_valid_id(30));
        assert!(!cfg.is_valid_id(0));
        assert!(!cfg.is_valid_id(31));
    }

    #[test]
    fn test_split_list_trims_entries() {
        assert_eq!(split_list(" 2019-march, ,2020-october "), vec!["2019-march", "2020-october"]);
    }
}
