//! PDF 文本提取器 - 基础设施层
//!
//! 唯一调用外部 `pdftotext` / `pdftohtml` 进程的地方，只暴露"提取"能力

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ExtractError};
use crate::models::{Document, ExamId, WordBox};
use crate::utils::text::clean_raw_text;

static PAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<page number="(\d+)""#).expect("static regex"));
static TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<text top="(-?[\d.]+)" left="(-?[\d.]+)" width="([\d.]+)" height="([\d.]+)" font="(\d+)"[^>]*>(.*?)</text>"#,
    )
    .expect("static regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex"));

/// PDF 文本提取器
///
/// 职责：
/// - 持有外部工具路径
/// - 产出分页文本流与答案页的词坐标
/// - 不认识题目、答案
pub struct PdfTextExtractor {
    pdftotext_bin: String,
    pdftohtml_bin: String,
    key_tail_pages: usize,
}

impl PdfTextExtractor {
    /// 创建新的提取器
    pub fn new(config: &Config) -> Self {
        Self {
            pdftotext_bin: config.pdftotext_bin.clone(),
            pdftohtml_bin: config.pdftohtml_bin.clone(),
            key_tail_pages: config.extraction.key_tail_pages,
        }
    }

    /// 提取整份文档
    ///
    /// 文本提取失败是错误；坐标提取失败只降级为空坐标列表。
    pub async fn extract(&self, exam_id: ExamId, path: &Path) -> AppResult<Document> {
        let raw = self.extract_text(path).await?;
        let pages: Vec<String> = raw
            .split('\u{0c}')
            .map(clean_raw_text)
            .collect();
        let pages = trim_trailing_empty_page(pages);

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut document = Document::from_pages(exam_id, source, pages);
        document.designate_key_pages(self.key_tail_pages);

        match self.extract_word_boxes(path).await {
            Ok(boxes) => {
                let boxes: Vec<WordBox> = boxes
                    .into_iter()
                    .filter(|b| document.key_pages.contains(&b.page))
                    .collect();
                debug!("{}: 答案页 {:?}, {} 个词坐标", exam_id, document.key_pages, boxes.len());
                document.word_boxes = boxes;
            }
            Err(e) => warn!("⚠️ {}: 无法提取词坐标: {}", exam_id, e),
        }

        Ok(document)
    }

    /// 线性文本流（页之间以换页符分隔）
    pub async fn extract_text(&self, path: &Path) -> AppResult<String> {
        let output = self
            .run_tool(&self.pdftotext_bin, &["-layout", &path.to_string_lossy(), "-"])
            .await?;
        String::from_utf8(output).map_err(|_| {
            AppError::Extract(ExtractError::NotUtf8 {
                tool: self.pdftotext_bin.clone(),
            })
        })
    }

    /// 所有页的词坐标
    pub async fn extract_word_boxes(&self, path: &Path) -> AppResult<Vec<WordBox>> {
        let output = self
            .run_tool(
                &self.pdftohtml_bin,
                &["-xml", "-i", "-stdout", "-q", &path.to_string_lossy()],
            )
            .await?;
        let xml = String::from_utf8_lossy(&output);
        Ok(parse_pdftohtml_xml(&xml))
    }

    async fn run_tool(&self, tool: &str, args: &[&str]) -> AppResult<Vec<u8>> {
        let output = Command::new(tool).args(args).output().await.map_err(|e| {
            AppError::Extract(ExtractError::ToolUnavailable {
                tool: tool.to_string(),
                source: e,
            })
        })?;
        if !output.status.success() {
            return Err(AppError::tool_failed(
                tool,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }
        Ok(output.stdout)
    }
}

fn trim_trailing_empty_page(mut pages: Vec<String>) -> Vec<String> {
    while pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// 解析 `pdftohtml -xml` 输出
///
/// 一个 `<text>` 元素往往包含多个词，按字符位置等比估算每个词的横坐标。
/// 样式为字体编号，粗体时追加 `b`。
pub fn parse_pdftohtml_xml(xml: &str) -> Vec<WordBox> {
    let mut page_starts: Vec<(usize, u32)> = PAGE_RE
        .captures_iter(xml)
        .filter_map(|c| {
            let start = c.get(0)?.start();
            let number = c[1].parse().ok()?;
            Some((start, number))
        })
        .collect();
    page_starts.sort_by_key(|(start, _)| *start);

    let page_at = |offset: usize| -> u32 {
        page_starts
            .iter()
            .take_while(|(start, _)| *start <= offset)
            .last()
            .map(|(_, n)| *n)
            .unwrap_or(1)
    };

    let mut boxes = Vec::new();
    for caps in TEXT_RE.captures_iter(xml) {
        let Some(whole) = caps.get(0) else { continue };
        let parse = |i: usize| caps[i].parse::<f32>().unwrap_or(0.0);
        let (top, left, width, height) = (parse(1), parse(2), parse(3), parse(4));
        let inner = &caps[6];
        let bold = inner.contains("<b>");
        let style = if bold {
            format!("{}b", &caps[5])
        } else {
            caps[5].to_string()
        };
        let content = unescape_xml(&TAG_RE.replace_all(inner, ""));
        let total_chars = content.chars().count().max(1) as f32;
        let page = page_at(whole.start());

        let mut token = String::new();
        let mut token_start = 0usize;
        for (i, c) in content.chars().chain(std::iter::once(' ')).enumerate() {
            if c.is_whitespace() {
                if !token.is_empty() {
                    let n = token.chars().count();
                    let x0 = left + width * token_start as f32 / total_chars;
                    let x1 = left + width * (token_start + n) as f32 / total_chars;
                    boxes.push(WordBox {
                        page,
                        x0,
                        y0: top,
                        x1,
                        y1: top + height,
                        text: std::mem::take(&mut token),
                        style: style.clone(),
                    });
                }
            } else {
                if token.is_empty() {
                    token_start = i;
                }
                token.push(c);
            }
        }
    }
    boxes
}
