//! 题目切分服务 - 业务能力层
//!
//! 把文本流按题号起始标记切成每题一段

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::models::QuestionType;
use crate::utils::text::line_spans;

/// 题型关键字（允许 `Aussagen kombination` 这类断开写法）
pub const TYPE_KEYWORD_PATTERN: &str =
    r"Einfachauswahl|Mehrfachauswahl(?:aufgabe)?|Aussage\s*n?\s*kombination";

static COMBINED_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*(\d{{1,2}})\s+({})", TYPE_KEYWORD_PATTERN)).expect("static regex")
});
static TYPE_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\s*({})", TYPE_KEYWORD_PATTERN)).expect("static regex"));
static NUMBER_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,2})\s*$").expect("static regex"));
static EXAM_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Lösungss?chlüssel|Institut Ehlert|^\s*Gesundheitsamt").expect("static regex")
});

/// 一个已确认的题目起始标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartMarker {
    pub id: u32,
    pub kind: QuestionType,
    /// 标记所在行的起始字节偏移
    pub offset: usize,
    /// 题型关键字之后的字节偏移
    pub body_start: usize,
}

/// 一道题在文本中的范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub id: u32,
    pub kind: QuestionType,
    pub start: usize,
    pub body_start: usize,
    pub end: usize,
}

impl Region {
    /// 题型关键字之后的正文
    pub fn body<'t>(&self, text: &'t str) -> &'t str {
        text.get(self.body_start..self.end).unwrap_or("")
    }
}

/// 切分结果
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    /// 全部已确认的起始标记（含重复题号）
    pub markers: Vec<StartMarker>,
    /// 每个题号一段，按出现顺序
    pub regions: Vec<Region>,
    /// 答案表标题或机构页脚的位置
    pub exam_end: Option<usize>,
}

/// 题目切分服务
///
/// 职责：
/// - 识别 `12 Einfachauswahl` 以及题号、题型分两行的写法
/// - 丢弃后面没有题型关键字的孤立数字（页码）
/// - 遇到答案表标题或机构页脚后停止
pub struct QuestionSegmenter<'a> {
    config: &'a ExtractionConfig,
}

impl<'a> QuestionSegmenter<'a> {
    pub fn new(config: &'a ExtractionConfig) -> Self {
        Self { config }
    }

    /// 扫描所有起始标记
    pub fn find_start_markers(&self, text: &str) -> (Vec<StartMarker>, Option<usize>) {
        let mut markers = Vec::new();
        let mut pending_number: Option<(u32, usize)> = None;

        for (offset, line) in line_spans(text) {
            if !markers.is_empty() && EXAM_END_RE.is_match(line) {
                return (markers, Some(offset));
            }
            if line.trim().is_empty() {
                continue;
            }

            if let Some(caps) = COMBINED_START_RE.captures(line) {
                pending_number = None;
                if let (Some(id), Some(kind), Some(keyword)) = (
                    caps[1].parse::<u32>().ok(),
                    QuestionType::from_keyword(&caps[2]),
                    caps.get(2),
                ) {
                    if self.config.is_valid_id(id) {
                        markers.push(StartMarker {
                            id,
                            kind,
                            offset,
                            body_start: offset + keyword.end(),
                        });
                    }
                }
                continue;
            }

            if let Some((id, number_offset)) = pending_number.take() {
                if let Some(caps) = TYPE_ONLY_RE.captures(line) {
                    if let (Some(kind), Some(keyword)) =
                        (QuestionType::from_keyword(&caps[1]), caps.get(1))
                    {
                        markers.push(StartMarker {
                            id,
                            kind,
                            offset: number_offset,
                            body_start: offset + keyword.end(),
                        });
                        continue;
                    }
                }
            }

            if let Some(caps) = NUMBER_ONLY_RE.captures(line) {
                pending_number = caps[1]
                    .parse::<u32>()
                    .ok()
                    .filter(|id| self.config.is_valid_id(*id))
                    .map(|id| (id, offset));
            }
        }

        (markers, None)
    }

    /// 切分文本
    ///
    /// 每段从一个标记延伸到下一个标记、结束标记或文本末尾。
    /// 同一题号出现多次时只保留第一段。
    pub fn segment(&self, text: &str) -> Segmentation {
        let (markers, exam_end) = self.find_start_markers(text);
        let limit = exam_end.unwrap_or(text.len());

        let mut seen = BTreeSet::new();
        let mut regions = Vec::new();
        for (i, marker) in markers.iter().enumerate() {
            let end = markers.get(i + 1).map(|m| m.offset).unwrap_or(limit);
            if !seen.insert(marker.id) {
                debug!("题号 {} 重复出现，忽略偏移 {} 处的段落", marker.id, marker.offset);
                continue;
            }
            regions.push(Region {
                id: marker.id,
                kind: marker.kind,
                start: marker.offset,
                body_start: marker.body_start.min(end),
                end,
            });
        }

        Segmentation {
            markers,
            regions,
            exam_end,
        }
    }
}
