//! 选项块检测服务 - 业务能力层
//!
//! 不依赖题号标记，自下而上寻找完整的 A–E 选项块，
//! 在字段分类得不到 5 个选项时作为补充来源。

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::models::{MarkerStyle, OPTION_COUNT};
use crate::services::question_segmenter::StartMarker;
use crate::utils::text::{clean_field, floor_char_boundary, line_spans};

static PAREN_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-E])\)\s").expect("static regex"));
static PERIOD_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-E])\.\s").expect("static regex"));
static NEXT_QUESTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*\d{1,2}\s").expect("static regex"));
static BLANK_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n[ \t]*\n").expect("static regex"));
static NUMBER_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,2})\s*$").expect("static regex"));

#[derive(Debug, Clone, Copy)]
struct Marker {
    letter: usize,
    start: usize,
    end: usize,
}

/// 一个完整的选项块
#[derive(Debug, Clone, PartialEq)]
pub struct OptionBlock {
    /// `A` 标记的字节偏移
    pub start: usize,
    pub options: Vec<String>,
}

impl OptionBlock {
    pub fn text_len(&self) -> usize {
        self.options.iter().map(|o| o.chars().count()).sum()
    }
}

/// 选项块检测服务
///
/// 职责：
/// - 从每个 `A` 标记向后按顺序寻找 `B`–`E`
/// - 相邻标记间距过大的块被丢弃
/// - 向前寻找最近的题号，把块归到该题
pub struct OptionBlockFinder<'a> {
    config: &'a ExtractionConfig,
    style: MarkerStyle,
}

impl<'a> OptionBlockFinder<'a> {
    pub fn new(config: &'a ExtractionConfig, style: MarkerStyle) -> Self {
        Self { config, style }
    }

    fn markers(&self, text: &str) -> Vec<Marker> {
        let re = match self.style {
            MarkerStyle::Paren => &*PAREN_MARKER_RE,
            MarkerStyle::Period => &*PERIOD_MARKER_RE,
        };
        re.captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let letter = caps[1].chars().next()? as usize - 'A' as usize;
                // 标记后的空白不算入标记本身，换行留给选项文本
                Some(Marker {
                    letter,
                    start: whole.start(),
                    end: whole.start() + 2,
                })
            })
            .collect()
    }

    /// 找出所有完整的选项块
    pub fn find_blocks(&self, text: &str) -> Vec<OptionBlock> {
        let markers = self.markers(text);
        let mut blocks = Vec::new();

        for (i, a) in markers.iter().enumerate() {
            if a.letter != 0 {
                continue;
            }
            let window_end = a.start.saturating_add(self.config.option_search_window).min(text.len());

            let mut chain = vec![*a];
            for letter in 1..OPTION_COUNT {
                let current_end = chain.last().map(|m| m.end).unwrap_or(a.end);
                let next = markers[i + 1..]
                    .iter()
                    .find(|m| m.letter == letter && m.start >= current_end);
                match next {
                    Some(m) if m.end <= window_end => chain.push(*m),
                    _ => break,
                }
            }
            if chain.len() < OPTION_COUNT {
                continue;
            }
            if chain
                .windows(2)
                .any(|w| w[1].start - w[0].start > self.config.max_option_gap)
            {
                continue;
            }

            let mut options = Vec::with_capacity(OPTION_COUNT);
            for (k, marker) in chain.iter().enumerate() {
                let end = match chain.get(k + 1) {
                    Some(next) => next.start,
                    None => self.last_option_end(text, marker.end),
                };
                options.push(clean_field(text.get(marker.end..end).unwrap_or("")));
            }

            if options.iter().all(|o| !o.is_empty()) {
                blocks.push(OptionBlock {
                    start: a.start,
                    options,
                });
            }
        }

        blocks
    }

    /// 第五个选项的结尾：空行后接题号，其次是连续空行，否则截取固定长度
    fn last_option_end(&self, text: &str, from: usize) -> usize {
        let lookahead_end = floor_char_boundary(text, from + self.config.last_option_lookahead);
        let remaining = text.get(from..lookahead_end).unwrap_or("");

        if let Some(m) = NEXT_QUESTION_RE.find(remaining) {
            return from + m.start();
        }
        if let Some(m) = BLANK_PAIR_RE.find(remaining) {
            return from + m.start();
        }
        floor_char_boundary(text, from + self.config.last_option_fallback.min(remaining.len()))
    }

    /// 把选项块归到题号
    ///
    /// 优先取窗口内最近的已确认起始标记，没有时取最近的单独数字行。
    /// 同一题号有多个块时保留选项文字总长更长的那个。
    pub fn associate(
        &self,
        text: &str,
        blocks: Vec<OptionBlock>,
        markers: &[StartMarker],
    ) -> BTreeMap<u32, OptionBlock> {
        let mut by_id: BTreeMap<u32, OptionBlock> = BTreeMap::new();

        for block in blocks {
            let window_start = block.start.saturating_sub(self.config.backward_window);
            let id = markers
                .iter()
                .filter(|m| m.offset >= window_start && m.offset < block.start)
                .max_by_key(|m| m.offset)
                .map(|m| m.id)
                .or_else(|| self.standalone_number_before(text, window_start, block.start));

            let Some(id) = id else {
                debug!("偏移 {} 处的选项块找不到题号", block.start);
                continue;
            };

            match by_id.get(&id) {
                Some(existing) if existing.text_len() >= block.text_len() => {}
                _ => {
                    by_id.insert(id, block);
                }
            }
        }

        by_id
    }

    fn standalone_number_before(&self, text: &str, from: usize, to: usize) -> Option<u32> {
        let from = floor_char_boundary(text, from);
        let slice = text.get(from..to)?;
        line_spans(slice)
            .into_iter()
            .filter_map(|(_, line)| NUMBER_ONLY_RE.captures(line))
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .filter(|id| self.config.is_valid_id(*id))
            .last()
    }

    /// 检测并归属，返回题号 → 5 个选项
    pub fn find_options(&self, text: &str, markers: &[StartMarker]) -> BTreeMap<u32, Vec<String>> {
        let blocks = self.find_blocks(text);
        self.associate(text, blocks, markers)
            .into_iter()
            .map(|(id, block)| (id, block.options))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::question_segmenter::QuestionSegmenter;

    #[test]
    fn test_inline_block_is_found() {
        let cfg = ExtractionConfig::default();
        let finder = OptionBlockFinder::new(&cfg, MarkerStyle::Paren);
        let text = "4 Einfachauswahl\nFrage\nA) eins B) zwei C) drei\nD) vier\nE) fünf\n\n\n5 Einfachauswahl";
        let blocks = finder.find_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].options, vec!["eins", "zwei", "drei", "vier", "fünf"]);
    }

    #[test]
    fn test_block_with_large_gap_rejected() {
        let cfg = ExtractionConfig {
            max_option_gap: 20,
            ..ExtractionConfig::default()
        };
        let finder = OptionBlockFinder::new(&cfg, MarkerStyle::Paren);
        let filler = "x".repeat(50);
        let text = format!("A) a\nB) b\nC) {}\nD) d\nE) e\n", filler);
        assert!(finder.find_blocks(&text).is_empty());
    }

    #[test]
    fn test_association_prefers_longer_block() {
        let cfg = ExtractionConfig::default();
        let finder = OptionBlockFinder::new(&cfg, MarkerStyle::Paren);
        let text = "7 Einfachauswahl\nFrage\nA) a\nB) b\nC) c\nD) d\nE) e\n\n\nA) lang a\nB) lang b\nC) lang c\nD) lang d\nE) lang e\n";
        let (markers, _) = QuestionSegmenter::new(&cfg).find_start_markers(text);
        let options = finder.find_options(text, &markers);
        assert_eq!(options.len(), 1);
        assert_eq!(options[&7][0], "lang a");
    }

    #[test]
    fn test_standalone_number_fallback() {
        let cfg = ExtractionConfig::default();
        let finder = OptionBlockFinder::new(&cfg, MarkerStyle::Period);
        let text = "12\nWelche Frage?\nA. a\nB. b\nC. c\nD. d\nE. e\n";
        let options = finder.find_options(text, &[]);
        assert_eq!(options[&12], vec!["a", "b", "c", "d", "e"]);
    }
}
