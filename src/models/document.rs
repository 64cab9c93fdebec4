use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use super::exam_id::ExamId;

/// 同一文档中的平行卷组
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Track {
    A,
    B,
}

impl Track {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "A" | "a" => Some(Track::A),
            "B" | "b" => Some(Track::B),
            _ => None,
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::A => write!(f, "A"),
            Track::B => write!(f, "B"),
        }
    }
}

/// 选项标记写法：`A)` 或 `A.`
///
/// 每个文档只判定一次，然后传给所有需要的检测器。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerStyle {
    Paren,
    Period,
}

/// 页面上的一个词及其坐标
///
/// `style` 是文档内的呈现分组（字体编号、粗体等），
/// 具体取值只在同一文档内有意义。
#[derive(Debug, Clone, PartialEq)]
pub struct WordBox {
    pub page: u32,
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub text: String,
    pub style: String,
}

impl WordBox {
    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }
}

static KEY_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Lösungss?chlüssel|Lösungen").expect("static regex"));
static TRACK_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Gruppe\s*([AB])\b").expect("static regex"));

/// 文本中按出现顺序的卷组标签
fn line_tracks(text: &str) -> Vec<Track> {
    TRACK_LABEL_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).and_then(|m| Track::from_label(m.as_str())))
        .collect()
}

/// 一份源文档
#[derive(Debug, Clone)]
pub struct Document {
    pub exam_id: ExamId,
    /// 文件名（不含目录）
    pub source: String,
    /// 线性文本流，行以 `\n` 分隔
    pub text: String,
    /// 每页文本（页码从 1 开始，对应下标 + 1）
    pub pages: Vec<String>,
    /// 可能包含答案表的页
    pub key_pages: BTreeSet<u32>,
    /// 答案页的词坐标
    pub word_boxes: Vec<WordBox>,
    /// 检测到的卷组
    pub track: Option<Track>,
}

impl Document {
    pub fn new(exam_id: ExamId, source: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            exam_id,
            source: source.into(),
            pages: vec![text.clone()],
            text,
            key_pages: BTreeSet::new(),
            word_boxes: Vec::new(),
            track: None,
        }
    }

    /// 由分页文本构建，`text` 为各页按换行拼接
    pub fn from_pages(exam_id: ExamId, source: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            exam_id,
            source: source.into(),
            text: pages.join("\n"),
            pages,
            key_pages: BTreeSet::new(),
            word_boxes: Vec::new(),
            track: None,
        }
    }

    /// 标出答案页：带答案标题的页；没有时取最后 `tail_pages` 页
    pub fn designate_key_pages(&mut self, tail_pages: usize) {
        let mut key_pages: BTreeSet<u32> = self
            .pages
            .iter()
            .enumerate()
            .filter(|(_, text)| KEY_HEADER_RE.is_match(text))
            .map(|(i, _)| i as u32 + 1)
            .collect();
        if key_pages.is_empty() {
            let count = self.pages.len();
            key_pages = (count.saturating_sub(tail_pages)..count)
                .map(|i| i as u32 + 1)
                .collect();
        }
        self.key_pages = key_pages;
    }

    fn page_text(&self, page: u32) -> Option<&String> {
        self.pages.get(page.checked_sub(1)? as usize)
    }

    /// 页面上出现过的卷组标签
    pub fn page_tracks(&self, page: u32) -> BTreeSet<Track> {
        self.page_text(page)
            .map(|text| line_tracks(text).into_iter().collect())
            .unwrap_or_default()
    }

    /// 页面上唯一出现的卷组标签
    pub fn page_track(&self, page: u32) -> Option<Track> {
        let tracks = self.page_tracks(page);
        if tracks.len() == 1 {
            tracks.into_iter().next()
        } else {
            None
        }
    }

    /// 同一页同时印有两组答案表
    pub fn is_shared_key_page(&self, page: u32) -> bool {
        self.page_tracks(page).len() > 1
    }

    /// 答案页中属于选定卷组的文本
    ///
    /// 同页印有两组时按标签行切分：标签之前的行两组共用，
    /// 标签之后的行归属最近的标签。
    pub fn key_page_text(&self, page: u32, track: Option<Track>) -> String {
        let Some(text) = self.page_text(page) else {
            return String::new();
        };
        let Some(track) = track.filter(|_| self.is_shared_key_page(page)) else {
            return text.clone();
        };

        let mut current: Option<Track> = None;
        let mut kept: Vec<&str> = Vec::new();
        for line in text.lines() {
            let labels = line_tracks(line);
            if let Some(&last) = labels.last() {
                if labels.contains(&track) {
                    kept.push(line);
                } else if let Some(m) = KEY_HEADER_RE.find(line) {
                    kept.push(m.as_str());
                }
                current = Some(last);
                continue;
            }
            if current.is_none_or(|t| t == track) {
                kept.push(line);
            }
        }
        kept.join("\n")
    }

    /// 属于选定卷组的答案页；过滤后为空时保留全部答案页
    pub fn key_pages_for(&self, track: Option<Track>) -> Vec<u32> {
        let all: Vec<u32> = self.key_pages.iter().copied().collect();
        let Some(track) = track else {
            return all;
        };
        let filtered: Vec<u32> = all
            .iter()
            .copied()
            .filter(|&p| self.page_track(p).is_none_or(|t| t == track))
            .collect();
        if filtered.is_empty() {
            all
        } else {
            filtered
        }
    }

    /// 非空白字符数
    pub fn text_char_count(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }
}
