//! 答案表提取服务 - 业务能力层
//!
//! 两种版式：
//! - 网格：题号行 + 字母行，正确字母用不同的样式（粗体、颜色）标出
//! - 线性：`12 A+C`、`1 b 2 a,c …`，或一行题号配一行字母

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::models::answer_key::{letter_index, parse_letters};
use crate::models::{AnswerKey, AnswerSource, Document, Track, WordBox};

static KEY_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Lösungss?chlüssel|Lösungen").expect("static regex"));
static STRICT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})\s*([A-E](?:\s*[,+]\s*[A-E])*)\s*$").expect("static regex")
});
static GLUED_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2})[:.)]?([A-E](?:[,+][A-E])*[,+]?)$").expect("static regex")
});
static LETTER_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[A-E](?:[,+][A-E])*[,+]?$").expect("static regex"));
static NUMBER_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})[:.)]?$").expect("static regex"));

/// 网格中的一列
#[derive(Debug, Clone, Copy)]
struct Column {
    id: u32,
    center_x: f32,
}

/// 网格中的一个表头行及其下方区域
#[derive(Debug, Clone)]
struct Header {
    page: u32,
    columns: Vec<Column>,
    col_width: f32,
    y_top: f32,
    y_bottom: f32,
}

/// 字母与列的对应
#[derive(Debug, Clone)]
struct Placement {
    column_key: (usize, usize),
    id: u32,
    letter: usize,
    style: String,
}

/// 答案表提取服务
///
/// 职责：
/// - 从词坐标中恢复网格答案
/// - 从文本中解析线性答案
/// - 网格结果优先，线性结果只填补空缺
pub struct AnswerKeyExtractor<'a> {
    config: &'a ExtractionConfig,
}

impl<'a> AnswerKeyExtractor<'a> {
    pub fn new(config: &'a ExtractionConfig) -> Self {
        Self { config }
    }

    /// 针对选定卷组提取答案
    pub fn extract(&self, document: &Document, track: Option<Track>) -> AnswerKey {
        let pages = document.key_pages_for(track);
        let (text, boxes): (String, Vec<WordBox>) = if pages.is_empty() {
            (document.text.clone(), document.word_boxes.clone())
        } else {
            let text = pages
                .iter()
                .map(|&p| document.key_page_text(p, track))
                .collect::<Vec<_>>()
                .join("\n");
            let boxes = document
                .word_boxes
                .iter()
                .filter(|b| pages.contains(&b.page))
                .cloned()
                .collect();
            (text, boxes)
        };

        let shared: BTreeSet<u32> = match track {
            Some(_) => pages.iter().copied().filter(|&p| document.is_shared_key_page(p)).collect(),
            None => BTreeSet::new(),
        };
        let mut key = self.grid_for_track(&boxes, track, &shared);
        let linear = self.extract_linear(&text);
        debug!("答案表: 网格 {} 条, 线性 {} 条", key.len(), linear.len());
        key.fill_from(&linear);
        key
    }

    // ========== 网格版式 ==========

    /// 从词坐标中恢复网格答案
    pub fn extract_grid(&self, boxes: &[WordBox]) -> AnswerKey {
        self.grid_for_track(boxes, None, &BTreeSet::new())
    }

    /// `shared` 中的页同时印有两组网格，只保留 `track` 的表头
    fn grid_for_track(&self, boxes: &[WordBox], track: Option<Track>, shared: &BTreeSet<u32>) -> AnswerKey {
        let mut by_page: BTreeMap<u32, Vec<&WordBox>> = BTreeMap::new();
        for b in boxes {
            by_page.entry(b.page).or_default().push(b);
        }

        let mut headers = Vec::new();
        let mut placements = Vec::new();
        for (page, page_boxes) in &by_page {
            let mut page_headers = self.find_headers(*page, page_boxes);
            if let Some(track) = track.filter(|_| shared.contains(page)) {
                page_headers = headers_for_track(page_headers, page_boxes, track);
            }
            for b in page_boxes {
                let Some(letter) = single_letter(&b.text) else { continue };
                if let Some(column_key) = self.place_letter(&page_headers, b) {
                    let (h, c) = column_key;
                    placements.push(Placement {
                        column_key: (headers.len() + h, c),
                        id: page_headers[h].columns[c].id,
                        letter,
                        style: b.style.clone(),
                    });
                }
            }
            headers.extend(page_headers);
        }

        let column_count: usize = headers.iter().map(|h| h.columns.len()).sum();
        let Some(correct) = self.correct_style(&placements, column_count) else {
            return AnswerKey::new();
        };

        let mut per_column: BTreeMap<(usize, usize), (u32, BTreeSet<usize>)> = BTreeMap::new();
        for p in placements.iter().filter(|p| correct.matches(&p.style)) {
            per_column
                .entry(p.column_key)
                .or_insert_with(|| (p.id, BTreeSet::new()))
                .1
                .insert(p.letter);
        }

        let mut key = AnswerKey::new();
        for (id, letters) in per_column.into_values() {
            if correct.single_letter_only && letters.len() != 1 {
                continue;
            }
            if key.get(id).is_none() {
                key.insert(id, letters, AnswerSource::Grid);
            } else {
                debug!("题 {} 在网格中重复出现，保留第一列", id);
            }
        }
        key
    }

    /// 一页上的表头行：按纵向位置聚类，至少含若干个有效题号
    fn find_headers(&self, page: u32, boxes: &[&WordBox]) -> Vec<Header> {
        let mut sorted: Vec<&WordBox> = boxes.to_vec();
        sorted.sort_by(|a, b| a.center_y().total_cmp(&b.center_y()));

        let mut rows: Vec<Vec<&WordBox>> = Vec::new();
        for b in sorted {
            match rows.last_mut() {
                Some(row) if (b.center_y() - row[0].center_y()).abs() <= self.config.grid_row_quantum => {
                    row.push(b)
                }
                _ => rows.push(vec![b]),
            }
        }

        let mut headers: Vec<Header> = Vec::new();
        for row in rows {
            let mut numbers: Vec<(&WordBox, u32)> = row
                .iter()
                .filter_map(|b| {
                    let id = b.text.trim().parse::<u32>().ok()?;
                    self.config.is_valid_id(id).then_some((*b, id))
                })
                .collect();
            if numbers.len() < self.config.grid_min_header_count {
                continue;
            }
            numbers.sort_by(|a, b| a.0.x0.total_cmp(&b.0.x0));

            let first = numbers[0].0;
            let last = numbers[numbers.len() - 1].0;
            let col_width = (last.x1 - first.x0) / numbers.len() as f32;
            let y_top = numbers.iter().map(|(b, _)| b.y0).fold(f32::MAX, f32::min);
            let y_bottom_header = numbers.iter().map(|(b, _)| b.y1).fold(f32::MIN, f32::max);
            let height = numbers.iter().map(|(b, _)| b.height()).fold(0.0, f32::max);

            headers.push(Header {
                page,
                columns: numbers
                    .iter()
                    .map(|(b, id)| Column {
                        id: *id,
                        center_x: b.center_x(),
                    })
                    .collect(),
                col_width,
                y_top,
                y_bottom: y_bottom_header + height * self.config.grid_section_height_factor,
            });
        }

        // 区域不越过下一个表头
        for i in 1..headers.len() {
            let next_top = headers[i].y_top;
            if headers[i - 1].y_bottom > next_top {
                headers[i - 1].y_bottom = next_top;
            }
        }
        headers
    }

    /// 字母落在哪个表头的哪一列
    fn place_letter(&self, headers: &[Header], b: &WordBox) -> Option<(usize, usize)> {
        let cy = b.center_y();
        let h = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.page == b.page && cy > h.y_top && cy <= h.y_bottom)
            .max_by(|x, y| x.1.y_top.total_cmp(&y.1.y_top))
            .map(|(i, _)| i)?;

        let header = &headers[h];
        let cx = b.center_x();
        let (c, column) = header
            .columns
            .iter()
            .enumerate()
            .min_by(|x, y| (x.1.center_x - cx).abs().total_cmp(&(y.1.center_x - cx).abs()))?;
        let tolerance = header.col_width * self.config.grid_column_tolerance;
        ((column.center_x - cx).abs() <= tolerance).then_some((h, c))
    }

    /// 找出代表"正确"的样式
    ///
    /// 出现次数最接近 列数 × 每题预期正确数 的样式胜出，平局取次数少的。
    /// 只有一种样式时，说明表里只印了正确字母，要求每列恰好一个。
    fn correct_style(&self, placements: &[Placement], column_count: usize) -> Option<CorrectStyle> {
        if placements.is_empty() || column_count == 0 {
            return None;
        }
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for p in placements {
            *counts.entry(p.style.as_str()).or_default() += 1;
        }

        if counts.len() == 1 {
            let style = counts.keys().next()?.to_string();
            return Some(CorrectStyle {
                style,
                single_letter_only: true,
            });
        }

        let expected = column_count as f32 * self.config.grid_expected_correct_per_question;
        let (style, _) = counts.iter().min_by(|a, b| {
            let da = (*a.1 as f32 - expected).abs();
            let db = (*b.1 as f32 - expected).abs();
            da.total_cmp(&db).then(a.1.cmp(b.1))
        })?;
        debug!("网格样式计数 {:?}，选定 {}", counts, style);
        Some(CorrectStyle {
            style: style.to_string(),
            single_letter_only: false,
        })
    }

    // ========== 线性版式 ==========

    /// 从文本中解析线性答案
    pub fn extract_linear(&self, text: &str) -> AnswerKey {
        let mut key = AnswerKey::new();
        let mut after_header = false;
        let mut number_rows: Vec<u32> = Vec::new();
        let mut letter_rows: Vec<usize> = Vec::new();

        for line in text.lines() {
            if KEY_HEADER_RE.is_match(line) {
                after_header = true;
            }

            if let Some(caps) = STRICT_LINE_RE.captures(line) {
                if let (Ok(id), Some(indices)) = (caps[1].parse::<u32>(), parse_letters(&caps[2])) {
                    if self.config.is_valid_id(id) && key.get(id).is_none() {
                        key.insert(id, indices, AnswerSource::LinearList);
                    }
                }
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() >= 5 && tokens.iter().all(|t| t.parse::<u32>().is_ok()) {
                number_rows.extend(tokens.iter().filter_map(|t| t.parse::<u32>().ok()));
                continue;
            }
            if tokens.len() >= 5 && tokens.iter().all(|t| single_letter(t).is_some()) {
                letter_rows.extend(tokens.iter().filter_map(|t| single_letter(t)));
                continue;
            }

            if after_header {
                for (id, indices) in self.parse_pairs(&tokens) {
                    if key.get(id).is_none() {
                        key.insert(id, indices, AnswerSource::LinearList);
                    }
                }
            }
        }

        if !number_rows.is_empty() && number_rows.len() == letter_rows.len() {
            for (id, letter) in number_rows.into_iter().zip(letter_rows) {
                if self.config.is_valid_id(id) && key.get(id).is_none() {
                    key.insert(id, BTreeSet::from([letter]), AnswerSource::LinearList);
                }
            }
        }

        key
    }

    /// 一行里的多个 `题号 字母` 对
    fn parse_pairs(&self, tokens: &[&str]) -> Vec<(u32, BTreeSet<usize>)> {
        let mut pairs = Vec::new();
        let mut current: Option<(u32, String)> = None;

        let flush = |current: &mut Option<(u32, String)>, pairs: &mut Vec<(u32, BTreeSet<usize>)>| {
            if let Some((id, letters)) = current.take() {
                if let Some(indices) = parse_letters(&letters) {
                    if self.config.is_valid_id(id) {
                        pairs.push((id, indices));
                    }
                }
            }
        };

        for token in tokens {
            if let Some(caps) = GLUED_PAIR_RE.captures(token) {
                flush(&mut current, &mut pairs);
                if let Ok(id) = caps[1].parse::<u32>() {
                    current = Some((id, caps[2].to_string()));
                }
            } else if let Some(caps) = NUMBER_TOKEN_RE.captures(token) {
                flush(&mut current, &mut pairs);
                if let Ok(id) = caps[1].parse::<u32>() {
                    current = Some((id, String::new()));
                }
            } else if LETTER_GROUP_RE.is_match(token) || *token == "+" || *token == "," {
                if let Some((_, letters)) = current.as_mut() {
                    letters.push(' ');
                    letters.push_str(token);
                }
            } else {
                flush(&mut current, &mut pairs);
            }
        }
        flush(&mut current, &mut pairs);
        pairs
    }
}

#[derive(Debug, Clone)]
struct CorrectStyle {
    style: String,
    single_letter_only: bool,
}

impl CorrectStyle {
    fn matches(&self, style: &str) -> bool {
        self.style == style
    }
}

/// 页面上 `Gruppe A/B` 标签的纵向位置，按 y 排序
fn track_labels(boxes: &[&WordBox]) -> Vec<(f32, Track)> {
    let mut sorted: Vec<&WordBox> = boxes.to_vec();
    sorted.sort_by(|a, b| a.center_y().total_cmp(&b.center_y()).then(a.x0.total_cmp(&b.x0)));

    let mut labels = Vec::new();
    for (i, b) in sorted.iter().enumerate() {
        let Some(rest) = b.text.trim().strip_prefix("Gruppe") else { continue };
        let label = if rest.is_empty() {
            sorted
                .get(i + 1)
                .filter(|next| (next.center_y() - b.center_y()).abs() <= b.height().max(1.0) / 2.0)
                .map(|next| next.text.as_str())
        } else {
            Some(rest)
        };
        if let Some(track) = label.and_then(|l| Track::from_label(l.trim_end_matches([':', '.', ')']))) {
            labels.push((b.y0, track));
        }
    }
    labels
}

/// 同页两组网格中属于 `track` 的表头
///
/// 有标签坐标时，表头归属其上方最近的标签，位于所有标签之上的表头两组共用；
/// 没有标签坐标时，题号重新开始的表头起算为第二组。
fn headers_for_track(headers: Vec<Header>, boxes: &[&WordBox], track: Track) -> Vec<Header> {
    let labels = track_labels(boxes);
    let assigned: Vec<Option<Track>> = if labels.is_empty() {
        let mut current = Track::A;
        let mut last_id = 0;
        headers
            .iter()
            .map(|h| {
                let first = h.columns.first().map_or(0, |c| c.id);
                if first <= last_id {
                    current = Track::B;
                }
                last_id = h.columns.last().map_or(last_id, |c| c.id);
                Some(current)
            })
            .collect()
    } else {
        headers
            .iter()
            .map(|h| {
                labels
                    .iter()
                    .filter(|(y, _)| *y <= h.y_top)
                    .last()
                    .map(|(_, t)| *t)
            })
            .collect()
    };

    headers
        .into_iter()
        .zip(assigned)
        .filter(|(_, t)| t.is_none_or(|t| t == track))
        .map(|(h, _)| h)
        .collect()
}

/// 单个大写字母 A–E
fn single_letter(text: &str) -> Option<usize> {
    let mut chars = text.trim().chars();
    let c = chars.next()?;
    if chars.next().is_some() || !c.is_ascii_uppercase() {
        return None;
    }
    letter_index(c)
}
