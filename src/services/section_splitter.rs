//! 卷组拆分服务 - 业务能力层
//!
//! 同一文档里可能先后印有 A、B 两组试题，题号相同内容不同。
//! 这里识别真正的第二组起点（区别于每页重复的页眉），并选出要解析的那一组。

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::models::Track;
use crate::services::question_segmenter::TYPE_KEYWORD_PATTERN;
use crate::utils::text::{floor_char_boundary, word_overlap};

static GROUP_B_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Gruppe\s*B").expect("static regex"));
static RESTART_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b1\s+(?:{})|\n\s*1\s*\n", TYPE_KEYWORD_PATTERN)).expect("static regex")
});

/// 第二组的检测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackBoundary {
    /// 只有一组
    None,
    /// `Gruppe B` 是每页的页眉：整份文档就是 B 组
    HeaderOnly,
    /// 第二组从此字节偏移开始
    Split(usize),
}

/// 选组结果
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSelection {
    pub track: Option<Track>,
    /// 要解析的文本范围
    pub range: Range<usize>,
    /// 没有参考题或两组得分相同时为 false
    pub confident: bool,
    pub score_a: f64,
    pub score_b: f64,
}

/// 卷组拆分服务
///
/// 职责：
/// - 判断 `Gruppe B` 是页眉还是真正的分组起点
/// - 按开头两题与参考题干的词重叠选组
pub struct SectionSplitter<'a> {
    config: &'a ExtractionConfig,
}

impl<'a> SectionSplitter<'a> {
    pub fn new(config: &'a ExtractionConfig) -> Self {
        Self { config }
    }

    /// 寻找第二组的起点
    ///
    /// 标签须位于文档靠后位置，且其后不远处题号从 1 重新开始；
    /// 只提到 `Gruppe B` 的说明文字不算分组。
    pub fn find_boundary(&self, text: &str) -> TrackBoundary {
        let labels: Vec<usize> = GROUP_B_RE.find_iter(text).map(|m| m.start()).collect();
        if labels.is_empty() {
            return TrackBoundary::None;
        }
        if labels.len() >= self.config.track_header_repeat_limit {
            debug!("Gruppe B 出现 {} 次，视为页眉", labels.len());
            return TrackBoundary::HeaderOnly;
        }

        let min_position = (text.len() as f64 * self.config.track_min_position) as usize;
        for &start in labels.iter().filter(|&&s| s > min_position) {
            let nearby_end = floor_char_boundary(text, start + self.config.track_restart_window);
            if RESTART_RE.is_match(&text[start..nearby_end]) {
                return TrackBoundary::Split(start);
            }
        }

        TrackBoundary::None
    }

    /// 选组
    ///
    /// `openings` 给出一段文本的开头两题题干；`reference` 是目标考试已知的开头两题。
    pub fn select<F>(&self, text: &str, reference: &[&str], openings: F) -> TrackSelection
    where
        F: Fn(&str) -> Vec<String>,
    {
        let boundary = match self.find_boundary(text) {
            TrackBoundary::None => {
                return TrackSelection {
                    track: None,
                    range: 0..text.len(),
                    confident: true,
                    score_a: 0.0,
                    score_b: 0.0,
                }
            }
            TrackBoundary::HeaderOnly => {
                return TrackSelection {
                    track: Some(Track::B),
                    range: 0..text.len(),
                    confident: true,
                    score_a: 0.0,
                    score_b: 0.0,
                }
            }
            TrackBoundary::Split(at) => at,
        };

        let score = |part: &str| -> f64 {
            let found = openings(part);
            reference
                .iter()
                .map(|r| {
                    found
                        .iter()
                        .map(|f| word_overlap(r, f))
                        .fold(0.0_f64, f64::max)
                })
                .sum()
        };
        let score_a = score(&text[..boundary]);
        let score_b = score(&text[boundary..]);
        debug!("选组得分: A={:.2} B={:.2}", score_a, score_b);

        let threshold = self.config.track_min_similarity;
        let choose_b = score_b > score_a && score_b >= threshold;
        let confident = !reference.is_empty() && score_a != score_b && score_a.max(score_b) >= threshold;

        TrackSelection {
            track: Some(if choose_b { Track::B } else { Track::A }),
            range: if choose_b { boundary..text.len() } else { 0..boundary },
            confident,
            score_a,
            score_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_track_document() -> String {
        let mut text = String::from("Heilpraktikerüberprüfung Gruppe A\n");
        text.push_str("1 Einfachauswahl\nWelche Aussage zur Demenz trifft zu?\nA) a\nB) b\nC) c\nD) d\nE) e\n");
        text.push_str("2 Einfachauswahl\nWas kennzeichnet eine Manie?\nA) a\nB) b\nC) c\nD) d\nE) e\n");
        text.push_str(&"Fülltext\n".repeat(40));
        text.push_str("Gruppe B\n");
        text.push_str("1 Einfachauswahl\nWelche Aussage zur Schizophrenie trifft zu?\nA) a\nB) b\nC) c\nD) d\nE) e\n");
        text.push_str("2 Einfachauswahl\nWas gehört zur Anorexia nervosa?\nA) a\nB) b\nC) c\nD) d\nE) e\n");
        text
    }

    fn first_lines_after_markers(part: &str) -> Vec<String> {
        let lines: Vec<&str> = part.lines().collect();
        lines
            .windows(2)
            .filter(|w| w[0].ends_with("Einfachauswahl"))
            .map(|w| w[1].to_string())
            .take(2)
            .collect()
    }

    #[test]
    fn test_boundary_requires_restart() {
        let cfg = ExtractionConfig::default();
        let splitter = SectionSplitter::new(&cfg);
        let text = two_track_document();
        match splitter.find_boundary(&text) {
            TrackBoundary::Split(at) => assert!(text[at..].starts_with("Gruppe B")),
            other => panic!("unexpected boundary {:?}", other),
        }
    }

    #[test]
    fn test_selects_matching_second_track() {
        let cfg = ExtractionConfig::default();
        let splitter = SectionSplitter::new(&cfg);
        let text = two_track_document();
        let reference = [
            "Welche Aussage zur Schizophrenie trifft zu?",
            "Was gehört zur Anorexia nervosa?",
        ];
        let selection = splitter.select(&text, &reference, first_lines_after_markers);
        assert_eq!(selection.track, Some(Track::B));
        assert!(selection.confident);
        assert!(text[selection.range].contains("Anorexia"));
    }

    #[test]
    fn test_without_reference_defaults_to_first_track() {
        let cfg = ExtractionConfig::default();
        let splitter = SectionSplitter::new(&cfg);
        let text = two_track_document();
        let selection = splitter.select(&text, &[], first_lines_after_markers);
        assert_eq!(selection.track, Some(Track::A));
        assert!(!selection.confident);
        assert!(text[selection.range].contains("Demenz"));
    }

    #[test]
    fn test_repeated_label_is_page_header() {
        let cfg = ExtractionConfig::default();
        let splitter = SectionSplitter::new(&cfg);
        let text = "Gruppe B\n1 Einfachauswahl\nFrage\n".repeat(20);
        assert_eq!(splitter.find_boundary(&text), TrackBoundary::HeaderOnly);
        let selection = splitter.select(&text, &[], first_lines_after_markers);
        assert_eq!(selection.track, Some(Track::B));
        assert_eq!(selection.range, 0..text.len());
    }

    #[test]
    fn test_late_mention_without_restart_is_not_a_split() {
        let cfg = ExtractionConfig::default();
        let splitter = SectionSplitter::new(&cfg);
        let question = |id: u32| format!("{} Einfachauswahl\nFrage {}\nA) a\nB) b\nC) c\nD) d\nE) e\n", id, id);
        let mut text = String::new();
        text.push_str(&question(1));
        text.push_str(&question(2));
        text.push_str("Hinweis: die Gruppe B erhält andere Bögen\n");
        text.push_str(&question(3));
        text.push_str(&question(4));
        assert!(text.find("Gruppe B").unwrap() as f64 > text.len() as f64 * cfg.track_min_position);

        assert_eq!(splitter.find_boundary(&text), TrackBoundary::None);
        let selection = splitter.select(&text, &[], first_lines_after_markers);
        assert_eq!(selection.track, None);
        assert_eq!(selection.range, 0..text.len());
    }

    #[test]
    fn test_early_label_is_ignored() {
        let cfg = ExtractionConfig::default();
        let splitter = SectionSplitter::new(&cfg);
        let text = format!("Gruppe B\n1 Einfachauswahl\n{}", "Text\n".repeat(100));
        assert_eq!(splitter.find_boundary(&text), TrackBoundary::None);
    }
}
