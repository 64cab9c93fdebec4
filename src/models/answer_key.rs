use std::collections::{BTreeMap, BTreeSet};

use super::question::OPTION_COUNT;

/// 答案来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnswerSource {
    /// 空间网格
    Grid,
    /// 线性列表（`12 A+C`）
    LinearList,
    /// 人工覆盖表
    Override,
}

/// 一条答案：题号 → 正确选项下标集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerKeyEntry {
    pub question_id: u32,
    pub indices: BTreeSet<usize>,
    pub source: AnswerSource,
}

/// 一份文档的答案表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerKey {
    entries: BTreeMap<u32, AnswerKeyEntry>,
}

impl AnswerKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入答案；空集合被忽略，已有条目被覆盖
    pub fn insert(&mut self, question_id: u32, indices: BTreeSet<usize>, source: AnswerSource) {
        if indices.is_empty() {
            return;
        }
        self.entries.insert(
            question_id,
            AnswerKeyEntry {
                question_id,
                indices,
                source,
            },
        );
    }

    /// 只填补缺失的题号
    pub fn fill_from(&mut self, other: &AnswerKey) {
        for (id, entry) in &other.entries {
            self.entries.entry(*id).or_insert_with(|| entry.clone());
        }
    }

    pub fn get(&self, question_id: u32) -> Option<&AnswerKeyEntry> {
        self.entries.get(&question_id)
    }

    pub fn indices(&self, question_id: u32) -> Option<Vec<usize>> {
        self.entries
            .get(&question_id)
            .map(|e| e.indices.iter().copied().collect())
    }

    /// 最大题号
    pub fn last_id(&self) -> Option<u32> {
        self.entries.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &AnswerKeyEntry> {
        self.entries.values()
    }
}

/// 字母转下标：`A` → 0 … `E` → 4
pub fn letter_index(letter: char) -> Option<usize> {
    let upper = letter.to_ascii_uppercase();
    if ('A'..='E').contains(&upper) {
        Some(upper as usize - 'A' as usize)
    } else {
        None
    }
}

/// 解析 `A+C`、`a, c`、`B` 这类答案写法
///
/// 出现 A–E 以外的字母时返回 `None`，避免把普通文字当成答案。
pub fn parse_letters(raw: &str) -> Option<BTreeSet<usize>> {
    let mut indices = BTreeSet::new();
    for part in raw.split(|c: char| c == '+' || c == ',' || c.is_whitespace()) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let mut chars = part.chars();
        let letter = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        indices.insert(letter_index(letter)?);
    }
    if indices.is_empty() || indices.len() > OPTION_COUNT {
        None
    } else {
        Some(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_letters_variants() {
        assert_eq!(parse_letters("A+C"), Some(BTreeSet::from([0, 2])));
        assert_eq!(parse_letters("b, d"), Some(BTreeSet::from([1, 3])));
        assert_eq!(parse_letters("E"), Some(BTreeSet::from([4])));
        assert_eq!(parse_letters("F"), None);
        assert_eq!(parse_letters("AB"), None);
        assert_eq!(parse_letters(""), None);
    }

    #[test]
    fn test_fill_from_keeps_existing_entries() {
        let mut grid = AnswerKey::new();
        grid.insert(1, BTreeSet::from([0]), AnswerSource::Grid);

        let mut linear = AnswerKey::new();
        linear.insert(1, BTreeSet::from([3]), AnswerSource::LinearList);
        linear.insert(2, BTreeSet::from([4]), AnswerSource::LinearList);

        grid.fill_from(&linear);
        assert_eq!(grid.indices(1), Some(vec![0]));
        assert_eq!(grid.indices(2), Some(vec![4]));
        assert_eq!(grid.get(2).map(|e| e.source), Some(AnswerSource::LinearList));
    }
}
