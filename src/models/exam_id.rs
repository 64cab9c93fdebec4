use phf::phf_map;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{AppError, ConfigError};

/// 考试场次
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Session {
    /// 三月场
    #[serde(alias = "march", alias = "Maerz")]
    March,
    /// 十月场
    #[serde(alias = "october", alias = "Oktober")]
    October,
}

/// 文件名、考试标识中出现的场次写法
static SESSION_TOKENS: phf::Map<&'static str, Session> = phf_map! {
    "maerz" => Session::March,
    "märz" => Session::March,
    "march" => Session::March,
    "oktober" => Session::October,
    "october" => Session::October,
};

impl Session {
    /// 考试标识中使用的英文小写写法
    pub fn slug(self) -> &'static str {
        match self {
            Session::March => "march",
            Session::October => "october",
        }
    }

    /// 文件名中使用的德语写法
    pub fn german_token(self) -> &'static str {
        match self {
            Session::March => "Maerz",
            Session::October => "Oktober",
        }
    }

    /// 文件名中可能出现的德语写法，首个为模板默认写法
    pub fn german_spellings(self) -> &'static [&'static str] {
        match self {
            Session::March => &["Maerz", "März"],
            Session::October => &["Oktober"],
        }
    }

    /// 从任意写法解析（不区分大小写）
    pub fn from_token(token: &str) -> Option<Self> {
        SESSION_TOKENS.get(token.trim().to_lowercase().as_str()).copied()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Session::March => write!(f, "March"),
            Session::October => write!(f, "October"),
        }
    }
}

static FILE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(maerz|märz|oktober)\D*?(\d{4})").expect("static regex"));

/// 考试标识：年份 + 场次，文本形式 `2019-march`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExamId {
    pub year: u16,
    pub session: Session,
}

impl ExamId {
    pub fn new(year: u16, session: Session) -> Self {
        Self { year, session }
    }

    /// 从文件名中识别考试标识，例如 `HPP_Pruefung_Oktober_2024_mit_Loesungen_A_B.pdf`
    pub fn from_file_name(name: &str) -> Option<Self> {
        let caps = FILE_NAME_RE.captures(name)?;
        let session = Session::from_token(&caps[1])?;
        let year = caps[2].parse().ok()?;
        Some(Self::new(year, session))
    }
}

impl fmt::Display for ExamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.session.slug())
    }
}

impl FromStr for ExamId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::Config(ConfigError::InvalidExamId(s.to_string()));
        let (year, session) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<u16>().map_err(|_| invalid())?;
        let session = Session::from_token(session).ok_or_else(invalid)?;
        Ok(Self::new(year, session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exam_id_round_trip_text() {
        let id: ExamId = "2019-march".parse().unwrap();
        assert_eq!(id, ExamId::new(2019, Session::March));
        assert_eq!(id.to_string(), "2019-march");
        assert!("2019".parse::<ExamId>().is_err());
        assert!("2019-june".parse::<ExamId>().is_err());
    }

    #[test]
    fn test_exam_id_from_file_names() {
        assert_eq!(
            ExamId::from_file_name("HPP_Pruefung_Oktober_2024_mit_Loesungen_A_B.pdf"),
            Some(ExamId::new(2024, Session::October))
        );
        assert_eq!(
            ExamId::from_file_name("Maerz-2016.pdf"),
            Some(ExamId::new(2016, Session::March))
        );
        assert_eq!(ExamId::from_file_name("notes.pdf"), None);
    }

    #[test]
    fn test_exam_ids_sort_chronologically() {
        let mut ids = vec![
            ExamId::new(2020, Session::March),
            ExamId::new(2019, Session::October),
            ExamId::new(2019, Session::March),
        ];
        ids.sort();
        assert_eq!(ids[0].to_string(), "2019-march");
        assert_eq!(ids[2].to_string(), "2020-march");
    }
}
