//! Generic tag lookup table, partitioned by `type`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeType {
    /// What a host wants from helpers.
    WantYou,
    /// What helpers can do or get out of it.
    CanDo,
}

impl CodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeType::WantYou => "want_you",
            CodeType::CanDo => "can_do",
        }
    }
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "want_you" => Ok(CodeType::WantYou),
            "can_do" => Ok(CodeType::CanDo),
            other => Err(format!("unknown code type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    pub id: i64,
    #[serde(rename = "type")]
    pub code_type: CodeType,
    pub name: String,
    pub sort_order: i64,
}

/// Seeded codes: `(id, type, name)`. Ids are stable because job posts store
/// them in JSON arrays.
pub const SEED_CODES: &[(i64, CodeType, &str)] = &[
    (1, CodeType::WantYou, "体力に自信のある方"),
    (2, CodeType::WantYou, "短時間でも歓迎"),
    (3, CodeType::WantYou, "週末に来られる方"),
    (4, CodeType::WantYou, "経験不問"),
    (5, CodeType::WantYou, "パソコンが得意な方"),
    (6, CodeType::WantYou, "運転できる方"),
    (7, CodeType::WantYou, "子どもが好きな方"),
    (8, CodeType::WantYou, "外国語を話せる方"),
    (101, CodeType::CanDo, "農業体験ができる"),
    (102, CodeType::CanDo, "地域の人と交流できる"),
    (103, CodeType::CanDo, "まかない付き"),
    (104, CodeType::CanDo, "謝礼あり"),
    (105, CodeType::CanDo, "スキルが身につく"),
    (106, CodeType::CanDo, "世界遺産に関われる"),
    (107, CodeType::CanDo, "交通費支給"),
];

/// Codes of `code_type` named by `ids`, in the order given. Unknown ids are
/// skipped.
pub fn resolve(codes: &[Code], ids: &[i64], code_type: CodeType) -> Vec<Code> {
    ids.iter()
        .filter_map(|id| {
            codes
                .iter()
                .find(|c| c.id == *id && c.code_type == code_type)
                .cloned()
        })
        .collect()
}
