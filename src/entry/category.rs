use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::DecodeError;

/// Closed set of log categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Error,
    Warn,
    Event,
    Auth,
    Db,
    Alert,
}

impl Category {
    /// Every category, in canonical order
    pub const ALL: [Category; 6] = [
        Category::Error,
        Category::Warn,
        Category::Event,
        Category::Auth,
        Category::Db,
        Category::Alert,
    ];

    /// Canonical wire name, shared by every codec
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Error => "ERROR",
            Category::Warn => "WARN",
            Category::Event => "EVENT",
            Category::Auth => "AUTH",
            Category::Db => "DB",
            Category::Alert => "ALERT",
        }
    }

    /// Lowercase form used for file names and config keys
    pub fn file_stem(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    /// Whether entries of this category carry a call-site trace
    pub fn carries_trace(&self) -> bool {
        matches!(self, Category::Error | Category::Alert)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DecodeError::UnknownCategory(wanted.to_string()))
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
