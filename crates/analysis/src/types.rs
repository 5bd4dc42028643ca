//! Fixed-shape records shared by the cache, the coordinator and the analysis clients.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum::{Display, EnumString};

use crate::errors::ClientError;

/// Identity of an open document. Documents are keyed by path, so two buffers
/// backed by the same file share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().to_string_lossy().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// `(major, minor)` version of the analysis tool. Ordering is lexicographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ToolVersion {
    pub major: u32,
    pub minor: u32,
}

impl ToolVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ToolVersion {
    type Err = ClientError;

    /// Accepts `"6.0.1"`, `"5.1"` or `"radon 6.0.1"`; patch components are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ClientError::Malformed(format!("unrecognized version string: {s:?}"));

        let token = s
            .split_whitespace()
            .find(|part| part.starts_with(|c: char| c.is_ascii_digit()))
            .ok_or_else(malformed)?;

        let mut parts = token.split('.');
        let major = parts
            .next()
            .and_then(|part| part.parse().ok())
            .ok_or_else(malformed)?;
        let minor = parts
            .next()
            .map(|part| {
                part.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
            })
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(malformed)?;

        Ok(Self { major, minor })
    }
}

/// Letter grade assigned by the tool, `A` being the best.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
pub enum Rank {
    A,
    B,
    C,
    D,
    E,
    F,
}

/// Kind of code unit a complexity rating was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UnitType {
    Function,
    Method,
    Class,
}

/// Raw position reported by the tool: 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub line: u32,
    pub column: u32,
}

impl Locator {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// 0-based line and character offset within the current document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextPosition {
    pub line: u32,
    pub character: u32,
}

/// Half-open `[start, end)` range of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: TextPosition,
    pub end: TextPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub name: String,
    pub unit_type: UnitType,
    pub complexity: u32,
    pub rank: Rank,
    pub locator: Locator,
    /// `None` until the locator has been mapped onto the current text.
    pub resolved_range: Option<TextRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaintainabilityRecord {
    pub index: f64,
    pub rank: Rank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceStatsRecord {
    pub total_lines: u64,
    pub logical_lines: u64,
    pub source_lines: u64,
    pub single_line_comments: u64,
    pub multi_line_strings: u64,
    pub blank_lines: u64,
}

/// Latest known analysis of one document.
///
/// An entry with no ratings and no maintainability record is the stale
/// sentinel written on edits; it is distinct from having no entry at all.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentAnalysisState {
    pub ratings: Vec<RatingRecord>,
    pub maintainability: Option<MaintainabilityRecord>,
    pub stats: Option<SourceStatsRecord>,
}

impl DocumentAnalysisState {
    pub fn stale() -> Self {
        Self::default()
    }

    pub fn is_stale(&self) -> bool {
        self.ratings.is_empty() && self.maintainability.is_none()
    }
}

/// Refresh state of a tracked document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum DocumentPhase {
    Unanalyzed,
    Refreshing,
    Ready,
    Stale,
    Errored,
}
