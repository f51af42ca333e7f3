//! Data models for the harness.
//!
//! This module contains the entries that make up the master KML document,
//! the rule used to derive their stems, and the summary of a harness run.

use crate::error::{HarnessError, HarnessResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default extension length for generated rasters (`.tif`).
pub const DEFAULT_EXTENSION_LEN: usize = 3;

/// How the stem of an input name is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemRule {
    /// Strip a `.` followed by exactly `extension_len` characters.
    Fixed { extension_len: usize },
    /// Strip everything from the final `.` onward.
    LastDot,
}

impl Default for StemRule {
    fn default() -> Self {
        StemRule::Fixed {
            extension_len: DEFAULT_EXTENSION_LEN,
        }
    }
}

impl fmt::Display for StemRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StemRule::Fixed { extension_len } => write!(f, "fixed ({} chars)", extension_len),
            StemRule::LastDot => write!(f, "last-dot"),
        }
    }
}

impl StemRule {
    /// Derive the stem of `name`, rejecting names the rule cannot handle.
    pub fn stem<'a>(&self, name: &'a str) -> HarnessResult<&'a str> {
        if name.is_empty() {
            return Err(invalid(name, "name is empty"));
        }

        match *self {
            StemRule::Fixed { extension_len } => {
                if extension_len == 0 {
                    return Err(invalid(name, "extension length must be at least 1"));
                }

                let len = name.chars().count();
                // separator plus at least one stem character
                let min_len = match extension_len.checked_add(2) {
                    Some(min_len) => min_len,
                    None => {
                        return Err(invalid(
                            name,
                            format!("extension length {} is too large", extension_len),
                        ))
                    }
                };
                if len < min_len {
                    return Err(invalid(
                        name,
                        format!("expected at least {} characters", min_len),
                    ));
                }

                match name.char_indices().nth(len - extension_len - 1) {
                    Some((idx, '.')) => Ok(&name[..idx]),
                    _ => Err(invalid(
                        name,
                        format!("expected a .{} character extension", extension_len),
                    )),
                }
            }
            StemRule::LastDot => match name.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Ok(stem),
                _ => Err(invalid(name, "expected <stem>.<extension>")),
            },
        }
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> HarnessError {
    HarnessError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// One input file as it appears in the master document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationEntry {
    /// Full base file name, used as the display name.
    pub label: String,
    /// Label without extension; names both the subfolder and the descriptor.
    pub stem: String,
}

impl AggregationEntry {
    /// Build an entry from a base file name.
    pub fn from_name(name: &str, rule: StemRule) -> HarnessResult<Self> {
        let stem = rule.stem(name)?;
        Ok(Self {
            label: name.to_string(),
            stem: stem.to_string(),
        })
    }

    /// Relative path of the per-item descriptor, `<stem>/<stem>.kml`.
    pub fn href(&self) -> String {
        format!("{}/{}.kml", self.stem, self.stem)
    }
}

/// Build entries for every name, preserving order and duplicates.
pub fn entries_from_names<S: AsRef<str>>(
    names: &[S],
    rule: StemRule,
) -> HarnessResult<Vec<AggregationEntry>> {
    names
        .iter()
        .map(|name| AggregationEntry::from_name(name.as_ref(), rule))
        .collect()
}

/// Serializable view of an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    pub label: String,
    pub stem: String,
    pub href: String,
}

impl From<&AggregationEntry> for EntryRecord {
    fn from(entry: &AggregationEntry) -> Self {
        Self {
            label: entry.label.clone(),
            stem: entry.stem.clone(),
            href: entry.href(),
        }
    }
}

/// Outcome of one harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Directory the tools ran in.
    pub working_dir: PathBuf,
    /// Where the master document was written (None on dry runs).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_path: Option<PathBuf>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
    /// Whether the generator was invoked.
    pub generated: bool,
    /// Number of converter invocations.
    pub converted: usize,
    /// Entries in master document order.
    pub entries: Vec<EntryRecord>,
}
