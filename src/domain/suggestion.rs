//! Advisory classification suggestions.
//!
//! Suggestions are produced by an external generator and cached on disk.
//! They are read-only here and only take effect when an operator accepts
//! one, which routes it through the same path as a manual decision.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::{Sender, Tier};

/// One cached suggestion as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionEntry {
    /// Suggested tier name. May be missing or garbage.
    #[serde(default)]
    pub suggestion: Option<String>,
    /// Short reasoning from the generator.
    #[serde(default)]
    pub reason: String,
    /// When the suggestion was produced (ISO 8601).
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A suggestion bound to its sender, with its tier validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionRecord {
    /// The sender the suggestion is about.
    pub sender: Sender,
    /// Suggested tier, if it names one an operator may accept.
    pub suggested_tier: Option<Tier>,
    /// Reasoning text.
    pub reason: String,
    /// Parsed timestamp, when present and valid.
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl SuggestionRecord {
    /// Validates a raw cache entry.
    ///
    /// Only `whitelist`, `approved` and `oneoff` are acceptable suggestions;
    /// a domain-wide blacklist is never suggested per sender.
    pub fn from_entry(sender: Sender, entry: &SuggestionEntry) -> Self {
        let suggested_tier = entry
            .suggestion
            .as_deref()
            .and_then(|s| s.parse::<Tier>().ok())
            .filter(|tier| *tier != Tier::Blacklist);

        let timestamp = entry.timestamp.as_deref().and_then(parse_timestamp);

        Self {
            sender,
            suggested_tier,
            reason: entry.reason.clone(),
            timestamp,
        }
    }
}

/// Accepts RFC 3339 and offset-less timestamps, which are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}
