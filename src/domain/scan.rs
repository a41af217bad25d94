//! Scan results.
//!
//! A [`ScanResult`] is rebuilt on every scan and never persisted. All maps
//! are ordered so two scans over the same mailbox and safelist serialize
//! identically.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{AccountId, Sender, Tier};

/// Something a run skipped instead of aborting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIssue {
    /// Account the failure happened on.
    pub account: AccountId,
    /// Folder, when the failure was folder-scoped.
    pub folder: Option<String>,
    /// Error category.
    pub kind: IssueKind,
    /// Human-readable detail.
    pub message: String,
}

/// Category of a [`RunIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Login rejected; the account's pass was abandoned.
    Authentication,
    /// Network, TLS or timeout failure.
    Connection,
    /// Folder could not be selected.
    FolderNotFound,
    /// Server returned something unexpected.
    Protocol,
    /// A header could not be parsed.
    Parse,
    /// An unsubscribe directive failed.
    Directive,
}

impl IssueKind {
    /// Whether the issue stopped a whole account.
    pub fn is_account_fatal(&self) -> bool {
        matches!(self, IssueKind::Authentication | IssueKind::Connection)
    }
}

impl RunIssue {
    /// Creates an account-scoped issue.
    pub fn account(account: &AccountId, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            account: account.clone(),
            folder: None,
            kind,
            message: message.into(),
        }
    }

    /// Creates a folder-scoped issue.
    pub fn folder(
        account: &AccountId,
        folder: &str,
        kind: IssueKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            account: account.clone(),
            folder: Some(folder.to_string()),
            kind,
            message: message.into(),
        }
    }
}

/// Output of one scan across all accounts and folders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Senders already classified for cleanup, sorted and deduplicated.
    pub corporate_senders: BTreeSet<Sender>,
    /// Unclassified senders and their message counts.
    pub unknown: BTreeMap<Sender, u32>,
    /// Per-tier message counts for classified senders (whitelist included).
    pub skipped_by_tier: BTreeMap<Tier, BTreeMap<Sender, u32>>,
    /// Up to the configured number of subjects per unknown sender.
    pub sample_subjects: BTreeMap<Sender, Vec<String>>,
    /// Messages dropped because their `From` had no usable address.
    pub discarded_messages: u32,
    /// Messages examined.
    pub messages_scanned: u32,
    /// Failures that were isolated and skipped.
    pub issues: Vec<RunIssue>,
    /// Whether the scan stopped early on request.
    pub cancelled: bool,
}

impl ScanResult {
    /// Records a message from an unknown sender.
    pub fn record_unknown(&mut self, sender: &Sender, subject: Option<&str>, sample_cap: usize) {
        *self.unknown.entry(sender.clone()).or_insert(0) += 1;

        let samples = self.sample_subjects.entry(sender.clone()).or_default();
        if samples.len() < sample_cap {
            samples.push(subject.unwrap_or_default().to_string());
        }
    }

    /// Records a message from a classified sender.
    pub fn record_classified(&mut self, sender: &Sender, tier: Tier) {
        *self
            .skipped_by_tier
            .entry(tier)
            .or_default()
            .entry(sender.clone())
            .or_insert(0) += 1;

        if tier.is_actionable() {
            self.corporate_senders.insert(sender.clone());
        }
    }

    /// Folds another partial result into this one.
    ///
    /// Sample lists are appended in order and re-capped, so merging
    /// per-account partials in account order gives the same result as a
    /// sequential scan.
    pub fn merge(&mut self, other: ScanResult, sample_cap: usize) {
        self.corporate_senders.extend(other.corporate_senders);

        for (sender, count) in other.unknown {
            *self.unknown.entry(sender).or_insert(0) += count;
        }

        for (tier, counts) in other.skipped_by_tier {
            let target = self.skipped_by_tier.entry(tier).or_default();
            for (sender, count) in counts {
                *target.entry(sender).or_insert(0) += count;
            }
        }

        for (sender, subjects) in other.sample_subjects {
            let samples = self.sample_subjects.entry(sender).or_default();
            let room = sample_cap.saturating_sub(samples.len());
            samples.extend(subjects.into_iter().take(room));
        }

        self.discarded_messages += other.discarded_messages;
        self.messages_scanned += other.messages_scanned;
        self.issues.extend(other.issues);
        self.cancelled |= other.cancelled;
    }

    /// Unknown senders ordered by descending message count, then address.
    pub fn top_unknown(&self, n: usize) -> Vec<(&Sender, u32)> {
        let mut ranked: Vec<_> = self.unknown.iter().map(|(s, c)| (s, *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sender(s: &str) -> Sender {
        Sender::parse(s).unwrap()
    }

    #[test]
    fn record_unknown_caps_samples() {
        let mut result = ScanResult::default();
        let s = sender("news@shop.example");
        for i in 0..7 {
            result.record_unknown(&s, Some(&format!("Deal {}", i)), 5);
        }

        assert_eq!(result.unknown[&s], 7);
        assert_eq!(result.sample_subjects[&s].len(), 5);
        assert_eq!(result.sample_subjects[&s][0], "Deal 0");
    }

    #[test]
    fn record_classified_only_adds_actionable_to_corporate() {
        let mut result = ScanResult::default();
        result.record_classified(&sender("mom@family.example"), Tier::Whitelist);
        result.record_classified(&sender("news@shop.example"), Tier::Approved);
        result.record_classified(&sender("news@shop.example"), Tier::Approved);

        assert_eq!(
            result.corporate_senders.iter().collect::<Vec<_>>(),
            vec![&sender("news@shop.example")]
        );
        assert_eq!(
            result.skipped_by_tier[&Tier::Approved][&sender("news@shop.example")],
            2
        );
        assert_eq!(
            result.skipped_by_tier[&Tier::Whitelist][&sender("mom@family.example")],
            1
        );
    }

    #[test]
    fn merge_matches_sequential_recording() {
        let s = sender("news@shop.example");

        let mut sequential = ScanResult::default();
        for subject in ["a", "b", "c", "d"] {
            sequential.record_unknown(&s, Some(subject), 3);
        }

        let mut first = ScanResult::default();
        first.record_unknown(&s, Some("a"), 3);
        first.record_unknown(&s, Some("b"), 3);
        let mut second = ScanResult::default();
        second.record_unknown(&s, Some("c"), 3);
        second.record_unknown(&s, Some("d"), 3);

        let mut merged = ScanResult::default();
        merged.merge(first, 3);
        merged.merge(second, 3);

        assert_eq!(merged, sequential);
    }

    #[test]
    fn top_unknown_orders_by_count_then_address() {
        let mut result = ScanResult::default();
        for _ in 0..2 {
            result.record_unknown(&sender("b@x.example"), None, 5);
            result.record_unknown(&sender("a@x.example"), None, 5);
        }
        result.record_unknown(&sender("c@x.example"), None, 5);

        let top: Vec<_> = result
            .top_unknown(2)
            .into_iter()
            .map(|(s, c)| (s.as_str().to_string(), c))
            .collect();
        assert_eq!(
            top,
            vec![("a@x.example".to_string(), 2), ("b@x.example".to_string(), 2)]
        );
    }
}
