//! Cleanup outcomes reported by the unsubscribe dispatcher.

use serde::{Deserialize, Serialize};

use super::{RunIssue, Sender, Tier};

/// What happened to one target sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderOutcome {
    /// The target sender.
    pub sender: Sender,
    /// Tier the sender matched when the run started.
    pub tier: Option<Tier>,
    /// Set when the sender was not processed at all.
    pub skipped: Option<SkipReason>,
    /// Messages the provider matched and the dispatcher kept.
    pub messages_matched: u32,
    /// Messages flagged deleted and expunged.
    pub messages_deleted: u32,
    /// Directives executed.
    pub directives_attempted: u32,
    /// Directives that completed without error.
    pub directives_succeeded: u32,
    /// Directive tokens that could not be parsed.
    pub malformed_directives: u32,
    /// Folder, header and directive failures for this sender.
    pub issues: Vec<RunIssue>,
}

impl SenderOutcome {
    /// Creates an empty outcome.
    pub fn new(sender: Sender, tier: Option<Tier>) -> Self {
        Self {
            sender,
            tier,
            skipped: None,
            messages_matched: 0,
            messages_deleted: 0,
            directives_attempted: 0,
            directives_succeeded: 0,
            malformed_directives: 0,
            issues: Vec::new(),
        }
    }

    /// Creates an outcome for a sender that was not processed.
    pub fn skipped(sender: Sender, tier: Option<Tier>, reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::new(sender, tier)
        }
    }

    /// Directives that failed.
    pub fn directives_failed(&self) -> u32 {
        self.directives_attempted - self.directives_succeeded
    }
}

/// Why a sender was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The sender is protected by the whitelist.
    Whitelisted,
    /// The run was cancelled before reaching this sender.
    Cancelled,
}

/// Output of one cleanup run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// One entry per requested sender, in request order.
    pub outcomes: Vec<SenderOutcome>,
    /// Accounts whose pass failed outright (login or connection).
    pub account_failures: Vec<RunIssue>,
    /// Whether the run stopped early on request.
    pub cancelled: bool,
}

impl CleanupReport {
    /// Total messages deleted across all senders.
    pub fn messages_deleted(&self) -> u32 {
        self.outcomes.iter().map(|o| o.messages_deleted).sum()
    }

    /// Outcomes for one-off senders, which stay in the safelist after cleanup.
    pub fn oneoff_outcomes(&self) -> impl Iterator<Item = &SenderOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.tier == Some(Tier::Oneoff) && o.skipped.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(s: &str) -> Sender {
        Sender::parse(s).unwrap()
    }

    #[test]
    fn totals_and_oneoff_filter() {
        let mut a = SenderOutcome::new(sender("a@x.example"), Some(Tier::Approved));
        a.messages_deleted = 3;
        let mut b = SenderOutcome::new(sender("b@x.example"), Some(Tier::Oneoff));
        b.messages_deleted = 2;
        let c = SenderOutcome::skipped(
            sender("c@x.example"),
            Some(Tier::Oneoff),
            SkipReason::Cancelled,
        );

        let report = CleanupReport {
            outcomes: vec![a, b, c],
            ..Default::default()
        };

        assert_eq!(report.messages_deleted(), 5);
        let oneoff: Vec<_> = report.oneoff_outcomes().map(|o| o.sender.as_str()).collect();
        assert_eq!(oneoff, vec!["b@x.example"]);
    }

    #[test]
    fn directives_failed_is_difference() {
        let mut outcome = SenderOutcome::new(sender("a@x.example"), None);
        outcome.directives_attempted = 4;
        outcome.directives_succeeded = 1;
        assert_eq!(outcome.directives_failed(), 3);
    }

    #[test]
    fn skip_reason_serialization() {
        assert_eq!(
            serde_json::to_string(&SkipReason::Whitelisted).unwrap(),
            "\"whitelisted\""
        );
    }
}
