//! Plain-text rendering of engine reports.

use std::fmt::Write;

use crate::domain::{CleanupReport, RunIssue, ScanResult, SkipReason, SuggestionRecord, Tier};
use crate::services::Applied;

/// Number of unknown senders listed in a scan summary.
const UNKNOWN_LISTED: usize = 25;

fn issue_line(out: &mut String, issue: &RunIssue) {
    let _ = match &issue.folder {
        Some(folder) => writeln!(
            out,
            "  ! {} / {}: {:?}: {}",
            issue.account, folder, issue.kind, issue.message
        ),
        None => writeln!(out, "  ! {}: {:?}: {}", issue.account, issue.kind, issue.message),
    };
}

pub fn render_scan(result: &ScanResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Scanned {} messages ({} without sender)",
        result.messages_scanned, result.discarded_messages
    );

    let _ = writeln!(out, "\nCorporate senders ({}):", result.corporate_senders.len());
    for sender in &result.corporate_senders {
        let _ = writeln!(out, "  {}", sender);
    }

    let _ = writeln!(out, "\nUnknown senders ({}):", result.unknown.len());
    for (sender, count) in result.top_unknown(UNKNOWN_LISTED) {
        let _ = writeln!(out, "  {:>5}  {}", count, sender);
        for subject in result.sample_subjects.get(sender).into_iter().flatten() {
            let _ = writeln!(out, "         - {}", subject);
        }
    }
    if result.unknown.len() > UNKNOWN_LISTED {
        let _ = writeln!(out, "  ... and {} more", result.unknown.len() - UNKNOWN_LISTED);
    }

    let _ = writeln!(out, "\nSkipped by tier:");
    for tier in Tier::ALL {
        let messages: u32 = result
            .skipped_by_tier
            .get(&tier)
            .map(|counts| counts.values().sum())
            .unwrap_or(0);
        let _ = writeln!(out, "  {:<10} {}", tier, messages);
    }

    if !result.issues.is_empty() {
        let _ = writeln!(out, "\nIssues ({}):", result.issues.len());
        for issue in &result.issues {
            issue_line(&mut out, issue);
        }
    }
    if result.cancelled {
        let _ = writeln!(out, "\nScan cancelled; results are partial.");
    }
    out
}

pub fn render_cleanup(report: &CleanupReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        let tier = outcome.tier.map(|t| t.to_string()).unwrap_or_else(|| "unclassified".into());
        match outcome.skipped {
            Some(SkipReason::Whitelisted) => {
                let _ = writeln!(out, "{} [{}]: skipped, whitelisted", outcome.sender, tier);
                continue;
            }
            Some(SkipReason::Cancelled) => {
                let _ = writeln!(out, "{} [{}]: skipped, cancelled", outcome.sender, tier);
                continue;
            }
            None => {}
        }
        let _ = writeln!(
            out,
            "{} [{}]: {} matched, {} deleted, directives {}/{} ok, {} malformed",
            outcome.sender,
            tier,
            outcome.messages_matched,
            outcome.messages_deleted,
            outcome.directives_succeeded,
            outcome.directives_attempted,
            outcome.malformed_directives
        );
        for issue in &outcome.issues {
            issue_line(&mut out, issue);
        }
    }

    for failure in &report.account_failures {
        let _ = writeln!(out, "Account {} failed: {}", failure.account, failure.message);
    }

    let oneoff: Vec<_> = report.oneoff_outcomes().map(|o| o.sender.as_str()).collect();
    if !oneoff.is_empty() {
        let _ = writeln!(
            out,
            "One-off senders stay in the safelist and will be cleaned again: {}",
            oneoff.join(", ")
        );
    }

    let _ = writeln!(out, "Deleted {} messages in total.", report.messages_deleted());
    if report.cancelled {
        let _ = writeln!(out, "Cleanup cancelled; remaining senders were not processed.");
    }
    out
}

pub fn render_applied(applied: &Applied) -> String {
    if applied.changed {
        format!("Added {} to {}\n", applied.key, applied.tier)
    } else {
        format!("{} is already in {}\n", applied.key, applied.tier)
    }
}

pub fn render_suggestions(records: &[SuggestionRecord]) -> String {
    if records.is_empty() {
        return "No suggestions for unknown senders.\n".to_string();
    }
    let mut out = String::new();
    for record in records {
        let tier = record
            .suggested_tier
            .map(|t| t.to_string())
            .unwrap_or_else(|| "(none)".into());
        let _ = writeln!(out, "{:<40} {:<10} {}", record.sender, tier, record.reason);
    }
    out
}
