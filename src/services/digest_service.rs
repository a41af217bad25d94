//! Digest of unknown senders.
//!
//! After a scan, mails the operator a plain-text summary of the senders
//! still waiting for a decision. Nothing is sent when there are none.

use chrono::NaiveDate;

use crate::config::DigestSettings;
use crate::domain::{Account, ScanResult};
use crate::providers::email::{SmtpError, SmtpSender};

/// A composed digest message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Composes and sends the unknown-sender digest.
pub struct DigestService {
    smtp: SmtpSender,
    account: Account,
    recipient: String,
    manage_url: Option<String>,
    top_senders: usize,
}

impl DigestService {
    /// Creates a digest service sending from `account`.
    ///
    /// The recipient defaults to the account's own address.
    pub fn new(smtp: SmtpSender, account: Account, settings: &DigestSettings) -> Self {
        let recipient = settings
            .recipient
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| account.address.clone());
        Self {
            smtp,
            account,
            recipient,
            manage_url: settings.manage_url.clone(),
            top_senders: settings.top_senders,
        }
    }

    /// Builds the digest, or `None` when no unknown senders remain.
    pub fn compose(&self, result: &ScanResult, date: NaiveDate) -> Option<DigestMessage> {
        if result.unknown.is_empty() {
            return None;
        }

        let count = result.unknown.len();
        let mut body = format!(
            "{} sender{} need{} review.\n\n",
            count,
            if count == 1 { "" } else { "s" },
            if count == 1 { "s" } else { "" },
        );

        for (sender, messages) in result.top_unknown(self.top_senders) {
            body.push_str(&format!("  {:>5}  {}\n", messages, sender));
            if let Some(subject) = result
                .sample_subjects
                .get(sender)
                .and_then(|s| s.first())
                .filter(|s| !s.is_empty())
            {
                body.push_str(&format!("         \"{}\"\n", subject));
            }
        }
        if count > self.top_senders {
            body.push_str(&format!("  ... and {} more\n", count - self.top_senders));
        }

        if let Some(url) = &self.manage_url {
            body.push_str(&format!("\nReview: {}\n", url));
        }

        Some(DigestMessage {
            to: self.recipient.clone(),
            subject: format!("Unknown senders: {} ({})", count, date.format("%Y-%m-%d")),
            body,
        })
    }

    /// Sends the digest. Returns `false` when there was nothing to send.
    pub async fn send(&self, result: &ScanResult, date: NaiveDate) -> Result<bool, SmtpError> {
        let Some(message) = self.compose(result, date) else {
            tracing::info!("No unknown senders, digest not sent");
            return Ok(false);
        };

        self.smtp
            .send(&self.account, &message.to, &message.subject, &message.body)
            .await?;
        tracing::info!(to = %message.to, senders = result.unknown.len(), "Digest sent");
        Ok(true)
    }
}
