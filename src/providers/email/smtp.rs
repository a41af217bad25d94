//! SMTP sending via `lettre`.
//!
//! Used for mail-based unsubscribe directives and for the digest. Messages
//! are always sent from the account's own address with the account's
//! credential.

use std::time::Duration;

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::domain::Account;

/// Errors raised while building or sending a message.
#[derive(Debug, thiserror::Error)]
pub enum SmtpError {
    /// Sender or recipient is not a valid mailbox.
    #[error("invalid address {address}: {reason}")]
    InvalidAddress {
        /// The rejected address.
        address: String,
        /// Parser message.
        reason: String,
    },

    /// Message could not be assembled.
    #[error("failed to build message: {0}")]
    Build(String),

    /// Relay setup, connection, or delivery failed.
    #[error("SMTP send failed: {0}")]
    Send(String),
}

/// Sends plain-text messages through an account's SMTP server.
#[derive(Debug, Clone)]
pub struct SmtpSender {
    timeout: Duration,
}

impl SmtpSender {
    /// Creates a sender whose transport times out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Builds an RFC 5322 message from the account's address.
    pub fn build_message(
        account: &Account,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<Message, SmtpError> {
        let from: Mailbox = parse_mailbox(&account.address)?;
        let to: Mailbox = parse_mailbox(to)?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| SmtpError::Build(e.to_string()))
    }

    /// Sends a plain-text message. Returns the server's response text.
    pub async fn send(
        &self,
        account: &Account,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, SmtpError> {
        let message = Self::build_message(account, to, subject, body)?;

        let smtp_credentials = SmtpCredentials::new(
            account.address.clone(),
            account.credential.expose().to_string(),
        );

        let host = &account.servers.smtp_host;
        let builder = if account.servers.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|e| SmtpError::Send(format!("SMTP relay error: {}", e)))?;

        let mailer = builder
            .credentials(smtp_credentials)
            .port(account.servers.smtp_port)
            .timeout(Some(self.timeout))
            .build();

        let response = mailer
            .send(message)
            .await
            .map_err(|e| SmtpError::Send(e.to_string()))?;

        let reply = response.message().collect::<Vec<_>>().join(" ");
        tracing::debug!(account = %account.id, to = %to, "Message sent via SMTP");
        Ok(reply)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SmtpError> {
    address
        .trim()
        .parse()
        .map_err(|e: lettre::address::AddressError| SmtpError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}
