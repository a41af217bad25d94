//! Unsubscribe transport trait.

use async_trait::async_trait;

use crate::domain::Account;

/// Errors raised while executing a directive.
#[derive(Debug, thiserror::Error)]
pub enum DirectiveError {
    /// The HTTP request failed or returned an error status.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The request did not complete in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The unsubscribe message could not be sent.
    #[error("SMTP send failed: {0}")]
    Smtp(String),

    /// The recipient address is unusable.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Executes unsubscribe directives over the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UnsubscribeTransport: Send + Sync {
    /// Issues a GET to `url`. Returns the HTTP status code.
    async fn visit(&self, url: &str) -> Result<u16, DirectiveError>;

    /// Sends a plain-text message from the account's own address.
    async fn send_mail(
        &self,
        account: &Account,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DirectiveError>;
}
