//! Mailbox connector traits.
//!
//! This module defines the [`MailboxConnector`] and [`MailboxSession`] traits
//! the scanner and dispatcher work against. A connector opens one
//! authenticated session per account; a session runs header-level commands
//! against one selected folder at a time.

use async_trait::async_trait;
use chrono::NaiveDate;
use mail_parser::{HeaderName, MessageParser};

use crate::domain::{Account, IssueKind, MessageUid, Sender};

/// Result type alias for mailbox operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur during mailbox operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or TLS error.
    #[error("connection error: {0}")]
    Connection(String),

    /// A command did not complete in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The folder does not exist or cannot be selected.
    #[error("folder not found: {0}")]
    FolderNotFound(String),

    /// The server answered with something unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid request or parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Report category for this error.
    pub fn issue_kind(&self) -> IssueKind {
        match self {
            ProviderError::Authentication(_) => IssueKind::Authentication,
            ProviderError::Connection(_) | ProviderError::Timeout(_) => IssueKind::Connection,
            ProviderError::FolderNotFound(_) => IssueKind::FolderNotFound,
            ProviderError::Protocol(_) | ProviderError::InvalidRequest(_) => IssueKind::Protocol,
        }
    }
}

/// Header fields a session can be asked to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    /// `From`
    From,
    /// `Subject`
    Subject,
    /// `List-Unsubscribe`
    ListUnsubscribe,
}

impl HeaderField {
    /// Field name as used in an IMAP `HEADER.FIELDS` list.
    pub fn imap_name(&self) -> &'static str {
        match self {
            HeaderField::From => "FROM",
            HeaderField::Subject => "SUBJECT",
            HeaderField::ListUnsubscribe => "LIST-UNSUBSCRIBE",
        }
    }
}

/// Decoded header values for one message. Fields not requested are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeaders {
    /// Bare address from `From`, display name dropped.
    pub from: Option<String>,
    /// Decoded `Subject`.
    pub subject: Option<String>,
    /// Raw `List-Unsubscribe` value.
    pub list_unsubscribe: Option<String>,
}

impl MessageHeaders {
    /// Parses a raw RFC 5322 header block.
    ///
    /// Returns `None` when the block cannot be parsed at all.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let message = MessageParser::default().parse(raw)?;

        let from = message
            .from()
            .and_then(|addr| addr.as_list())
            .and_then(|list| list.first())
            .and_then(|addr| addr.address())
            .map(|s| s.to_string());

        let subject = message.subject().map(|s| s.to_string());

        let list_unsubscribe = message
            .header_raw(HeaderName::ListUnsubscribe)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Some(Self {
            from,
            subject,
            list_unsubscribe,
        })
    }

    /// Normalized sender, if `From` carried an address.
    pub fn sender(&self) -> Option<Sender> {
        self.from.as_deref().and_then(Sender::parse)
    }
}

/// Opens authenticated sessions.
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    /// Logs in to the account's IMAP server.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Authentication`] on bad credentials and
    /// [`ProviderError::Connection`] or [`ProviderError::Timeout`] on
    /// network or TLS failure.
    async fn connect(&self, account: &Account) -> Result<Box<dyn MailboxSession>>;
}

/// An authenticated session. All commands run sequentially.
#[async_trait]
pub trait MailboxSession: Send {
    /// Selects a folder for the following commands.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::FolderNotFound`] when the folder cannot be
    /// selected; callers skip the folder and carry on.
    async fn select_folder(&mut self, folder: &str) -> Result<()>;

    /// UIDs of messages dated strictly before `date`, ascending.
    ///
    /// Uses the server's date-only `BEFORE` semantics.
    async fn search_before(&mut self, date: NaiveDate) -> Result<Vec<MessageUid>>;

    /// UIDs of messages whose `From` contains `sender`, ascending.
    async fn search_from(&mut self, sender: &str) -> Result<Vec<MessageUid>>;

    /// Fetches only the requested header fields, never bodies.
    ///
    /// Messages whose headers cannot be parsed are returned with empty
    /// [`MessageHeaders`].
    async fn fetch_headers(
        &mut self,
        uids: &[MessageUid],
        fields: &[HeaderField],
    ) -> Result<Vec<(MessageUid, MessageHeaders)>>;

    /// Flags messages `\Deleted`.
    async fn mark_deleted(&mut self, uids: &[MessageUid]) -> Result<()>;

    /// Permanently removes flagged messages from the selected folder.
    async fn expunge(&mut self) -> Result<()>;

    /// Logs out.
    async fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_header_block() {
        let raw = b"From: \"Shop News\" <News@Shop.Example>\r\n\
Subject: =?utf-8?q?Big_sale?=\r\n\
List-Unsubscribe: <https://x.example/u?id=1>,\r\n <mailto:off@x.example>\r\n\r\n";

        let headers = MessageHeaders::parse(raw).unwrap();
        assert_eq!(headers.from.as_deref(), Some("News@Shop.Example"));
        assert_eq!(headers.subject.as_deref(), Some("Big sale"));
        let unsub = headers.list_unsubscribe.unwrap();
        assert!(unsub.starts_with("<https://x.example/u?id=1>"));
        assert!(unsub.contains("mailto:off@x.example"));
    }

    #[test]
    fn sender_is_normalized() {
        let headers = MessageHeaders {
            from: Some("News@Shop.Example".to_string()),
            ..Default::default()
        };
        assert_eq!(headers.sender().unwrap().as_str(), "news@shop.example");
    }

    #[test]
    fn missing_from_has_no_sender() {
        let headers = MessageHeaders::parse(b"Subject: hello\r\n\r\n").unwrap();
        assert!(headers.from.is_none());
        assert!(headers.sender().is_none());
        assert!(headers.list_unsubscribe.is_none());
    }

    #[test]
    fn header_field_names() {
        assert_eq!(HeaderField::From.imap_name(), "FROM");
        assert_eq!(HeaderField::ListUnsubscribe.imap_name(), "LIST-UNSUBSCRIBE");
    }

    #[test]
    fn provider_error_display_and_kind() {
        let auth = ProviderError::Authentication("bad password".to_string());
        assert_eq!(auth.to_string(), "authentication failed: bad password");
        assert_eq!(auth.issue_kind(), IssueKind::Authentication);

        let timeout = ProviderError::Timeout("SELECT".to_string());
        assert_eq!(timeout.issue_kind(), IssueKind::Connection);

        let missing = ProviderError::FolderNotFound("Bulk".to_string());
        assert_eq!(missing.issue_kind(), IssueKind::FolderNotFound);
    }
}
