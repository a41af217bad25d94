//! Mailbox access.
//!
//! This module contains the [`MailboxConnector`] / [`MailboxSession`] traits
//! and their IMAP implementation, plus the SMTP sender used for mail-based
//! unsubscribe requests and digests.
//!
//! # Example
//!
//! ```ignore
//! use listsweep::providers::email::{HeaderField, ImapConnector, MailboxConnector};
//!
//! async fn count_old(connector: &ImapConnector, account: &Account, cutoff: NaiveDate) -> Result<usize> {
//!     let mut session = connector.connect(account).await?;
//!     session.select_folder("INBOX").await?;
//!     let uids = session.search_before(cutoff).await?;
//!     session.close().await?;
//!     Ok(uids.len())
//! }
//! ```

mod imap;
mod smtp;
mod traits;

pub use imap::{ImapConnector, ImapSession};
pub use smtp::{SmtpError, SmtpSender};
pub use traits::{
    HeaderField, MailboxConnector, MailboxSession, MessageHeaders, ProviderError, Result,
};
