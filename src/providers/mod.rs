//! Provider implementations for external services.
//!
//! - [`email`] - IMAP sessions and SMTP sending
//! - [`unsubscribe`] - HTTP and mail-based unsubscribe execution

pub mod email;
pub mod unsubscribe;
