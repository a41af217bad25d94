//! Account domain types.
//!
//! An [`Account`] is one mailbox the engine scans and cleans. It is built
//! once at startup from the settings file plus a resolved credential and is
//! never mutated afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::AccountId;

/// A mailbox account with everything needed to open IMAP and SMTP sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Identifier used in logs, reports and keychain lookups.
    pub id: AccountId,
    /// Login and sender address for this account.
    pub address: String,
    /// Password or app-specific password.
    pub credential: Credential,
    /// IMAP/SMTP endpoints.
    pub servers: ServerConfig,
}

impl Account {
    /// Creates an account from its parts.
    pub fn new(
        id: impl Into<AccountId>,
        address: impl Into<String>,
        credential: Credential,
        servers: ServerConfig,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            credential,
            servers,
        }
    }
}

/// IMAP/SMTP server endpoints for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IMAP server hostname.
    pub imap_host: String,
    /// IMAP server port (typically 993 for TLS).
    pub imap_port: u16,
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (typically 465 for TLS, 587 for STARTTLS).
    pub smtp_port: u16,
    /// Whether SMTP uses implicit TLS (true) or STARTTLS (false).
    pub use_tls: bool,
}

impl ServerConfig {
    /// Creates a configuration for a typical implicit-TLS setup.
    pub fn tls(imap_host: impl Into<String>, smtp_host: impl Into<String>) -> Self {
        Self {
            imap_host: imap_host.into(),
            imap_port: 993,
            smtp_host: smtp_host.into(),
            smtp_port: 465,
            use_tls: true,
        }
    }
}

/// Account secret. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the secret for handing to a protocol client.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}
