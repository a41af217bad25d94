//! Sender addresses.
//!
//! A [`Sender`] is the bare, lowercased address taken from a message's
//! `From` header. Display names never reach this type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized sender address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sender(String);

impl Sender {
    /// Normalizes a bare address. Returns `None` for blank input.
    ///
    /// Surrounding whitespace and angle brackets are stripped and the result
    /// is lowercased. An address without `@` is still a sender; it simply
    /// has an empty [`domain`](Self::domain).
    pub fn parse(address: &str) -> Option<Self> {
        let trimmed = address
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_lowercase()))
    }

    /// Returns the address.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the substring after the last `@`, or `""` when there is none.
    pub fn domain(&self) -> &str {
        domain_of(&self.0)
    }

    /// Consumes the sender, returning the address.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for Sender {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Domain part of an address, empty if the address has no `@`.
pub fn domain_of(address: &str) -> &str {
    match address.rsplit_once('@') {
        Some((_, domain)) => domain,
        None => "",
    }
}
