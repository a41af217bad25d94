//! Core identifier types for domain entities.
//!
//! These newtype wrappers provide type safety for identifiers,
//! preventing accidental mixing of account names and message UIDs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a configured mailbox account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// IMAP UID of a message within the currently selected folder.
///
/// UIDs are only meaningful together with the folder they were returned
/// for; they are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageUid(pub u32);

impl fmt::Display for MessageUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for MessageUid {
    fn from(uid: u32) -> Self {
        Self(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_display() {
        let id = AccountId("gmail".to_string());
        assert_eq!(id.to_string(), "gmail");
    }

    #[test]
    fn account_id_from_str_and_string() {
        assert_eq!(AccountId::from("yahoo"), AccountId::from("yahoo".to_string()));
    }

    #[test]
    fn message_uid_ordering() {
        let mut uids = vec![MessageUid(9), MessageUid(2), MessageUid(5)];
        uids.sort();
        assert_eq!(uids, vec![MessageUid(2), MessageUid(5), MessageUid(9)]);
        assert_eq!(MessageUid::from(7).to_string(), "7");
    }
}
