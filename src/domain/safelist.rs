//! Safelist domain types.
//!
//! The safelist is four independent sets that decide what happens to mail
//! from a sender: keep it ([`Tier::Whitelist`]), clean it up repeatedly
//! ([`Tier::Approved`]), clean it up once ([`Tier::Oneoff`]) or clean up
//! the whole domain ([`Tier::Blacklist`]).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Sender;

/// A classification bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Personal or important senders, never cleaned.
    Whitelist,
    /// Recurring bulk senders cleaned on every run.
    Approved,
    /// Senders approved for a single cleanup pass.
    Oneoff,
    /// Whole domains routed to cleanup.
    Blacklist,
}

impl Tier {
    /// All tiers, in precedence order.
    pub const ALL: [Tier; 4] = [Tier::Whitelist, Tier::Approved, Tier::Oneoff, Tier::Blacklist];

    /// Lowercase name used on disk and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Whitelist => "whitelist",
            Tier::Approved => "approved",
            Tier::Oneoff => "oneoff",
            Tier::Blacklist => "blacklist",
        }
    }

    /// Whether senders in this tier are candidates for cleanup.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Tier::Whitelist)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Error returned when parsing an unknown tier name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier: {0}")]
pub struct UnknownTier(pub String);

impl FromStr for Tier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whitelist" => Ok(Tier::Whitelist),
            "approved" => Ok(Tier::Approved),
            "oneoff" | "one-off" => Ok(Tier::Oneoff),
            "blacklist" => Ok(Tier::Blacklist),
            other => Err(UnknownTier(other.to_string())),
        }
    }
}

/// Whitelisted addresses and domains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whitelist {
    /// Exact sender addresses.
    pub emails: BTreeSet<String>,
    /// Whole domains.
    pub domains: BTreeSet<String>,
}

/// In-memory view of all four safelist tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafelistState {
    /// Never touched by cleanup.
    pub whitelist: Whitelist,
    /// Recurring cleanup.
    pub approved: BTreeSet<String>,
    /// Single cleanup.
    pub oneoff: BTreeSet<String>,
    /// Domains routed to cleanup.
    pub blacklist_domains: BTreeSet<String>,
}

/// Which tier rule a sender matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Address is in `whitelist.emails`.
    WhitelistedEmail,
    /// Domain is in `whitelist.domains`.
    WhitelistedDomain,
    /// Address is in `approved`.
    Approved,
    /// Address is in `oneoff`.
    Oneoff,
    /// Domain is in `blacklist_domains`.
    BlacklistedDomain,
    /// No tier matched.
    Unknown,
}

impl Classification {
    /// The tier this classification belongs to, if any.
    pub fn tier(&self) -> Option<Tier> {
        match self {
            Classification::WhitelistedEmail | Classification::WhitelistedDomain => {
                Some(Tier::Whitelist)
            }
            Classification::Approved => Some(Tier::Approved),
            Classification::Oneoff => Some(Tier::Oneoff),
            Classification::BlacklistedDomain => Some(Tier::Blacklist),
            Classification::Unknown => None,
        }
    }
}

impl SafelistState {
    /// Classifies a sender. First match wins, in the order
    /// whitelist-email, whitelist-domain, approved, oneoff, blacklist-domain.
    pub fn classify(&self, sender: &Sender) -> Classification {
        let address = sender.as_str();
        let domain = sender.domain();

        if self.whitelist.emails.contains(address) {
            Classification::WhitelistedEmail
        } else if !domain.is_empty() && self.whitelist.domains.contains(domain) {
            Classification::WhitelistedDomain
        } else if self.approved.contains(address) {
            Classification::Approved
        } else if self.oneoff.contains(address) {
            Classification::Oneoff
        } else if !domain.is_empty() && self.blacklist_domains.contains(domain) {
            Classification::BlacklistedDomain
        } else {
            Classification::Unknown
        }
    }

    /// Whether the sender is protected from cleanup.
    pub fn is_whitelisted(&self, sender: &Sender) -> bool {
        self.classify(sender).tier() == Some(Tier::Whitelist)
    }

    /// Total number of entries across all tiers.
    pub fn len(&self) -> usize {
        self.whitelist.emails.len()
            + self.whitelist.domains.len()
            + self.approved.len()
            + self.oneoff.len()
            + self.blacklist_domains.len()
    }

    /// Whether every tier is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(s: &str) -> Sender {
        Sender::parse(s).unwrap()
    }

    fn state() -> SafelistState {
        let mut state = SafelistState::default();
        state.whitelist.emails.insert("mom@family.example".into());
        state.whitelist.domains.insert("work.example".into());
        state.approved.insert("news@shop.example".into());
        state.oneoff.insert("survey@poll.example".into());
        state.blacklist_domains.insert("spam.example".into());
        state
    }

    #[test]
    fn classify_each_tier() {
        let state = state();
        assert_eq!(
            state.classify(&sender("mom@family.example")),
            Classification::WhitelistedEmail
        );
        assert_eq!(
            state.classify(&sender("boss@work.example")),
            Classification::WhitelistedDomain
        );
        assert_eq!(
            state.classify(&sender("news@shop.example")),
            Classification::Approved
        );
        assert_eq!(
            state.classify(&sender("survey@poll.example")),
            Classification::Oneoff
        );
        assert_eq!(
            state.classify(&sender("anyone@spam.example")),
            Classification::BlacklistedDomain
        );
        assert_eq!(
            state.classify(&sender("stranger@else.example")),
            Classification::Unknown
        );
    }

    #[test]
    fn whitelist_wins_over_other_tiers() {
        let mut state = state();
        state.approved.insert("mom@family.example".into());
        state.blacklist_domains.insert("work.example".into());

        assert_eq!(
            state.classify(&sender("mom@family.example")),
            Classification::WhitelistedEmail
        );
        assert_eq!(
            state.classify(&sender("boss@work.example")),
            Classification::WhitelistedDomain
        );
    }

    #[test]
    fn approved_wins_over_oneoff() {
        let mut state = state();
        state.oneoff.insert("news@shop.example".into());
        assert_eq!(
            state.classify(&sender("news@shop.example")).tier(),
            Some(Tier::Approved)
        );
    }

    #[test]
    fn empty_domain_never_matches_domain_sets() {
        let mut state = SafelistState::default();
        state.whitelist.domains.insert(String::new());
        state.blacklist_domains.insert(String::new());
        assert_eq!(
            state.classify(&sender("postmaster")),
            Classification::Unknown
        );
    }

    #[test]
    fn tier_parse_and_display() {
        for tier in Tier::ALL {
            assert_eq!(tier.as_str().parse::<Tier>().unwrap(), tier);
        }
        assert_eq!("One-Off".parse::<Tier>().unwrap(), Tier::Oneoff);
        assert!("vip".parse::<Tier>().is_err());
        assert!(!Tier::Whitelist.is_actionable());
        assert!(Tier::Blacklist.is_actionable());
    }

    #[test]
    fn len_counts_all_sets() {
        assert_eq!(state().len(), 5);
        assert!(SafelistState::default().is_empty());
    }
}
