//! Domain layer types for listsweep.
//!
//! This module contains the core types used throughout the engine:
//! accounts, senders, safelist tiers, unsubscribe directives, and the
//! scan and cleanup reports.

mod account;
mod cleanup;
mod directive;
mod safelist;
mod scan;
mod sender;
mod suggestion;
mod types;

pub use account::{Account, Credential, ServerConfig};
pub use cleanup::{CleanupReport, SenderOutcome, SkipReason};
pub use directive::{
    parse_list_unsubscribe, DirectiveParseError, ParsedDirectives, UnsubscribeDirective,
    DEFAULT_SUBJECT,
};
pub use safelist::{Classification, SafelistState, Tier, UnknownTier, Whitelist};
pub use scan::{IssueKind, RunIssue, ScanResult};
pub use sender::{domain_of, Sender};
pub use suggestion::{SuggestionEntry, SuggestionRecord};
pub use types::{AccountId, MessageUid};
