//! Classification command applier.
//!
//! The only writer of the safelist. Every decision, whether typed by an
//! operator or accepted from the suggestion cache, goes through
//! [`ClassificationService::apply`], which is an idempotent set insert
//! followed by a full rewrite of that tier's file.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::{domain_of, SafelistState, SuggestionRecord, Tier};
use crate::storage::{SafelistStore, StoreError};

/// Errors that can occur while applying a classification.
#[derive(Debug, Error)]
pub enum ClassificationError {
    /// The key cannot be stored in the requested tier.
    #[error("invalid key {key:?} for {tier}: {reason}")]
    InvalidKey {
        key: String,
        tier: Tier,
        reason: &'static str,
    },

    /// The suggestion names no acceptable tier.
    #[error("no usable suggestion for {0}")]
    NoSuggestion(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for classification operations.
pub type ClassificationResult<T> = Result<T, ClassificationError>;

/// What an `apply` call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Applied {
    /// Normalized key as stored.
    pub key: String,
    /// Tier written to.
    pub tier: Tier,
    /// `false` when the key was already present and nothing was written.
    pub changed: bool,
}

/// Normalizes a key for `tier` and returns it.
///
/// Approved and one-off entries must be addresses. Whitelist keys with an
/// `@` are addresses, otherwise domains. Blacklist keys are always domains;
/// an address is reduced to its domain.
pub fn normalize_key(key: &str, tier: Tier) -> ClassificationResult<String> {
    let invalid = |reason| ClassificationError::InvalidKey {
        key: key.to_string(),
        tier,
        reason,
    };

    let key_norm = key
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_lowercase();
    if key_norm.is_empty() {
        return Err(invalid("empty key"));
    }
    if key_norm.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }

    match tier {
        Tier::Approved | Tier::Oneoff => {
            if !key_norm.contains('@') {
                return Err(invalid("expected a sender address"));
            }
            if domain_of(&key_norm).is_empty() {
                return Err(invalid("address has no domain"));
            }
            Ok(key_norm)
        }
        Tier::Whitelist => {
            if key_norm.contains('@') && domain_of(&key_norm).is_empty() {
                return Err(invalid("address has no domain"));
            }
            Ok(key_norm)
        }
        Tier::Blacklist => {
            let domain = if key_norm.contains('@') {
                domain_of(&key_norm).to_string()
            } else {
                key_norm
            };
            if domain.is_empty() {
                return Err(invalid("address has no domain"));
            }
            Ok(domain)
        }
    }
}

fn target_set<'a>(
    state: &'a mut SafelistState,
    key: &str,
    tier: Tier,
) -> &'a mut BTreeSet<String> {
    match tier {
        Tier::Whitelist if key.contains('@') => &mut state.whitelist.emails,
        Tier::Whitelist => &mut state.whitelist.domains,
        Tier::Approved => &mut state.approved,
        Tier::Oneoff => &mut state.oneoff,
        Tier::Blacklist => &mut state.blacklist_domains,
    }
}

/// Applies classification decisions to the safelist.
pub struct ClassificationService {
    store: SafelistStore,
    state: Mutex<SafelistState>,
}

impl ClassificationService {
    /// Loads the current safelist from `store`.
    pub async fn open(store: SafelistStore) -> ClassificationResult<Self> {
        let state = store.load_all().await?;
        tracing::debug!(entries = state.len(), dir = %store.dir().display(), "Safelist loaded");
        Ok(Self {
            store,
            state: Mutex::new(state),
        })
    }

    /// Returns a copy of the current safelist.
    pub async fn snapshot(&self) -> SafelistState {
        self.state.lock().await.clone()
    }

    /// Adds `key` to `tier`. Applying the same pair twice is a no-op.
    ///
    /// The tier's file is rewritten only when the set changed; the in-memory
    /// state is updated only after the write succeeded.
    pub async fn apply(&self, key: &str, tier: Tier) -> ClassificationResult<Applied> {
        let key = normalize_key(key, tier)?;
        let mut state = self.state.lock().await;

        if target_set(&mut state, &key, tier).contains(&key) {
            tracing::debug!(key = %key, tier = %tier, "Already classified");
            return Ok(Applied {
                key,
                tier,
                changed: false,
            });
        }

        let mut next = state.clone();
        target_set(&mut next, &key, tier).insert(key.clone());
        self.store.save(tier, &next).await?;
        *state = next;

        tracing::info!(key = %key, tier = %tier, "Classification applied");
        Ok(Applied {
            key,
            tier,
            changed: true,
        })
    }

    /// Applies a cached suggestion as if an operator had typed it.
    pub async fn accept_suggestion(
        &self,
        record: &SuggestionRecord,
    ) -> ClassificationResult<Applied> {
        let tier = record
            .suggested_tier
            .ok_or_else(|| ClassificationError::NoSuggestion(record.sender.to_string()))?;
        self.apply(record.sender.as_str(), tier).await
    }
}
