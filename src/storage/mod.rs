//! Safelist files and credential storage.
//!
//! This module provides the storage layer, including:
//!
//! - JSON safelist files, one per tier, written atomically
//! - The read-only suggestion cache
//! - OS keychain integration for mailbox passwords
//! - Async-safe file operations via tokio::task::spawn_blocking

mod keychain;
mod safelist_store;
mod suggestions;

pub use keychain::{KeychainAccess, KeychainError};
pub use safelist_store::{SafelistFiles, SafelistStore};
pub use suggestions::SuggestionCache;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while reading or writing stored files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unreadable file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Failed to spawn blocking task: {0}")]
    TaskFailed(String),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
