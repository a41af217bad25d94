//! Configuration and settings management.
//!
//! This module provides the settings types and their loading. Settings are
//! stored in the user's config directory as JSON.

mod settings;

pub use settings::{
    AccountSettings, CleanupSettings, DigestSettings, LimitOrder, NetworkSettings, ScanSettings,
    Settings, StorageSettings,
};

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read settings {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("No accounts configured")]
    NoAccounts,

    #[error("Account {id}: {reason}")]
    InvalidAccount { id: String, reason: String },

    #[error("{field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("No credential for account {0}")]
    MissingCredential(String),

    #[error("Cannot determine a data directory; set storage.data_dir")]
    NoDataDir,
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "listsweep")
}

/// Default settings file location.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("settings.json"))
}

/// Default directory for safelist and suggestion files.
pub fn default_data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}
