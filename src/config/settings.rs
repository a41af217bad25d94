//! Application settings and configuration types.
//!
//! Settings are read from `~/.config/listsweep/settings.json` (or the
//! platform equivalent) once at startup. Every section has defaults, so a
//! file only needs to list its accounts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::domain::ServerConfig;
use crate::storage::SafelistFiles;

/// Top-level application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Mailbox accounts, scanned in this order.
    pub accounts: Vec<AccountSettings>,
    /// Sender scan settings.
    pub scan: ScanSettings,
    /// Unsubscribe and delete settings.
    pub cleanup: CleanupSettings,
    /// Network timeouts shared by all IMAP commands.
    pub network: NetworkSettings,
    /// Locations of the safelist and suggestion files.
    pub storage: StorageSettings,
    /// Digest mail settings.
    pub digest: DigestSettings,
}

impl Settings {
    /// Reads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Checks the settings a run cannot proceed without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }
        for account in &self.accounts {
            account.validate()?;
        }

        let positive = [
            ("scan.retention_days", self.scan.retention_days as u64),
            ("scan.sample_subjects", self.scan.sample_subjects as u64),
            ("cleanup.http_timeout_secs", self.cleanup.http_timeout_secs),
            ("cleanup.smtp_timeout_secs", self.cleanup.smtp_timeout_secs),
            ("network.imap_timeout_secs", self.network.imap_timeout_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.scan.folders.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "scan.folders",
                reason: "at least one folder is required".to_string(),
            });
        }
        Ok(())
    }
}

/// One configured mailbox.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSettings {
    /// Short identifier. Defaults to the address when empty.
    #[serde(default)]
    pub id: String,
    /// Mailbox address; also the IMAP/SMTP login.
    pub email: String,
    pub imap_host: String,
    #[serde(default = "default_imap_port")]
    pub imap_port: u16,
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Implicit TLS for SMTP; `false` uses STARTTLS.
    #[serde(default = "default_true")]
    pub use_tls: bool,
    /// Inline password. Prefer `password_env` or the keychain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Name of an environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

impl AccountSettings {
    /// Returns the account id, falling back to the address.
    pub fn account_id(&self) -> &str {
        if self.id.trim().is_empty() {
            self.email.trim()
        } else {
            self.id.trim()
        }
    }

    /// Returns the server endpoints for this account.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            imap_host: self.imap_host.trim().to_string(),
            imap_port: self.imap_port,
            smtp_host: self.smtp_host.trim().to_string(),
            smtp_port: self.smtp_port,
            use_tls: self.use_tls,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidAccount {
            id: self.account_id().to_string(),
            reason: reason.to_string(),
        };
        if self.email.trim().is_empty() {
            return Err(invalid("email is empty"));
        }
        if !self.email.contains('@') {
            return Err(invalid("email has no domain"));
        }
        if self.imap_host.trim().is_empty() {
            return Err(invalid("imap_host is empty"));
        }
        if self.smtp_host.trim().is_empty() {
            return Err(invalid("smtp_host is empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for AccountSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSettings")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("imap_host", &self.imap_host)
            .field("imap_port", &self.imap_port)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("use_tls", &self.use_tls)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("password_env", &self.password_env)
            .finish()
    }
}

fn default_imap_port() -> u16 {
    993
}

fn default_smtp_port() -> u16 {
    465
}

fn default_true() -> bool {
    true
}

/// Which slice of a folder's matches a per-folder cap keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitOrder {
    /// The highest UIDs.
    #[default]
    Newest,
    /// The lowest UIDs.
    Oldest,
}

/// Sender scan configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Folders visited per account, in order. Missing ones are skipped.
    pub folders: Vec<String>,
    /// Only messages older than this many days are scanned.
    pub retention_days: u32,
    /// Optional cap on messages processed per folder.
    pub per_folder_limit: Option<usize>,
    /// Which slice the cap keeps.
    pub limit_order: LimitOrder,
    /// Sample subjects kept per unknown sender.
    pub sample_subjects: usize,
    /// Scan accounts concurrently.
    pub concurrent_accounts: bool,
}

impl ScanSettings {
    /// Configured folders without repeats.
    ///
    /// `INBOX` is case-insensitive in IMAP, so `Inbox` and `INBOX` name the
    /// same folder and only the first spelling is kept.
    pub fn folder_list(&self) -> Vec<String> {
        let mut folders: Vec<String> = Vec::with_capacity(self.folders.len());
        for folder in &self.folders {
            let folder = folder.trim();
            let seen = folders.iter().any(|f| {
                f == folder || (f.eq_ignore_ascii_case("inbox") && folder.eq_ignore_ascii_case("inbox"))
            });
            if !folder.is_empty() && !seen {
                folders.push(folder.to_string());
            }
        }
        folders
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            folders: vec![
                "INBOX".to_string(),
                "[Gmail]/Spam".to_string(),
                "Inbox".to_string(),
                "Bulk".to_string(),
            ],
            retention_days: 30,
            per_folder_limit: None,
            limit_order: LimitOrder::Newest,
            sample_subjects: 5,
            concurrent_accounts: false,
        }
    }
}

/// Unsubscribe and purge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupSettings {
    /// Execute unsubscribe directives before deleting. `false` only deletes.
    pub unsubscribe: bool,
    pub http_timeout_secs: u64,
    pub smtp_timeout_secs: u64,
}

impl CleanupSettings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn smtp_timeout(&self) -> Duration {
        Duration::from_secs(self.smtp_timeout_secs)
    }
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            unsubscribe: true,
            http_timeout_secs: 10,
            smtp_timeout_secs: 30,
        }
    }
}

/// Network timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Applied to every IMAP command, including connect and login.
    pub imap_timeout_secs: u64,
}

impl NetworkSettings {
    pub fn imap_timeout(&self) -> Duration {
        Duration::from_secs(self.imap_timeout_secs)
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            imap_timeout_secs: 30,
        }
    }
}

/// Where safelist and suggestion files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Data directory. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    pub whitelist_file: String,
    pub approved_file: String,
    pub oneoff_file: String,
    pub blacklist_file: String,
    pub suggestions_file: String,
}

impl StorageSettings {
    /// Resolves the data directory.
    pub fn resolve_data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => super::default_data_dir().ok_or(ConfigError::NoDataDir),
        }
    }

    /// File names for the safelist tiers.
    pub fn safelist_files(&self) -> SafelistFiles {
        SafelistFiles {
            whitelist: self.whitelist_file.clone(),
            approved: self.approved_file.clone(),
            oneoff: self.oneoff_file.clone(),
            blacklist: self.blacklist_file.clone(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        let files = SafelistFiles::default();
        Self {
            data_dir: None,
            whitelist_file: files.whitelist,
            approved_file: files.approved,
            oneoff_file: files.oneoff,
            blacklist_file: files.blacklist,
            suggestions_file: "sender_suggestions.json".to_string(),
        }
    }
}

/// Digest mail configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestSettings {
    /// Recipient. Defaults to the first account's address.
    pub recipient: Option<String>,
    /// Link to the review page, included in the body when set.
    pub manage_url: Option<String>,
    /// Number of senders listed.
    pub top_senders: usize,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            recipient: None,
            manage_url: None,
            top_senders: 10,
        }
    }
}
