//! JSON-file backed safelist storage.
//!
//! Each tier lives in its own file under the data directory. Several legacy
//! shapes are accepted on read and normalized; writes always emit the
//! canonical shape and go through a temp file that is renamed into place.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{Result, StoreError};
use crate::domain::{domain_of, SafelistState, Tier, Whitelist};

/// File names for each tier, relative to the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafelistFiles {
    pub whitelist: String,
    pub approved: String,
    pub oneoff: String,
    pub blacklist: String,
}

impl Default for SafelistFiles {
    fn default() -> Self {
        Self {
            whitelist: "whitelist.json".to_string(),
            approved: "approved_senders.json".to_string(),
            oneoff: "oneoff.json".to_string(),
            blacklist: "blacklist.json".to_string(),
        }
    }
}

impl SafelistFiles {
    fn name(&self, tier: Tier) -> &str {
        match tier {
            Tier::Whitelist => &self.whitelist,
            Tier::Approved => &self.approved,
            Tier::Oneoff => &self.oneoff,
            Tier::Blacklist => &self.blacklist,
        }
    }
}

/// Whitelist on disk: canonical object, or a bare list from older versions.
#[derive(Deserialize)]
#[serde(untagged)]
enum WhitelistFile {
    List(Vec<String>),
    Object {
        #[serde(default)]
        emails: Vec<String>,
        #[serde(default)]
        domains: Vec<String>,
    },
}

/// Approved and one-off lists: bare list, or wrapped under `senders`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SenderListFile {
    List(Vec<String>),
    Wrapped { senders: Vec<String> },
}

/// Blacklist on disk: canonical `{domains}` object, or a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum BlacklistFile {
    List(Vec<String>),
    Object {
        #[serde(default)]
        domains: Vec<String>,
    },
}

#[derive(Serialize)]
struct CanonicalWhitelist<'a> {
    emails: &'a BTreeSet<String>,
    domains: &'a BTreeSet<String>,
}

#[derive(Serialize)]
struct CanonicalBlacklist<'a> {
    domains: &'a BTreeSet<String>,
}

/// Durable storage for the four safelist tiers.
///
/// Writes within one process are serialized; concurrent writer processes
/// are not supported.
#[derive(Debug, Clone)]
pub struct SafelistStore {
    dir: PathBuf,
    files: SafelistFiles,
    write_lock: Arc<Mutex<()>>,
}

impl SafelistStore {
    /// Creates a store rooted at `dir` with the default file names.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_files(dir, SafelistFiles::default())
    }

    /// Creates a store with custom file names.
    pub fn with_files(dir: impl Into<PathBuf>, files: SafelistFiles) -> Self {
        Self {
            dir: dir.into(),
            files,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the file backing `tier`.
    pub fn path(&self, tier: Tier) -> PathBuf {
        self.dir.join(self.files.name(tier))
    }

    /// Loads one tier. Only that tier's part of the returned state is filled.
    ///
    /// A missing file yields an empty tier; an unparseable one is an error.
    pub async fn load(&self, tier: Tier) -> Result<SafelistState> {
        let path = self.path(tier);
        tokio::task::spawn_blocking(move || read_tier(&path, tier))
            .await
            .map_err(|e| StoreError::TaskFailed(e.to_string()))?
    }

    /// Loads every tier into one snapshot.
    pub async fn load_all(&self) -> Result<SafelistState> {
        let mut state = SafelistState::default();
        for tier in Tier::ALL {
            let loaded = self.load(tier).await?;
            copy_tier(&loaded, &mut state, tier);
        }
        Ok(state)
    }

    /// Rewrites the file for `tier` from `state` in canonical form.
    pub async fn save(&self, tier: Tier, state: &SafelistState) -> Result<()> {
        let mut part = SafelistState::default();
        copy_tier(state, &mut part, tier);

        let _guard = self.write_lock.lock().await;
        let path = self.path(tier);
        tokio::task::spawn_blocking(move || write_tier(&path, tier, &part))
            .await
            .map_err(|e| StoreError::TaskFailed(e.to_string()))?
    }
}

fn copy_tier(from: &SafelistState, to: &mut SafelistState, tier: Tier) {
    match tier {
        Tier::Whitelist => to.whitelist = from.whitelist.clone(),
        Tier::Approved => to.approved = from.approved.clone(),
        Tier::Oneoff => to.oneoff = from.oneoff.clone(),
        Tier::Blacklist => to.blacklist_domains = from.blacklist_domains.clone(),
    }
}

/// Trims and lowercases entries, dropping blanks.
fn normalize<I>(entries: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = String>,
{
    entries
        .into_iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

fn read_tier(path: &Path, tier: Tier) -> Result<SafelistState> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(SafelistState::default());
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };
    // Whitespace-only counts as empty.
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(SafelistState::default());
    }

    let corrupt = |e: serde_json::Error| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut state = SafelistState::default();
    match tier {
        Tier::Whitelist => {
            state.whitelist = match serde_json::from_slice(&bytes).map_err(corrupt)? {
                WhitelistFile::Object { emails, domains } => Whitelist {
                    emails: normalize(emails),
                    domains: normalize(domains),
                },
                WhitelistFile::List(entries) => {
                    let (emails, domains): (Vec<_>, Vec<_>) =
                        entries.into_iter().partition(|e| e.contains('@'));
                    Whitelist {
                        emails: normalize(emails),
                        domains: normalize(domains),
                    }
                }
            };
        }
        Tier::Approved | Tier::Oneoff => {
            let senders = match serde_json::from_slice(&bytes).map_err(corrupt)? {
                SenderListFile::List(senders) | SenderListFile::Wrapped { senders } => senders,
            };
            if tier == Tier::Approved {
                state.approved = normalize(senders);
            } else {
                state.oneoff = normalize(senders);
            }
        }
        Tier::Blacklist => {
            let domains = match serde_json::from_slice(&bytes).map_err(corrupt)? {
                BlacklistFile::List(domains) | BlacklistFile::Object { domains } => domains,
            };
            state.blacklist_domains = normalize(domains.into_iter().map(|d| {
                if d.contains('@') {
                    domain_of(d.trim()).to_string()
                } else {
                    d
                }
            }));
        }
    }
    Ok(state)
}

fn write_tier(path: &Path, tier: Tier, state: &SafelistState) -> Result<()> {
    let json = match tier {
        Tier::Whitelist => serde_json::to_vec_pretty(&CanonicalWhitelist {
            emails: &state.whitelist.emails,
            domains: &state.whitelist.domains,
        }),
        Tier::Approved => serde_json::to_vec_pretty(&state.approved),
        Tier::Oneoff => serde_json::to_vec_pretty(&state.oneoff),
        Tier::Blacklist => serde_json::to_vec_pretty(&CanonicalBlacklist {
            domains: &state.blacklist_domains,
        }),
    }
    .map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(&json).map_err(|e| StoreError::io(path, e))?;
    tmp.write_all(b"\n").map_err(|e| StoreError::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;

    tracing::debug!(path = %path.display(), tier = %tier, "Safelist file written");
    Ok(())
}
