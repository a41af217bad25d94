//! Read-only access to the cached sender suggestions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{Result, StoreError};
use crate::domain::{Sender, SuggestionEntry, SuggestionRecord};

/// Reader for `sender_suggestions.json`.
///
/// The file maps sender addresses to `{suggestion, reason, timestamp}`. It is
/// written by an external generator and never modified here.
#[derive(Debug, Clone)]
pub struct SuggestionCache {
    path: PathBuf,
}

impl SuggestionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every record, keyed and ordered by sender.
    ///
    /// A missing file is empty. Keys that do not normalize to a sender are
    /// dropped; later duplicates of the same normalized sender win.
    pub async fn load(&self) -> Result<BTreeMap<Sender, SuggestionRecord>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_cache(&path))
            .await
            .map_err(|e| StoreError::TaskFailed(e.to_string()))?
    }

    /// Returns the record for one sender.
    pub async fn get(&self, sender: &Sender) -> Result<Option<SuggestionRecord>> {
        Ok(self.load().await?.remove(sender))
    }
}

fn read_cache(path: &Path) -> Result<BTreeMap<Sender, SuggestionRecord>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(BTreeMap::new());
    }

    let raw: BTreeMap<String, SuggestionEntry> =
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let records = raw
        .into_iter()
        .filter_map(|(key, entry)| {
            let sender = Sender::parse(&key)?;
            let record = SuggestionRecord::from_entry(sender.clone(), &entry);
            Some((sender, record))
        })
        .collect();
    Ok(records)
}
