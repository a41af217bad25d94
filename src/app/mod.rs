//! Application wiring.
//!
//! [`App`] is the one place where settings, credentials, stores and services
//! are assembled. Nothing below this layer reads configuration or
//! environment on its own.

pub mod actions;
pub mod report;

use std::sync::Arc;

use chrono::Local;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{AccountSettings, ConfigError, Settings};
use crate::domain::{
    Account, CleanupReport, Credential, ScanResult, Sender, SuggestionRecord, Tier,
};
use crate::providers::email::{ImapConnector, MailboxConnector, SmtpError, SmtpSender};
use crate::providers::unsubscribe::{DirectiveError, NetworkTransport, UnsubscribeTransport};
use crate::services::{
    Applied, ClassificationError, ClassificationService, CleanupOptions, DigestService,
    ScanOptions, ScannerService, UnsubscribeService,
};
use crate::storage::{KeychainAccess, KeychainError, SafelistStore, StoreError, SuggestionCache};

/// Errors that stop a command outright.
///
/// Per-account and per-folder failures never show up here; they are part
/// of the scan or cleanup report.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Keychain(#[from] KeychainError),

    #[error("transport setup failed: {0}")]
    Transport(#[from] DirectiveError),

    #[error("digest not sent: {0}")]
    Digest(#[from] SmtpError),

    #[error("not a sender address: {0:?}")]
    InvalidSender(String),

    #[error("unknown account: {0}")]
    UnknownAccount(String),
}

/// Result type for application commands.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Which senders a cleanup run targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupTarget {
    /// Explicitly named senders.
    Senders(Vec<String>),
    /// Every corporate sender found by a fresh scan.
    All,
    /// Every stored approved and one-off sender.
    Safelisted,
}

/// Resolves an account's password: inline, then environment, then keychain.
pub async fn resolve_account(
    settings: &AccountSettings,
    keychain: &KeychainAccess,
) -> Result<Account> {
    let id = settings.account_id().to_string();

    let mut secret = settings.password.clone().filter(|p| !p.is_empty());
    if secret.is_none() {
        if let Some(var) = &settings.password_env {
            secret = std::env::var(var).ok().filter(|p| !p.is_empty());
            if secret.is_none() {
                tracing::debug!(account = %id, var = %var, "Password variable not set");
            }
        }
    }
    if secret.is_none() {
        secret = keychain
            .retrieve(&KeychainAccess::imap_password_key(&id))
            .await?;
    }
    let secret = secret.ok_or_else(|| ConfigError::MissingCredential(id.clone()))?;

    Ok(Account::new(
        id,
        settings.email.trim(),
        Credential::new(secret),
        settings.server_config(),
    ))
}

/// Stores a password in the keychain for a configured account.
pub async fn store_password(
    settings: &Settings,
    keychain: &KeychainAccess,
    account_id: &str,
    password: &str,
) -> Result<()> {
    let account = settings
        .accounts
        .iter()
        .find(|a| a.account_id() == account_id)
        .ok_or_else(|| EngineError::UnknownAccount(account_id.to_string()))?;
    keychain
        .store(&KeychainAccess::imap_password_key(account.account_id()), password)
        .await?;
    tracing::info!(account = %account.account_id(), "Password stored in keychain");
    Ok(())
}

/// The assembled engine.
pub struct App {
    settings: Settings,
    accounts: Vec<Account>,
    scanner: ScannerService,
    dispatcher: UnsubscribeService,
    classifier: ClassificationService,
    suggestions: SuggestionCache,
    cancel: CancellationToken,
}

impl App {
    /// Validates settings, resolves credentials and builds every service.
    pub async fn from_settings(settings: Settings, cancel: CancellationToken) -> Result<Self> {
        settings.validate()?;

        let keychain = KeychainAccess::new();
        let mut accounts = Vec::with_capacity(settings.accounts.len());
        for account in &settings.accounts {
            accounts.push(resolve_account(account, &keychain).await?);
        }

        let connector: Arc<dyn MailboxConnector> =
            Arc::new(ImapConnector::new(settings.network.imap_timeout()));
        let transport: Arc<dyn UnsubscribeTransport> = Arc::new(NetworkTransport::new(
            settings.cleanup.http_timeout(),
            settings.cleanup.smtp_timeout(),
        )?);

        Self::with_parts(settings, accounts, connector, transport, cancel).await
    }

    /// Builds the engine from already-resolved parts.
    pub async fn with_parts(
        settings: Settings,
        accounts: Vec<Account>,
        connector: Arc<dyn MailboxConnector>,
        transport: Arc<dyn UnsubscribeTransport>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let data_dir = settings.storage.resolve_data_dir()?;
        let store = SafelistStore::with_files(&data_dir, settings.storage.safelist_files());
        let classifier = ClassificationService::open(store).await?;
        let suggestions = SuggestionCache::new(data_dir.join(&settings.storage.suggestions_file));

        Ok(Self {
            scanner: ScannerService::new(connector.clone(), accounts.clone()),
            dispatcher: UnsubscribeService::new(connector, transport, accounts.clone()),
            settings,
            accounts,
            classifier,
            suggestions,
            cancel,
        })
    }

    /// Configured accounts, in scan order.
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Scans with the configured options, optionally overriding the window
    /// and the per-folder cap.
    pub async fn scan(&self, days: Option<u32>, limit: Option<usize>) -> ScanResult {
        let mut options = ScanOptions::from_settings(&self.settings.scan);
        if let Some(days) = days {
            options = options.retention_days(days);
        }
        if limit.is_some() {
            options = options.per_folder_limit(limit);
        }
        self.scan_with(&options).await
    }

    /// Scans with explicit options against the current safelist.
    pub async fn scan_with(&self, options: &ScanOptions) -> ScanResult {
        let safelist = self.classifier.snapshot().await;
        self.scanner.scan(&safelist, options, &self.cancel).await
    }

    /// Runs a cleanup. `delete_only` skips directive execution.
    pub async fn cleanup(&self, target: CleanupTarget, delete_only: bool) -> Result<CleanupReport> {
        let safelist = self.classifier.snapshot().await;

        let senders: Vec<Sender> = match target {
            CleanupTarget::Senders(raw) => raw
                .iter()
                .map(|s| {
                    Sender::parse(s)
                        .filter(|sender| !sender.domain().is_empty())
                        .ok_or_else(|| EngineError::InvalidSender(s.clone()))
                })
                .collect::<Result<_>>()?,
            CleanupTarget::All => {
                let result = self.scan(None, None).await;
                result.corporate_senders.into_iter().collect()
            }
            CleanupTarget::Safelisted => safelist
                .approved
                .iter()
                .chain(safelist.oneoff.iter())
                .filter(|s| s.contains('@'))
                .filter_map(|s| Sender::parse(s))
                .collect(),
        };

        let options = CleanupOptions {
            folders: self.settings.scan.folder_list(),
            unsubscribe: self.settings.cleanup.unsubscribe && !delete_only,
        };
        Ok(self
            .dispatcher
            .cleanup(&senders, &safelist, &options, &self.cancel)
            .await)
    }

    /// Applies a classification decision.
    pub async fn classify(&self, key: &str, tier: Tier) -> Result<Applied> {
        Ok(self.classifier.apply(key, tier).await?)
    }

    /// Cached suggestions for senders a scan reported as unknown.
    pub async fn suggestions_for(&self, result: &ScanResult) -> Result<Vec<SuggestionRecord>> {
        let mut cached = self.suggestions.load().await?;
        Ok(result
            .unknown
            .keys()
            .filter_map(|sender| cached.remove(sender))
            .collect())
    }

    /// Applies the cached suggestion for `sender`.
    pub async fn accept(&self, sender: &str) -> Result<Applied> {
        let sender =
            Sender::parse(sender).ok_or_else(|| EngineError::InvalidSender(sender.to_string()))?;
        let record = self
            .suggestions
            .get(&sender)
            .await?
            .ok_or_else(|| ClassificationError::NoSuggestion(sender.to_string()))?;
        Ok(self.classifier.accept_suggestion(&record).await?)
    }

    /// Scans and mails the unknown-sender digest from the first account.
    ///
    /// Returns the scan and whether a digest was sent.
    pub async fn digest(&self) -> Result<(ScanResult, bool)> {
        let result = self.scan(None, None).await;
        let Some(account) = self.accounts.first() else {
            return Err(ConfigError::NoAccounts.into());
        };
        let digest = DigestService::new(
            SmtpSender::new(self.settings.cleanup.smtp_timeout()),
            account.clone(),
            &self.settings.digest,
        );
        let sent = digest.send(&result, Local::now().date_naive()).await?;
        Ok((result, sent))
    }
}
