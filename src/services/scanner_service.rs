//! Sender scanner.
//!
//! Walks every configured account and folder, reads the `From` and `Subject`
//! headers of messages older than the retention cutoff, and partitions their
//! senders by safelist tier:
//!
//! - whitelisted senders are only counted
//! - approved, one-off and blacklisted-domain senders become "corporate"
//! - everything else is unknown and waits for a decision
//!
//! Failures are isolated per account and per folder and land in
//! [`ScanResult::issues`]; a scan always completes.

use std::sync::Arc;

use chrono::{Days, Local, NaiveDate};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::config::{LimitOrder, ScanSettings};
use crate::domain::{Account, Classification, MessageUid, RunIssue, SafelistState, ScanResult};
use crate::providers::email::{HeaderField, MailboxConnector, MailboxSession, ProviderError};

/// Headers a scan reads. Bodies are never fetched.
const SCAN_FIELDS: [HeaderField; 2] = [HeaderField::From, HeaderField::Subject];

/// Parameters for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Folders visited per account, in order.
    pub folders: Vec<String>,
    /// Messages dated before `today - retention_days` are scanned.
    pub retention_days: u32,
    /// Optional cap on UIDs processed per folder.
    pub per_folder_limit: Option<usize>,
    /// Which slice the cap keeps.
    pub limit_order: LimitOrder,
    /// Subjects kept per unknown sender.
    pub sample_cap: usize,
    /// Scan accounts concurrently.
    pub concurrent: bool,
    /// Reference date. Defaults to the local date.
    pub today: Option<NaiveDate>,
}

impl ScanOptions {
    /// Builds options from the scan settings section.
    pub fn from_settings(settings: &ScanSettings) -> Self {
        Self {
            folders: settings.folder_list(),
            retention_days: settings.retention_days,
            per_folder_limit: settings.per_folder_limit,
            limit_order: settings.limit_order,
            sample_cap: settings.sample_subjects,
            concurrent: settings.concurrent_accounts,
            today: None,
        }
    }

    /// Overrides the retention window.
    pub fn retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Overrides the per-folder cap.
    pub fn per_folder_limit(mut self, limit: Option<usize>) -> Self {
        self.per_folder_limit = limit;
        self
    }

    /// Pins the reference date.
    pub fn today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// The date messages must be strictly older than.
    pub fn cutoff(&self) -> NaiveDate {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        today
            .checked_sub_days(Days::new(u64::from(self.retention_days)))
            .unwrap_or(NaiveDate::MIN)
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_settings(&ScanSettings::default())
    }
}

/// Keeps the newest or oldest `limit` UIDs.
fn apply_limit(
    mut uids: Vec<MessageUid>,
    limit: Option<usize>,
    order: LimitOrder,
) -> Vec<MessageUid> {
    let Some(limit) = limit else {
        return uids;
    };
    if uids.len() <= limit {
        return uids;
    }
    uids.sort_unstable();
    match order {
        LimitOrder::Newest => uids.split_off(uids.len() - limit),
        LimitOrder::Oldest => {
            uids.truncate(limit);
            uids
        }
    }
}

/// Builds [`ScanResult`]s from mailbox headers.
pub struct ScannerService {
    connector: Arc<dyn MailboxConnector>,
    accounts: Vec<Account>,
}

impl ScannerService {
    /// Creates a scanner over the given accounts, scanned in order.
    pub fn new(connector: Arc<dyn MailboxConnector>, accounts: Vec<Account>) -> Self {
        Self {
            connector,
            accounts,
        }
    }

    /// Scans all accounts against a safelist snapshot.
    ///
    /// Cancellation is checked before each account and folder. A cancelled
    /// scan returns what it gathered so far with `cancelled` set.
    pub async fn scan(
        &self,
        safelist: &SafelistState,
        options: &ScanOptions,
        cancel: &CancellationToken,
    ) -> ScanResult {
        let cutoff = options.cutoff();
        tracing::info!(
            accounts = self.accounts.len(),
            folders = options.folders.len(),
            %cutoff,
            "Starting sender scan"
        );

        let partials = if options.concurrent {
            join_all(
                self.accounts
                    .iter()
                    .map(|account| self.scan_account(account, safelist, options, cutoff, cancel)),
            )
            .await
        } else {
            let mut partials = Vec::with_capacity(self.accounts.len());
            for account in &self.accounts {
                partials.push(self.scan_account(account, safelist, options, cutoff, cancel).await);
            }
            partials
        };

        let mut result = ScanResult::default();
        for partial in partials {
            result.merge(partial, options.sample_cap);
        }

        tracing::info!(
            scanned = result.messages_scanned,
            unknown = result.unknown.len(),
            corporate = result.corporate_senders.len(),
            issues = result.issues.len(),
            cancelled = result.cancelled,
            "Sender scan finished"
        );
        result
    }

    async fn scan_account(
        &self,
        account: &Account,
        safelist: &SafelistState,
        options: &ScanOptions,
        cutoff: NaiveDate,
        cancel: &CancellationToken,
    ) -> ScanResult {
        let mut result = ScanResult::default();
        if cancel.is_cancelled() {
            result.cancelled = true;
            return result;
        }

        let mut session = match self.connector.connect(account).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(account = %account.id, error = %e, "Skipping account");
                result
                    .issues
                    .push(RunIssue::account(&account.id, e.issue_kind(), e.to_string()));
                return result;
            }
        };

        for folder in &options.folders {
            if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }
            let scanned = self
                .scan_folder(session.as_mut(), account, folder, safelist, options, cutoff, &mut result)
                .await;
            if let Err(e) = scanned {
                if matches!(e, ProviderError::FolderNotFound(_)) {
                    tracing::debug!(account = %account.id, folder, "Folder not present, skipped");
                } else {
                    tracing::warn!(account = %account.id, folder, error = %e, "Folder scan failed");
                }
                let fatal = e.issue_kind().is_account_fatal();
                result.issues.push(RunIssue::folder(
                    &account.id,
                    folder,
                    e.issue_kind(),
                    e.to_string(),
                ));
                if fatal {
                    tracing::warn!(
                        account = %account.id,
                        "Connection lost, skipping remaining folders"
                    );
                    break;
                }
            }
        }

        if let Err(e) = session.close().await {
            tracing::debug!(account = %account.id, error = %e, "Logout failed");
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn scan_folder(
        &self,
        session: &mut dyn MailboxSession,
        account: &Account,
        folder: &str,
        safelist: &SafelistState,
        options: &ScanOptions,
        cutoff: NaiveDate,
        result: &mut ScanResult,
    ) -> Result<(), ProviderError> {
        session.select_folder(folder).await?;

        let uids = session.search_before(cutoff).await?;
        let uids = apply_limit(uids, options.per_folder_limit, options.limit_order);
        if uids.is_empty() {
            return Ok(());
        }
        tracing::debug!(account = %account.id, folder, messages = uids.len(), "Fetching headers");

        let headers = session.fetch_headers(&uids, &SCAN_FIELDS).await?;
        for (uid, headers) in headers {
            result.messages_scanned += 1;

            let Some(sender) = headers.sender() else {
                tracing::debug!(account = %account.id, folder, %uid, "No sender address, discarded");
                result.discarded_messages += 1;
                continue;
            };

            match safelist.classify(&sender) {
                Classification::Unknown => {
                    result.record_unknown(&sender, headers.subject.as_deref(), options.sample_cap)
                }
                classification => {
                    if let Some(tier) = classification.tier() {
                        result.record_classified(&sender, tier);
                    }
                }
            }
        }
        Ok(())
    }
}
