//! Unsubscribe dispatcher.
//!
//! For each target sender, finds its messages in every account and folder,
//! executes the unsubscribe directives their `List-Unsubscribe` headers
//! carry, then deletes the messages with one expunge per folder. Deletion
//! happens whether or not any directive succeeded.
//!
//! Whitelisted senders are never touched. Failures are isolated per account,
//! sender, folder and directive and recorded in the [`CleanupReport`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::{
    parse_list_unsubscribe, Account, CleanupReport, IssueKind, MessageUid, RunIssue,
    SafelistState, Sender, SenderOutcome, SkipReason, UnsubscribeDirective,
};
use crate::providers::email::{HeaderField, MailboxConnector, MailboxSession};
use crate::providers::unsubscribe::{DirectiveError, UnsubscribeTransport};

/// Headers the dispatcher reads for matched messages.
const CLEANUP_FIELDS: [HeaderField; 2] = [HeaderField::From, HeaderField::ListUnsubscribe];

/// Parameters for one cleanup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOptions {
    /// Folders searched per account, in order.
    pub folders: Vec<String>,
    /// Execute directives before deleting. `false` only deletes.
    pub unsubscribe: bool,
}

/// Executes unsubscribe directives and deletes matching mail.
pub struct UnsubscribeService {
    connector: Arc<dyn MailboxConnector>,
    transport: Arc<dyn UnsubscribeTransport>,
    accounts: Vec<Account>,
}

impl UnsubscribeService {
    /// Creates a dispatcher over the given accounts.
    pub fn new(
        connector: Arc<dyn MailboxConnector>,
        transport: Arc<dyn UnsubscribeTransport>,
        accounts: Vec<Account>,
    ) -> Self {
        Self {
            connector,
            transport,
            accounts,
        }
    }

    /// Cleans up a batch of senders.
    ///
    /// Outcomes come back in request order, one per distinct sender. One
    /// session per account serves the whole batch; an account that fails to
    /// connect is recorded and the others proceed.
    pub async fn cleanup(
        &self,
        senders: &[Sender],
        safelist: &SafelistState,
        options: &CleanupOptions,
        cancel: &CancellationToken,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();
        let mut targets = Vec::new();

        for sender in senders {
            if report.outcomes.iter().any(|o| &o.sender == sender) {
                continue;
            }
            let tier = safelist.classify(sender).tier();
            if safelist.is_whitelisted(sender) {
                tracing::info!(%sender, "Whitelisted sender, not cleaning up");
                report
                    .outcomes
                    .push(SenderOutcome::skipped(sender.clone(), tier, SkipReason::Whitelisted));
            } else {
                targets.push(report.outcomes.len());
                report.outcomes.push(SenderOutcome::new(sender.clone(), tier));
            }
        }

        tracing::info!(
            senders = targets.len(),
            accounts = self.accounts.len(),
            unsubscribe = options.unsubscribe,
            "Starting cleanup"
        );

        let mut touched = vec![false; report.outcomes.len()];
        'accounts: for account in &self.accounts {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let mut session = match self.connector.connect(account).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(account = %account.id, error = %e, "Skipping account");
                    report
                        .account_failures
                        .push(RunIssue::account(&account.id, e.issue_kind(), e.to_string()));
                    continue;
                }
            };

            for &index in &targets {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    if let Err(e) = session.close().await {
                        tracing::debug!(account = %account.id, error = %e, "Logout failed");
                    }
                    break 'accounts;
                }
                touched[index] = true;
                let outcome = &mut report.outcomes[index];
                self.clean_sender(session.as_mut(), account, options, outcome, cancel)
                    .await;
                if cancel.is_cancelled() {
                    report.cancelled = true;
                }
            }

            if let Err(e) = session.close().await {
                tracing::debug!(account = %account.id, error = %e, "Logout failed");
            }
        }

        if report.cancelled {
            for &index in &targets {
                if !touched[index] {
                    report.outcomes[index].skipped = Some(SkipReason::Cancelled);
                }
            }
        }

        tracing::info!(
            deleted = report.messages_deleted(),
            account_failures = report.account_failures.len(),
            cancelled = report.cancelled,
            "Cleanup finished"
        );
        report
    }

    /// Processes one sender in every folder of one account.
    ///
    /// Stops before the next folder once `cancel` fires.
    async fn clean_sender(
        &self,
        session: &mut dyn MailboxSession,
        account: &Account,
        options: &CleanupOptions,
        outcome: &mut SenderOutcome,
        cancel: &CancellationToken,
    ) {
        for folder in &options.folders {
            if cancel.is_cancelled() {
                tracing::info!(
                    account = %account.id,
                    sender = %outcome.sender,
                    "Cleanup cancelled"
                );
                return;
            }
            if let Err(e) = session.select_folder(folder).await {
                tracing::debug!(account = %account.id, folder, error = %e, "Folder skipped");
                let fatal = e.issue_kind().is_account_fatal();
                outcome.issues.push(RunIssue::folder(
                    &account.id,
                    folder,
                    e.issue_kind(),
                    e.to_string(),
                ));
                if fatal {
                    return;
                }
                continue;
            }

            let uids = match session.search_from(outcome.sender.as_str()).await {
                Ok(uids) => uids,
                Err(e) => {
                    tracing::warn!(
                        account = %account.id,
                        folder,
                        sender = %outcome.sender,
                        error = %e,
                        "Search failed"
                    );
                    outcome.issues.push(RunIssue::folder(
                        &account.id,
                        folder,
                        e.issue_kind(),
                        e.to_string(),
                    ));
                    continue;
                }
            };
            if uids.is_empty() {
                continue;
            }

            let headers = match session.fetch_headers(&uids, &CLEANUP_FIELDS).await {
                Ok(headers) => headers,
                Err(e) => {
                    tracing::warn!(
                        account = %account.id,
                        folder,
                        sender = %outcome.sender,
                        error = %e,
                        "Header fetch failed"
                    );
                    outcome.issues.push(RunIssue::folder(
                        &account.id,
                        folder,
                        e.issue_kind(),
                        e.to_string(),
                    ));
                    continue;
                }
            };

            // The server's FROM search is a substring match; keep only this
            // sender, plus messages whose From could not be parsed.
            let matched: Vec<_> = headers
                .into_iter()
                .filter(|(_, h)| h.sender().map_or(true, |s| s == outcome.sender))
                .collect();
            if matched.is_empty() {
                continue;
            }
            outcome.messages_matched += matched.len() as u32;

            if options.unsubscribe {
                for (uid, headers) in &matched {
                    if let Some(raw) = headers.list_unsubscribe.as_deref() {
                        self.run_directives(account, folder, *uid, raw, outcome).await;
                    }
                }
            }

            let uids: Vec<MessageUid> = matched.iter().map(|(uid, _)| *uid).collect();
            let deleted = match session.mark_deleted(&uids).await {
                Ok(()) => session.expunge().await,
                Err(e) => Err(e),
            };
            match deleted {
                Ok(()) => {
                    outcome.messages_deleted += uids.len() as u32;
                    tracing::info!(
                        account = %account.id,
                        folder,
                        sender = %outcome.sender,
                        deleted = uids.len(),
                        "Messages deleted"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        account = %account.id,
                        folder,
                        sender = %outcome.sender,
                        error = %e,
                        "Delete failed"
                    );
                    outcome.issues.push(RunIssue::folder(
                        &account.id,
                        folder,
                        e.issue_kind(),
                        e.to_string(),
                    ));
                }
            }
        }
    }

    /// Parses one header value and executes every directive in it.
    async fn run_directives(
        &self,
        account: &Account,
        folder: &str,
        uid: MessageUid,
        raw: &str,
        outcome: &mut SenderOutcome,
    ) {
        let parsed = parse_list_unsubscribe(raw);
        for error in &parsed.errors {
            tracing::debug!(account = %account.id, folder, %uid, %error, "Malformed directive");
        }
        outcome.malformed_directives += parsed.errors.len() as u32;

        for directive in &parsed.directives {
            outcome.directives_attempted += 1;
            match self.execute(account, directive).await {
                Ok(()) => {
                    outcome.directives_succeeded += 1;
                    tracing::debug!(
                        account = %account.id,
                        kind = directive.kind(),
                        target = directive.target(),
                        "Directive executed"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        account = %account.id,
                        kind = directive.kind(),
                        target = directive.target(),
                        error = %e,
                        "Directive failed"
                    );
                    outcome.issues.push(RunIssue::folder(
                        &account.id,
                        folder,
                        IssueKind::Directive,
                        format!("{} {}: {}", directive.kind(), directive.target(), e),
                    ));
                }
            }
        }
    }

    async fn execute(
        &self,
        account: &Account,
        directive: &UnsubscribeDirective,
    ) -> Result<(), DirectiveError> {
        match directive {
            UnsubscribeDirective::Http { url } => self.transport.visit(url).await.map(|_| ()),
            UnsubscribeDirective::Mailto { address, subject } => {
                self.transport.send_mail(account, address, subject, "").await
            }
        }
    }
}
