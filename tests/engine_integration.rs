//! End-to-end tests for the engine.
//!
//! These drive [`App`] against an in-memory mailbox and a recording
//! unsubscribe transport: scan, classify, scan again, clean up.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use listsweep::config::Settings;
use listsweep::domain::{Account, Credential, MessageUid, Sender, ServerConfig, SkipReason, Tier};
use listsweep::providers::email::{
    HeaderField, MailboxConnector, MailboxSession, MessageHeaders, ProviderError,
};
use listsweep::providers::unsubscribe::{DirectiveError, UnsubscribeTransport};
use listsweep::{App, CleanupTarget};

// ============================================================================
// In-memory mailbox
// ============================================================================

#[derive(Clone)]
struct Message {
    uid: MessageUid,
    date: NaiveDate,
    from: String,
    subject: String,
    list_unsubscribe: Option<String>,
    deleted: bool,
}

type Folders = BTreeMap<String, Vec<Message>>;

#[derive(Clone, Default)]
struct Mailbox {
    folders: Arc<Mutex<Folders>>,
}

impl Mailbox {
    fn add(&self, folder: &str, date: NaiveDate, from: &str, subject: &str, unsub: Option<&str>) {
        let mut folders = self.folders.lock().unwrap();
        let next = folders.values().map(|m| m.len() as u32).sum::<u32>() + 1;
        folders.entry(folder.to_string()).or_default().push(Message {
            uid: MessageUid(next),
            date,
            from: from.to_string(),
            subject: subject.to_string(),
            list_unsubscribe: unsub.map(String::from),
            deleted: false,
        });
    }

    fn count_from(&self, sender: &str) -> usize {
        self.folders
            .lock()
            .unwrap()
            .values()
            .flatten()
            .filter(|m| m.from.contains(sender))
            .count()
    }
}

#[async_trait]
impl MailboxConnector for Mailbox {
    async fn connect(&self, _account: &Account) -> Result<Box<dyn MailboxSession>, ProviderError> {
        Ok(Box::new(Session {
            folders: self.folders.clone(),
            selected: String::new(),
        }))
    }
}

struct Session {
    folders: Arc<Mutex<Folders>>,
    selected: String,
}

impl Session {
    fn uids(&self, keep: impl Fn(&Message) -> bool) -> Vec<MessageUid> {
        let folders = self.folders.lock().unwrap();
        folders[&self.selected]
            .iter()
            .filter(|m| keep(m))
            .map(|m| m.uid)
            .collect()
    }
}

#[async_trait]
impl MailboxSession for Session {
    async fn select_folder(&mut self, folder: &str) -> Result<(), ProviderError> {
        if !self.folders.lock().unwrap().contains_key(folder) {
            return Err(ProviderError::FolderNotFound(folder.to_string()));
        }
        self.selected = folder.to_string();
        Ok(())
    }

    async fn search_before(&mut self, date: NaiveDate) -> Result<Vec<MessageUid>, ProviderError> {
        Ok(self.uids(|m| m.date < date))
    }

    async fn search_from(&mut self, sender: &str) -> Result<Vec<MessageUid>, ProviderError> {
        let needle = sender.to_lowercase();
        Ok(self.uids(|m| m.from.to_lowercase().contains(&needle)))
    }

    async fn fetch_headers(
        &mut self,
        uids: &[MessageUid],
        fields: &[HeaderField],
    ) -> Result<Vec<(MessageUid, MessageHeaders)>, ProviderError> {
        let folders = self.folders.lock().unwrap();
        Ok(folders[&self.selected]
            .iter()
            .filter(|m| uids.contains(&m.uid))
            .map(|m| {
                let mut headers = MessageHeaders::default();
                if fields.contains(&HeaderField::From) {
                    headers.from = Some(m.from.clone());
                }
                if fields.contains(&HeaderField::Subject) {
                    headers.subject = Some(m.subject.clone());
                }
                if fields.contains(&HeaderField::ListUnsubscribe) {
                    headers.list_unsubscribe = m.list_unsubscribe.clone();
                }
                (m.uid, headers)
            })
            .collect())
    }

    async fn mark_deleted(&mut self, uids: &[MessageUid]) -> Result<(), ProviderError> {
        let mut folders = self.folders.lock().unwrap();
        if let Some(messages) = folders.get_mut(&self.selected) {
            for m in messages.iter_mut().filter(|m| uids.contains(&m.uid)) {
                m.deleted = true;
            }
        }
        Ok(())
    }

    async fn expunge(&mut self) -> Result<(), ProviderError> {
        let mut folders = self.folders.lock().unwrap();
        if let Some(messages) = folders.get_mut(&self.selected) {
            messages.retain(|m| !m.deleted);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ProviderError> {
        Ok(())
    }
}

// ============================================================================
// Recording transport
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Visit(String),
    Mail { to: String, subject: String },
}

#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
    http_times_out: bool,
}

impl Recorder {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UnsubscribeTransport for Recorder {
    async fn visit(&self, url: &str) -> Result<u16, DirectiveError> {
        self.calls.lock().unwrap().push(Call::Visit(url.to_string()));
        if self.http_times_out {
            return Err(DirectiveError::Timeout(url.to_string()));
        }
        Ok(200)
    }

    async fn send_mail(
        &self,
        _account: &Account,
        to: &str,
        subject: &str,
        _body: &str,
    ) -> Result<(), DirectiveError> {
        self.calls.lock().unwrap().push(Call::Mail {
            to: to.to_string(),
            subject: subject.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

const UNSUB: &str = "<https://x.example/u?id=1>, <mailto:off@x.example?subject=STOP>";

fn old() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 15).unwrap()
}

fn sender(s: &str) -> Sender {
    Sender::parse(s).unwrap()
}

async fn app(dir: &TempDir, mailbox: &Mailbox, transport: &Recorder) -> App {
    let mut settings = Settings::default();
    settings.storage.data_dir = Some(dir.path().to_path_buf());
    settings.scan.folders = vec!["INBOX".to_string(), "Promotions".to_string()];

    let account = Account::new(
        "home",
        "me@home.example",
        Credential::new("secret"),
        ServerConfig::tls("imap.home.example", "smtp.home.example"),
    );
    App::with_parts(
        settings,
        vec![account],
        Arc::new(mailbox.clone()),
        Arc::new(transport.clone()),
        CancellationToken::new(),
    )
    .await
    .unwrap()
}

fn shop_mailbox() -> Mailbox {
    let mailbox = Mailbox::default();
    mailbox.add("INBOX", old(), "news@shop.example", "Spring sale", None);
    mailbox.add("INBOX", old(), "news@shop.example", "Summer sale", None);
    mailbox.add("Promotions", old(), "news@shop.example", "Autumn sale", None);
    mailbox
}

// ============================================================================
// Scan and classify
// ============================================================================

#[tokio::test]
async fn unknown_sender_counted_across_folders() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, &shop_mailbox(), &Recorder::default()).await;

    let result = app.scan(None, None).await;

    assert_eq!(result.unknown[&sender("news@shop.example")], 3);
    assert!(result.sample_subjects[&sender("news@shop.example")].len() <= 3);
    assert!(result.corporate_senders.is_empty());
}

#[tokio::test]
async fn blacklisting_domain_moves_sender_to_corporate() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, &shop_mailbox(), &Recorder::default()).await;

    let applied = app.classify("shop.example", Tier::Blacklist).await.unwrap();
    assert!(applied.changed);

    let result = app.scan(None, None).await;
    assert!(result.unknown.is_empty());
    assert_eq!(
        result.corporate_senders.into_iter().collect::<Vec<_>>(),
        vec![sender("news@shop.example")]
    );
}

#[tokio::test]
async fn whitelisted_sender_never_reported() {
    let dir = TempDir::new().unwrap();
    let mailbox = shop_mailbox();
    mailbox.add("INBOX", old(), "alerts@bank.example", "Statement", None);
    let app = app(&dir, &mailbox, &Recorder::default()).await;

    app.classify("bank.example", Tier::Whitelist).await.unwrap();
    app.classify("news@shop.example", Tier::Whitelist).await.unwrap();
    let result = app.scan(None, None).await;

    assert!(result.unknown.is_empty());
    assert!(result.corporate_senders.is_empty());
    assert_eq!(result.skipped_by_tier[&Tier::Whitelist].len(), 2);
}

#[tokio::test]
async fn repeated_scans_are_identical() {
    let dir = TempDir::new().unwrap();
    let mailbox = shop_mailbox();
    mailbox.add("INBOX", old(), "b@other.example", "x", None);
    mailbox.add("Promotions", old(), "a@other.example", "y", None);
    let app = app(&dir, &mailbox, &Recorder::default()).await;
    app.classify("a@other.example", Tier::Approved).await.unwrap();

    let first = app.scan(None, None).await;
    let second = app.scan(None, None).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn classify_twice_leaves_files_unchanged() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, &Mailbox::default(), &Recorder::default()).await;

    app.classify("news@shop.example", Tier::Oneoff).await.unwrap();
    let once = std::fs::read_to_string(dir.path().join("oneoff.json")).unwrap();
    let again = app.classify("news@shop.example", Tier::Oneoff).await.unwrap();
    let twice = std::fs::read_to_string(dir.path().join("oneoff.json")).unwrap();

    assert!(!again.changed);
    assert_eq!(once, twice);
}

// ============================================================================
// Cleanup
// ============================================================================

#[tokio::test]
async fn cleanup_unsubscribes_and_deletes() {
    let dir = TempDir::new().unwrap();
    let mailbox = Mailbox::default();
    mailbox.add("INBOX", old(), "news@x.example", "Deals", Some(UNSUB));
    let recorder = Recorder::default();
    let app = app(&dir, &mailbox, &recorder).await;

    let report = app
        .cleanup(CleanupTarget::Senders(vec!["news@x.example".into()]), false)
        .await
        .unwrap();

    assert_eq!(
        recorder.calls(),
        vec![
            Call::Visit("https://x.example/u?id=1".to_string()),
            Call::Mail {
                to: "off@x.example".to_string(),
                subject: "STOP".to_string()
            },
        ]
    );
    assert_eq!(report.messages_deleted(), 1);
    assert_eq!(mailbox.count_from("news@x.example"), 0);
}

#[tokio::test]
async fn http_timeout_does_not_block_mail_or_delete() {
    let dir = TempDir::new().unwrap();
    let mailbox = Mailbox::default();
    mailbox.add("INBOX", old(), "news@x.example", "Deals", Some(UNSUB));
    let recorder = Recorder {
        http_times_out: true,
        ..Recorder::default()
    };
    let app = app(&dir, &mailbox, &recorder).await;

    let report = app
        .cleanup(CleanupTarget::Senders(vec!["news@x.example".into()]), false)
        .await
        .unwrap();

    assert_eq!(recorder.calls().len(), 2);
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.directives_attempted, 2);
    assert_eq!(outcome.directives_succeeded, 1);
    assert_eq!(outcome.messages_deleted, 1);
}

#[tokio::test]
async fn cleanup_all_targets_corporate_senders_only() {
    let dir = TempDir::new().unwrap();
    let mailbox = shop_mailbox();
    mailbox.add("INBOX", old(), "friend@home.example", "Lunch?", None);
    let app = app(&dir, &mailbox, &Recorder::default()).await;
    app.classify("news@shop.example", Tier::Approved).await.unwrap();

    let report = app.cleanup(CleanupTarget::All, false).await.unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].sender, sender("news@shop.example"));
    assert_eq!(report.messages_deleted(), 3);
    assert_eq!(mailbox.count_from("friend@home.example"), 1);

    let rescan = app.scan(None, None).await;
    assert!(rescan.corporate_senders.is_empty());
    assert_eq!(rescan.unknown.len(), 1);
}

#[tokio::test]
async fn safelisted_cleanup_keeps_oneoff_entries() {
    let dir = TempDir::new().unwrap();
    let mailbox = shop_mailbox();
    let app = app(&dir, &mailbox, &Recorder::default()).await;
    app.classify("news@shop.example", Tier::Oneoff).await.unwrap();

    let report = app.cleanup(CleanupTarget::Safelisted, true).await.unwrap();

    assert_eq!(report.oneoff_outcomes().count(), 1);
    assert_eq!(report.messages_deleted(), 3);
    let stored = std::fs::read_to_string(dir.path().join("oneoff.json")).unwrap();
    assert!(stored.contains("news@shop.example"));
}

#[tokio::test]
async fn whitelisted_target_is_skipped() {
    let dir = TempDir::new().unwrap();
    let mailbox = shop_mailbox();
    let app = app(&dir, &mailbox, &Recorder::default()).await;
    app.classify("shop.example", Tier::Whitelist).await.unwrap();

    let report = app
        .cleanup(CleanupTarget::Senders(vec!["news@shop.example".into()]), false)
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].skipped, Some(SkipReason::Whitelisted));
    assert_eq!(mailbox.count_from("news@shop.example"), 3);
}

#[tokio::test]
async fn invalid_cleanup_target_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, &Mailbox::default(), &Recorder::default()).await;

    let result = app
        .cleanup(CleanupTarget::Senders(vec!["shop.example".into()]), false)
        .await;
    assert!(result.is_err());
}

// ============================================================================
// Suggestions
// ============================================================================

#[tokio::test]
async fn accepted_suggestion_is_applied_like_a_decision() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("sender_suggestions.json"),
        r#"{
            "news@shop.example": {"suggestion": "approved", "reason": "weekly promo", "timestamp": "2024-05-01T08:30:00"},
            "gone@old.example": {"suggestion": "oneoff", "reason": "not in mailbox"}
        }"#,
    )
    .unwrap();
    let app = app(&dir, &shop_mailbox(), &Recorder::default()).await;

    let scan = app.scan(None, None).await;
    let pending = app.suggestions_for(&scan).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].suggested_tier, Some(Tier::Approved));

    let applied = app.accept("news@shop.example").await.unwrap();
    assert_eq!(applied.tier, Tier::Approved);

    let rescan = app.scan(None, None).await;
    assert!(rescan.corporate_senders.contains(&sender("news@shop.example")));
}
