//! In-memory mailbox used by service tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{Account, Credential, MessageUid, ServerConfig};
use crate::providers::email::{
    HeaderField, MailboxConnector, MailboxSession, MessageHeaders, ProviderError, Result,
};

pub fn account(id: &str) -> Account {
    Account::new(
        id,
        format!("me@{}.example", id),
        Credential::new("secret"),
        ServerConfig::tls(format!("imap.{}.example", id), format!("smtp.{}.example", id)),
    )
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[derive(Debug, Clone)]
pub struct FakeMessage {
    pub uid: MessageUid,
    pub date: NaiveDate,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub list_unsubscribe: Option<String>,
    pub deleted: bool,
}

#[derive(Debug, Default)]
pub struct MailboxState {
    /// account id -> folder -> messages
    pub folders: BTreeMap<String, BTreeMap<String, Vec<FakeMessage>>>,
    pub reject_login: HashSet<String>,
    /// (account, folder) pairs whose SELECT fails with a dropped connection
    pub drop_on_select: HashSet<(String, String)>,
    pub expunges: Vec<(String, String)>,
    pub next_uid: u32,
}

/// Connector over shared in-memory folders.
#[derive(Debug, Clone, Default)]
pub struct FakeMailbox {
    pub state: Arc<Mutex<MailboxState>>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        account: &str,
        folder: &str,
        date: NaiveDate,
        from: &str,
        subject: &str,
        list_unsubscribe: Option<&str>,
    ) -> MessageUid {
        let mut state = self.state.lock().unwrap();
        state.next_uid += 1;
        let uid = MessageUid(state.next_uid);
        state
            .folders
            .entry(account.to_string())
            .or_default()
            .entry(folder.to_string())
            .or_default()
            .push(FakeMessage {
                uid,
                date,
                from: Some(from.to_string()).filter(|f| !f.is_empty()),
                subject: Some(subject.to_string()),
                list_unsubscribe: list_unsubscribe.map(String::from),
                deleted: false,
            });
        uid
    }

    pub fn reject_login(&self, account: &str) {
        self.state
            .lock()
            .unwrap()
            .reject_login
            .insert(account.to_string());
    }

    pub fn drop_connection_on(&self, account: &str, folder: &str) {
        self.state
            .lock()
            .unwrap()
            .drop_on_select
            .insert((account.to_string(), folder.to_string()));
    }

    pub fn remaining(&self, account: &str, folder: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .folders
            .get(account)
            .and_then(|f| f.get(folder))
            .map(|m| m.len())
            .unwrap_or(0)
    }

    pub fn expunges(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().expunges.clone()
    }
}

#[async_trait]
impl MailboxConnector for FakeMailbox {
    async fn connect(&self, account: &Account) -> Result<Box<dyn MailboxSession>> {
        if self.state.lock().unwrap().reject_login.contains(&account.id.0) {
            return Err(ProviderError::Authentication("invalid credentials".into()));
        }
        Ok(Box::new(FakeSession {
            account: account.id.0.clone(),
            state: self.state.clone(),
            selected: None,
        }))
    }
}

pub struct FakeSession {
    account: String,
    state: Arc<Mutex<MailboxState>>,
    selected: Option<String>,
}

impl FakeSession {
    fn with_folder<T>(&self, f: impl FnOnce(&mut Vec<FakeMessage>) -> T) -> Result<T> {
        let folder = self
            .selected
            .clone()
            .ok_or_else(|| ProviderError::InvalidRequest("no folder selected".into()))?;
        let mut state = self.state.lock().unwrap();
        let messages = state
            .folders
            .get_mut(&self.account)
            .and_then(|f| f.get_mut(&folder))
            .ok_or(ProviderError::FolderNotFound(folder))?;
        Ok(f(messages))
    }
}

#[async_trait]
impl MailboxSession for FakeSession {
    async fn select_folder(&mut self, folder: &str) -> Result<()> {
        let state = self.state.lock().unwrap();
        if state
            .drop_on_select
            .contains(&(self.account.clone(), folder.to_string()))
        {
            return Err(ProviderError::Connection("connection lost".into()));
        }
        let exists = state
            .folders
            .get(&self.account)
            .is_some_and(|f| f.contains_key(folder));
        drop(state);
        if !exists {
            return Err(ProviderError::FolderNotFound(folder.to_string()));
        }
        self.selected = Some(folder.to_string());
        Ok(())
    }

    async fn search_before(&mut self, date: NaiveDate) -> Result<Vec<MessageUid>> {
        self.with_folder(|messages| {
            messages
                .iter()
                .filter(|m| m.date < date)
                .map(|m| m.uid)
                .collect()
        })
    }

    async fn search_from(&mut self, sender: &str) -> Result<Vec<MessageUid>> {
        let needle = sender.to_lowercase();
        self.with_folder(|messages| {
            messages
                .iter()
                .filter(|m| {
                    m.from
                        .as_deref()
                        .is_some_and(|f| f.to_lowercase().contains(&needle))
                })
                .map(|m| m.uid)
                .collect()
        })
    }

    async fn fetch_headers(
        &mut self,
        uids: &[MessageUid],
        fields: &[HeaderField],
    ) -> Result<Vec<(MessageUid, MessageHeaders)>> {
        let wanted: BTreeSet<MessageUid> = uids.iter().copied().collect();
        self.with_folder(|messages| {
            messages
                .iter()
                .filter(|m| wanted.contains(&m.uid))
                .map(|m| {
                    let mut headers = MessageHeaders::default();
                    for field in fields {
                        match field {
                            HeaderField::From => headers.from = m.from.clone(),
                            HeaderField::Subject => headers.subject = m.subject.clone(),
                            HeaderField::ListUnsubscribe => {
                                headers.list_unsubscribe = m.list_unsubscribe.clone()
                            }
                        }
                    }
                    (m.uid, headers)
                })
                .collect()
        })
    }

    async fn mark_deleted(&mut self, uids: &[MessageUid]) -> Result<()> {
        self.with_folder(|messages| {
            for m in messages.iter_mut().filter(|m| uids.contains(&m.uid)) {
                m.deleted = true;
            }
        })
    }

    async fn expunge(&mut self) -> Result<()> {
        self.with_folder(|messages| messages.retain(|m| !m.deleted))?;
        let folder = self.selected.clone().unwrap_or_default();
        self.state
            .lock()
            .unwrap()
            .expunges
            .push((self.account.clone(), folder));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
