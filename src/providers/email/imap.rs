//! IMAP connector implementation.
//!
//! This module provides [`MailboxConnector`] and [`MailboxSession`]
//! implementations over implicit-TLS IMAP using `async-imap`.
//!
//! # Protocol Details
//!
//! - Uses IMAP4rev1 (RFC 3501) via `async-imap`
//! - Only UID commands are issued, so results stay valid across expunges
//! - Headers are fetched with `BODY.PEEK[HEADER.FIELDS (...)]`, which never
//!   transfers bodies and never sets `\Seen`
//! - Every command is bounded by the configured timeout

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::StreamExt;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use super::{HeaderField, MailboxConnector, MailboxSession, MessageHeaders, ProviderError, Result};
use crate::domain::{Account, AccountId, MessageUid};

/// Type alias for the IMAP session with TLS (using tokio-util compat layer).
type TlsImapSession = async_imap::Session<Compat<TlsStream<TcpStream>>>;

/// Opens IMAP sessions over implicit TLS.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    timeout: Duration,
}

impl ImapConnector {
    /// Creates a connector whose commands time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Establishes TLS connection to the IMAP server with futures compat wrapper.
    async fn connect_tls(&self, account: &Account) -> Result<Compat<TlsStream<TcpStream>>> {
        let host = &account.servers.imap_host;
        let port = account.servers.imap_port;

        let tcp_stream = with_timeout(self.timeout, "TCP connect", async {
            TcpStream::connect((host.as_str(), port))
                .await
                .map_err(|e| ProviderError::Connection(format!("TCP connect failed: {}", e)))
        })
        .await?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| ProviderError::Connection(format!("TLS config error: {}", e)))?
            .with_root_certificates(RootCertStore::from_iter(
                webpki_roots::TLS_SERVER_ROOTS.iter().cloned(),
            ))
            .with_no_client_auth();

        let connector = TlsConnector::from(Arc::new(config));
        let server_name = ServerName::try_from(host.clone())
            .map_err(|e| ProviderError::Connection(format!("invalid server name: {}", e)))?;

        let tls_stream = with_timeout(self.timeout, "TLS handshake", async {
            connector
                .connect(server_name, tcp_stream)
                .await
                .map_err(|e| ProviderError::Connection(format!("TLS handshake failed: {}", e)))
        })
        .await?;

        // Wrap with tokio-util compat layer for futures async read/write traits
        Ok(tls_stream.compat())
    }
}

#[async_trait]
impl MailboxConnector for ImapConnector {
    async fn connect(&self, account: &Account) -> Result<Box<dyn MailboxSession>> {
        let tls_stream = self.connect_tls(account).await?;
        let client = async_imap::Client::new(tls_stream);

        let session = with_timeout(self.timeout, "LOGIN", async {
            client
                .login(&account.address, account.credential.expose())
                .await
                .map_err(|e| ProviderError::Authentication(format!("IMAP login failed: {}", e.0)))
        })
        .await?;

        tracing::info!(account = %account.id, host = %account.servers.imap_host, "IMAP session opened");

        Ok(Box::new(ImapSession {
            account_id: account.id.clone(),
            session,
            timeout: self.timeout,
        }))
    }
}

/// One authenticated IMAP session.
pub struct ImapSession {
    account_id: AccountId,
    session: TlsImapSession,
    timeout: Duration,
}

impl ImapSession {
    /// Consumes a stream to completion.
    async fn drain_stream<T, E>(
        stream: impl futures::Stream<Item = std::result::Result<T, E>>,
    ) -> std::result::Result<(), E> {
        futures::pin_mut!(stream);
        while let Some(result) = stream.next().await {
            result?;
        }
        Ok(())
    }

    async fn uid_search(&mut self, query: &str) -> Result<Vec<MessageUid>> {
        let timeout = self.timeout;
        let session = &mut self.session;
        let uids = with_timeout(timeout, "SEARCH", async {
            session
                .uid_search(query)
                .await
                .map_err(|e| command_error("SEARCH", e))
        })
        .await?;

        let mut uids: Vec<MessageUid> = uids.into_iter().map(MessageUid).collect();
        uids.sort();
        Ok(uids)
    }
}

#[async_trait]
impl MailboxSession for ImapSession {
    async fn select_folder(&mut self, folder: &str) -> Result<()> {
        let timeout = self.timeout;
        let session = &mut self.session;
        with_timeout(timeout, "SELECT", async {
            session
                .select(folder)
                .await
                .map(|_| ())
                .map_err(|e| select_error(folder, e))
        })
        .await
    }

    async fn search_before(&mut self, date: NaiveDate) -> Result<Vec<MessageUid>> {
        self.uid_search(&format!("BEFORE {}", imap_date(date))).await
    }

    async fn search_from(&mut self, sender: &str) -> Result<Vec<MessageUid>> {
        if sender.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("empty sender".to_string()));
        }
        self.uid_search(&format!("FROM {}", quote(sender))).await
    }

    async fn fetch_headers(
        &mut self,
        uids: &[MessageUid],
        fields: &[HeaderField],
    ) -> Result<Vec<(MessageUid, MessageHeaders)>> {
        if uids.is_empty() {
            return Ok(vec![]);
        }

        let query = fetch_query(fields);
        let uid_seq = uid_set(uids);
        let timeout = self.timeout;
        let account_id = &self.account_id;
        let session = &mut self.session;

        with_timeout(timeout, "FETCH", async {
            let fetches = session
                .uid_fetch(&uid_seq, &query)
                .await
                .map_err(|e| command_error("FETCH", e))?;
            futures::pin_mut!(fetches);

            let mut headers = Vec::with_capacity(uids.len());
            while let Some(fetch_result) = fetches.next().await {
                let fetch = match fetch_result {
                    Ok(fetch) => fetch,
                    Err(e) => {
                        tracing::warn!(account = %account_id, error = %e, "Skipping unreadable FETCH response");
                        continue;
                    }
                };
                let Some(uid) = fetch.uid else {
                    continue;
                };
                let parsed = fetch
                    .header()
                    .and_then(MessageHeaders::parse)
                    .unwrap_or_default();
                headers.push((MessageUid(uid), parsed));
            }

            headers.sort_by_key(|(uid, _)| *uid);
            Ok(headers)
        })
        .await
    }

    async fn mark_deleted(&mut self, uids: &[MessageUid]) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }

        let uid_seq = uid_set(uids);
        let timeout = self.timeout;
        let session = &mut self.session;
        with_timeout(timeout, "STORE", async {
            let store_stream = session
                .uid_store(&uid_seq, "+FLAGS.SILENT (\\Deleted)")
                .await
                .map_err(|e| command_error("STORE", e))?;
            Self::drain_stream(store_stream)
                .await
                .map_err(|e| command_error("STORE", e))
        })
        .await
    }

    async fn expunge(&mut self) -> Result<()> {
        let timeout = self.timeout;
        let session = &mut self.session;
        with_timeout(timeout, "EXPUNGE", async {
            let expunge_stream = session
                .expunge()
                .await
                .map_err(|e| command_error("EXPUNGE", e))?;
            Self::drain_stream(expunge_stream)
                .await
                .map_err(|e| command_error("EXPUNGE", e))
        })
        .await
    }

    async fn close(&mut self) -> Result<()> {
        let timeout = self.timeout;
        let session = &mut self.session;
        with_timeout(timeout, "LOGOUT", async {
            session
                .logout()
                .await
                .map_err(|e| ProviderError::Connection(format!("LOGOUT failed: {}", e)))
        })
        .await?;

        tracing::debug!(account = %self.account_id, "IMAP session closed");
        Ok(())
    }
}

/// Runs `fut`, mapping an elapsed deadline to [`ProviderError::Timeout`].
async fn with_timeout<T>(
    timeout: Duration,
    command: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(format!(
            "{} after {}s",
            command,
            timeout.as_secs()
        ))),
    }
}

/// IMAP date in `DD-Mon-YYYY` form.
/// Maps a failed command. Transport failures are connection errors.
fn command_error(command: &str, e: async_imap::error::Error) -> ProviderError {
    use async_imap::error::Error;
    match e {
        Error::Io(e) => ProviderError::Connection(format!("{} failed: {}", command, e)),
        Error::ConnectionLost => {
            ProviderError::Connection(format!("{} failed: connection lost", command))
        }
        e => ProviderError::Protocol(format!("{} failed: {}", command, e)),
    }
}

/// A `NO` or `BAD` answer to SELECT means the folder is unusable.
fn select_error(folder: &str, e: async_imap::error::Error) -> ProviderError {
    use async_imap::error::Error;
    match e {
        Error::No(msg) | Error::Bad(msg) => {
            ProviderError::FolderNotFound(format!("{}: {}", folder, msg))
        }
        e => command_error("SELECT", e),
    }
}

fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

/// Quotes a string for use as an IMAP quoted string in a search key.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Comma-separated UID set.
fn uid_set(uids: &[MessageUid]) -> String {
    uids.iter()
        .map(|u| u.0.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// `FETCH` attribute list for the requested header fields.
fn fetch_query(fields: &[HeaderField]) -> String {
    let names = fields
        .iter()
        .map(|f| f.imap_name())
        .collect::<Vec<_>>()
        .join(" ");
    format!("(UID BODY.PEEK[HEADER.FIELDS ({})])", names)
}
