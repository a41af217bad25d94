//! Network-backed unsubscribe transport.
//!
//! HTTP directives go through a shared `reqwest` client with a request
//! timeout; mail directives go through [`SmtpSender`].

use std::time::Duration;

use async_trait::async_trait;

use super::{DirectiveError, UnsubscribeTransport};
use crate::domain::Account;
use crate::providers::email::{SmtpError, SmtpSender};

/// User agent sent with HTTP unsubscribe requests.
const USER_AGENT: &str = concat!("listsweep/", env!("CARGO_PKG_VERSION"));

/// Executes directives with `reqwest` and `lettre`.
#[derive(Debug, Clone)]
pub struct NetworkTransport {
    http: reqwest::Client,
    smtp: SmtpSender,
}

impl NetworkTransport {
    /// Creates a transport with separate HTTP and SMTP timeouts.
    pub fn new(http_timeout: Duration, smtp_timeout: Duration) -> Result<Self, DirectiveError> {
        let http = reqwest::Client::builder()
            .timeout(http_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DirectiveError::Http(format!("client setup failed: {}", e)))?;

        Ok(Self {
            http,
            smtp: SmtpSender::new(smtp_timeout),
        })
    }
}

#[async_trait]
impl UnsubscribeTransport for NetworkTransport {
    async fn visit(&self, url: &str) -> Result<u16, DirectiveError> {
        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DirectiveError::Timeout(url.to_string())
            } else {
                DirectiveError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(DirectiveError::Http(format!("{} returned {}", url, status)));
        }
        Ok(status.as_u16())
    }

    async fn send_mail(
        &self,
        account: &Account,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DirectiveError> {
        self.smtp
            .send(account, to, subject, body)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                SmtpError::InvalidAddress { address, .. } => DirectiveError::InvalidAddress(address),
                other => DirectiveError::Smtp(other.to_string()),
            })
    }
}
