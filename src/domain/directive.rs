//! Unsubscribe directives parsed from `List-Unsubscribe` headers.
//!
//! The header carries a comma-separated list of angle-bracketed URIs
//! (RFC 2369). Only `http(s)` and `mailto:` URIs are understood; anything
//! else is reported as a parse error and skipped.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Subject used for mail directives that carry no `subject=` parameter.
pub const DEFAULT_SUBJECT: &str = "Unsubscribe";

/// A single unsubscribe action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UnsubscribeDirective {
    /// Visit the URL with a GET request.
    Http {
        /// Target URL.
        url: String,
    },
    /// Send an empty message to the address.
    Mailto {
        /// Recipient address.
        address: String,
        /// Subject line for the outgoing message.
        subject: String,
    },
}

/// A token in the header that could not be turned into a directive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveParseError {
    /// A `<` without a matching `>`.
    #[error("unterminated token: {0}")]
    Unterminated(String),

    /// Neither `http` nor `mailto:`.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// An `http` token that is not a valid http(s) URL.
    #[error("invalid url {token}: {reason}")]
    InvalidUrl {
        /// The offending token.
        token: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A `mailto:` token without a usable recipient.
    #[error("mailto without recipient: {0}")]
    MissingRecipient(String),
}

/// Result of parsing one header value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDirectives {
    /// Directives in header order.
    pub directives: Vec<UnsubscribeDirective>,
    /// Tokens that were skipped.
    pub errors: Vec<DirectiveParseError>,
}

impl UnsubscribeDirective {
    /// Parses a single bracket-free token.
    pub fn from_token(token: &str) -> Result<Self, DirectiveParseError> {
        let lower = token.to_ascii_lowercase();

        if lower.starts_with("mailto:") {
            return parse_mailto(token);
        }

        if lower.starts_with("http") {
            let url = Url::parse(token).map_err(|e| DirectiveParseError::InvalidUrl {
                token: token.to_string(),
                reason: e.to_string(),
            })?;
            return match url.scheme() {
                "http" | "https" => Ok(UnsubscribeDirective::Http {
                    url: token.to_string(),
                }),
                other => Err(DirectiveParseError::InvalidUrl {
                    token: token.to_string(),
                    reason: format!("scheme {} is not http(s)", other),
                }),
            };
        }

        Err(DirectiveParseError::UnsupportedScheme(token.to_string()))
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UnsubscribeDirective::Http { .. } => "http",
            UnsubscribeDirective::Mailto { .. } => "mailto",
        }
    }

    /// URL or recipient, for logs and reports.
    pub fn target(&self) -> &str {
        match self {
            UnsubscribeDirective::Http { url } => url,
            UnsubscribeDirective::Mailto { address, .. } => address,
        }
    }
}

fn parse_mailto(token: &str) -> Result<UnsubscribeDirective, DirectiveParseError> {
    let rest = &token["mailto:".len()..];
    let (address, query) = match rest.split_once('?') {
        Some((address, query)) => (address, query),
        None => (rest, ""),
    };

    let address = address.trim();
    if !address.contains('@') {
        return Err(DirectiveParseError::MissingRecipient(token.to_string()));
    }

    let subject = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key.eq_ignore_ascii_case("subject"))
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

    Ok(UnsubscribeDirective::Mailto {
        address: address.to_string(),
        subject,
    })
}

/// Parses a raw `List-Unsubscribe` header value.
///
/// Text outside angle brackets is ignored. Whitespace inside brackets
/// (left over from header folding) is removed before a token is parsed.
pub fn parse_list_unsubscribe(header: &str) -> ParsedDirectives {
    let mut parsed = ParsedDirectives::default();
    let mut rest = header;

    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            parsed
                .errors
                .push(DirectiveParseError::Unterminated(after.trim().to_string()));
            break;
        };

        let token: String = after[..end].chars().filter(|c| !c.is_whitespace()).collect();
        rest = &after[end + 1..];

        if token.is_empty() {
            continue;
        }

        match UnsubscribeDirective::from_token(&token) {
            Ok(directive) => parsed.directives.push(directive),
            Err(e) => parsed.errors.push(e),
        }
    }

    parsed
}
