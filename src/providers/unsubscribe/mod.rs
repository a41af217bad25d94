//! Unsubscribe directive execution.
//!
//! - [`UnsubscribeTransport`] - the seam the dispatcher calls through
//! - [`NetworkTransport`] - HTTP GET via `reqwest`, mail via SMTP

mod network;
mod traits;

pub use network::NetworkTransport;
pub use traits::{DirectiveError, UnsubscribeTransport};

#[cfg(test)]
pub use traits::MockUnsubscribeTransport;
