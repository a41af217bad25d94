//! Business services layer.
//!
//! This module contains the engine's services, coordinating between
//! providers, storage, and domain types.
//!
//! # Architecture
//!
//! Services sit between the application layer and the infrastructure layer:
//!
//! ```text
//! Application Layer (CLI, App wiring)
//!          |
//!          v
//!    Services Layer  <-- You are here
//!          |
//!          v
//! Infrastructure (Providers, Storage)
//! ```
//!
//! # Services Overview
//!
//! - [`ScannerService`]: Builds the sender map from mailbox headers
//! - [`UnsubscribeService`]: Executes unsubscribe directives and deletes mail
//! - [`ClassificationService`]: Writes decisions into the safelist
//! - [`DigestService`]: Mails a summary of unknown senders

mod classification_service;
mod digest_service;
mod scanner_service;
mod unsubscribe_service;

#[cfg(test)]
pub(crate) mod testing;

pub use classification_service::{
    normalize_key, Applied, ClassificationError, ClassificationResult, ClassificationService,
};
pub use digest_service::{DigestMessage, DigestService};
pub use scanner_service::{ScanOptions, ScannerService};
pub use unsubscribe_service::{CleanupOptions, UnsubscribeService};
