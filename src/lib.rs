//! listsweep - bulk sender classification and unsubscribe engine
//!
//! This crate scans IMAP mailboxes for bulk senders, classifies them against
//! a file-backed safelist, and for senders marked for cleanup executes their
//! `List-Unsubscribe` directives and deletes their mail.

pub mod app;
pub mod config;
pub mod domain;
pub mod providers;
pub mod services;
pub mod storage;

pub use app::{App, CleanupTarget, EngineError};
