//! Command-line actions.
//!
//! Every action maps onto one engine entry point: `scan` reads,
//! `cleanup` acts, `classify` and `accept` write decisions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::Tier;

#[derive(Parser, Debug)]
#[command(name = "listsweep", version, about = "Classify bulk senders, unsubscribe and purge")]
pub struct Cli {
    /// Settings file. Defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Print reports as JSON.
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan mailboxes and report unknown and corporate senders.
    Scan {
        /// Retention window in days.
        #[arg(long)]
        days: Option<u32>,
        /// Cap on messages processed per folder.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Unsubscribe from senders and delete their mail.
    Cleanup(CleanupArgs),
    /// Add a sender or domain to a tier.
    Classify {
        /// Sender address or domain.
        key: String,
        /// whitelist, approved, oneoff or blacklist.
        tier: Tier,
    },
    /// List cached suggestions for senders that are still unknown.
    Suggestions,
    /// Apply the cached suggestion for a sender.
    Accept {
        sender: String,
    },
    /// Scan and mail a digest of unknown senders.
    Digest,
    /// Store an account password (read from stdin) in the OS keychain.
    SetPassword {
        account: String,
    },
}

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Senders to clean up.
    #[arg(conflicts_with_all = ["all", "safelisted"])]
    pub senders: Vec<String>,
    /// Scan first, then clean up every corporate sender.
    #[arg(long, conflicts_with = "safelisted")]
    pub all: bool,
    /// Clean up every stored approved and one-off sender.
    #[arg(long)]
    pub safelisted: bool,
    /// Delete without executing unsubscribe directives.
    #[arg(long)]
    pub no_unsubscribe: bool,
}
