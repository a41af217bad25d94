//! listsweep - Entry point for the command-line tool

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use listsweep::app::actions::{Cli, Command};
use listsweep::app::{report, store_password};
use listsweep::config::{default_config_path, Settings};
use listsweep::storage::KeychainAccess;
use listsweep::{App, CleanupTarget};

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text(value));
    }
    Ok(())
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => default_config_path().context("no config directory; pass --config"),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let path = config_path(&cli)?;
    let settings = Settings::load(&path)?;
    tracing::debug!(path = %path.display(), accounts = settings.accounts.len(), "Settings loaded");

    if let Command::SetPassword { account } = &cli.command {
        eprintln!("Password for {}:", account);
        let mut password = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut password)
            .context("reading password from stdin")?;
        let password = password.trim_end_matches(['\r', '\n']);
        anyhow::ensure!(!password.is_empty(), "empty password");
        store_password(&settings, &KeychainAccess::new(), account, password).await?;
        return Ok(());
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, finishing current step");
                cancel.cancel();
            }
        });
    }

    let app = App::from_settings(settings, cancel).await?;

    match cli.command {
        Command::Scan { days, limit } => {
            let result = app.scan(days, limit).await;
            print(cli.json, &result, report::render_scan)?;
        }
        Command::Cleanup(args) => {
            let target = if args.all {
                CleanupTarget::All
            } else if args.safelisted {
                CleanupTarget::Safelisted
            } else {
                anyhow::ensure!(
                    !args.senders.is_empty(),
                    "name at least one sender, or pass --all or --safelisted"
                );
                CleanupTarget::Senders(args.senders)
            };
            let outcome = app.cleanup(target, args.no_unsubscribe).await?;
            print(cli.json, &outcome, report::render_cleanup)?;
        }
        Command::Classify { key, tier } => {
            let applied = app.classify(&key, tier).await?;
            print(cli.json, &applied, report::render_applied)?;
        }
        Command::Suggestions => {
            let result = app.scan(None, None).await;
            let records = app.suggestions_for(&result).await?;
            print(cli.json, &records, |r| report::render_suggestions(r))?;
        }
        Command::Accept { sender } => {
            let applied = app.accept(&sender).await?;
            print(cli.json, &applied, report::render_applied)?;
        }
        Command::Digest => {
            let (result, sent) = app.digest().await?;
            if sent {
                eprintln!("Digest sent for {} unknown senders.", result.unknown.len());
            } else {
                eprintln!("No unknown senders; no digest sent.");
            }
        }
        Command::SetPassword { .. } => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
