//! `dreamer` — command-line front end for the dream journal.
//!
//! # Usage
//!
//! ```
//! dreamer new "I was walking along a river at night" --mood uneasy
//! dreamer element add <DREAM_ID> --kind place --label river
//! dreamer show <DREAM_ID>
//! dreamer --config ~/.config/dreamer/dreamer.toml watch <DREAM_ID>
//! ```
//!
//! Results are printed to stdout as pretty JSON; logs go to stderr.

mod commands;
mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use dreamer_core::repo::Repository;
use dreamer_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{
  commands::{App, Command},
  config::Settings,
};

#[derive(Parser)]
#[command(name = "dreamer", author, version, about = "Record, annotate, and interpret dreams")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "dreamer.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  if let Some(dir) = settings.store_path.parent()
    && !dir.as_os_str().is_empty()
  {
    std::fs::create_dir_all(dir)
      .with_context(|| format!("failed to create store directory {dir:?}"))?;
  }
  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;

  let app = App {
    repo:             Repository::new(Arc::new(store)),
    uid:              settings.user_id,
    hypothesis_count: settings.hypothesis_count,
  };
  app
    .repo
    .touch_user(&app.uid)
    .await
    .context("failed to record user visit")?;

  let outcome = commands::run(cli.command, &app).await;
  app.repo.store().close().await.context("failed to close store")?;
  outcome
}
