//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `DREAMER_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

const DEFAULT_STORE_PATH: &str = "~/.local/share/dreamer/dreamer.db";
const DEFAULT_USER_ID: &str = "local";
const DEFAULT_HYPOTHESIS_COUNT: i64 = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// SQLite database file. A leading `~` is expanded.
  pub store_path:       PathBuf,
  /// Owner of every record this process reads or writes.
  pub user_id:          String,
  /// Hypotheses produced per interpretation; clamped to 2..=3 when used.
  pub hypothesis_count: usize,
}

impl Settings {
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .set_default("store_path", DEFAULT_STORE_PATH)?
      .set_default("user_id", DEFAULT_USER_ID)?
      .set_default("hypothesis_count", DEFAULT_HYPOTHESIS_COUNT)?
      .add_source(config::File::from(file.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("DREAMER"))
      .build()
      .context("failed to read config file")?;

    let mut settings: Settings = settings
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.store_path = expand_tilde(&settings.store_path);
    Ok(settings)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
