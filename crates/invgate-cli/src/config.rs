//! Layered CLI configuration: config file, then `INVGATE_*` environment,
//! then command-line flags.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use invgate_client::{ApiConfig, DEFAULT_API_URL};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
  #[serde(default = "default_api_url")]
  pub api_url:      String,
  #[serde(default = "default_store_path")]
  pub store_path:   PathBuf,
  /// Request timeout in seconds.
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_api_url() -> String { DEFAULT_API_URL.to_string() }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/invgate/session.db") }

fn default_timeout_secs() -> u64 { 30 }

impl Default for CliConfig {
  fn default() -> Self {
    Self {
      api_url:      default_api_url(),
      store_path:   default_store_path(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl CliConfig {
  /// Read the optional config file and the `INVGATE_` environment
  /// (`INVGATE_API_URL`, `INVGATE_STORE_PATH`, `INVGATE_TIMEOUT_SECS`).
  pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
    Self::load_with(file, config::Environment::with_prefix("INVGATE"))
  }

  fn load_with(file: Option<&Path>, env: config::Environment) -> anyhow::Result<Self> {
    let mut builder = config::Config::builder();
    if let Some(file) = file {
      builder = builder.add_source(config::File::from(file).required(true));
    }
    builder
      .add_source(env)
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise configuration")
  }

  pub fn api(&self) -> ApiConfig {
    ApiConfig {
      base_url: self.api_url.clone(),
      timeout:  Duration::from_secs(self.timeout_secs),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
