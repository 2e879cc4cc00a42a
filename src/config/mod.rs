//! Configuration Module - TOML-based Journal Configuration
//!
//! Loads and validates configuration from `config.toml`. Secrets (the
//! remote store token) are never stored here; the config only names the
//! environment variable that holds them.

pub mod loader;

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::domain::ledger::IdStyle;

/// Top-level journal configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the server begins operation.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Journal identity and behaviour.
  pub journal: JournalConfig,
  /// Persistence backend selection.
  pub storage: StorageConfig,
  /// HTTP API server.
  #[serde(default)]
  pub server: ServerConfig,
  /// CSV / JSON export options.
  #[serde(default)]
  pub export: ExportConfig,
}

impl AppConfig {
  /// Parsed journal timezone.
  pub fn timezone(&self) -> Result<Tz> {
    Tz::from_str(&self.journal.timezone)
      .map_err(|e| anyhow::anyhow!("{e}"))
      .with_context(|| format!("Unknown timezone {:?}", self.journal.timezone))
  }
}

/// Journal identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
  /// Human-readable journal name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// IANA timezone trades are stamped and bucketed in.
  #[serde(default = "default_timezone")]
  pub timezone: String,
  /// How new trade ids are generated.
  #[serde(default)]
  pub id_style: IdStyle,
  /// Default window of the performance trend (days).
  #[serde(default = "default_trend_window")]
  pub trend_window_days: u32,
  /// Instruments offered by the new-trade form.
  #[serde(default = "default_pairs")]
  pub pairs: Vec<String>,
}

/// Which backend holds the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
  /// Local JSON file.
  File,
  /// File in a hosted repository, via its contents API.
  Remote,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
  /// Active backend.
  pub backend: StorageBackend,
  /// Local file settings (used when `backend = "file"`).
  #[serde(default)]
  pub file: FileStorageConfig,
  /// Remote settings (required when `backend = "remote"`).
  pub remote: Option<RemoteStorageConfig>,
}

/// Local JSON file backend.
#[derive(Debug, Clone, Deserialize)]
pub struct FileStorageConfig {
  /// Path of the ledger JSON file.
  #[serde(default = "default_data_file")]
  pub path: String,
}

impl Default for FileStorageConfig {
  fn default() -> Self {
    Self { path: default_data_file() }
  }
}

/// Hosted repository contents API backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteStorageConfig {
  /// API base URL.
  #[serde(default = "default_api_url")]
  pub api_url: String,
  /// Repository owner.
  pub owner: String,
  /// Repository name.
  pub repo: String,
  /// Path of the ledger file inside the repository.
  #[serde(default = "default_data_file")]
  pub path: String,
  /// Branch to read and commit to.
  #[serde(default = "default_branch")]
  pub branch: String,
  /// Environment variable holding the API token.
  #[serde(default = "default_token_env")]
  pub token_env: String,
  /// Commit message used for every ledger write.
  #[serde(default = "default_commit_message")]
  pub commit_message: String,
  /// Request timeout in milliseconds.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Retries on transient (5xx / network) failures.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
}

/// HTTP API server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Bind address of the JSON API.
  #[serde(default = "default_bind_address")]
  pub bind_address: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self { bind_address: default_bind_address() }
  }
}

/// Export configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
  /// Default CSV delimiter (`,`, `;` or `tab`).
  #[serde(default = "default_csv_delimiter")]
  pub csv_delimiter: String,
}

impl Default for ExportConfig {
  fn default() -> Self {
    Self { csv_delimiter: default_csv_delimiter() }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_timezone() -> String {
  "Europe/Berlin".to_string()
}

fn default_trend_window() -> u32 {
  30
}

fn default_pairs() -> Vec<String> {
  vec!["BTCUSDT".to_string(), "SOLUSDT".to_string()]
}

fn default_data_file() -> String {
  "trades.json".to_string()
}

fn default_api_url() -> String {
  "https://api.github.com".to_string()
}

fn default_branch() -> String {
  "main".to_string()
}

fn default_token_env() -> String {
  "JOURNAL_REMOTE_TOKEN".to_string()
}

fn default_commit_message() -> String {
  "Update trade journal".to_string()
}

fn default_timeout_ms() -> u64 {
  10_000
}

fn default_max_retries() -> u32 {
  2
}

fn default_bind_address() -> String {
  "127.0.0.1:8080".to_string()
}

fn default_csv_delimiter() -> String {
  ",".to_string()
}
