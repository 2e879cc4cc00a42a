//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, StorageBackend};
use crate::domain::export::parse_delimiter;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    name = %config.journal.name,
    backend = ?config.storage.backend,
    timezone = %config.journal.timezone,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - A known IANA timezone
/// - A positive trend window
/// - Complete remote settings when the remote backend is selected
/// - A supported CSV delimiter
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.journal.name.trim().is_empty(),
    "journal.name must not be empty"
  );

  config.timezone()?;

  anyhow::ensure!(
    config.journal.trend_window_days > 0,
    "journal.trend_window_days must be positive, got {}",
    config.journal.trend_window_days
  );

  match config.storage.backend {
    StorageBackend::File => {
      anyhow::ensure!(
        !config.storage.file.path.trim().is_empty(),
        "storage.file.path must not be empty"
      );
    }
    StorageBackend::Remote => {
      let remote = config
        .storage
        .remote
        .as_ref()
        .context("storage.backend = \"remote\" requires a [storage.remote] section")?;

      anyhow::ensure!(!remote.owner.is_empty(), "storage.remote.owner must not be empty");
      anyhow::ensure!(!remote.repo.is_empty(), "storage.remote.repo must not be empty");
      anyhow::ensure!(!remote.path.is_empty(), "storage.remote.path must not be empty");
      anyhow::ensure!(
        remote.api_url.starts_with("http://") || remote.api_url.starts_with("https://"),
        "storage.remote.api_url must be an http(s) URL, got {}",
        remote.api_url
      );
      anyhow::ensure!(
        remote.timeout_ms > 0,
        "storage.remote.timeout_ms must be positive"
      );
    }
  }

  anyhow::ensure!(
    parse_delimiter(&config.export.csv_delimiter).is_some(),
    "export.csv_delimiter must be ',', ';' or 'tab', got {:?}",
    config.export.csv_delimiter
  );

  anyhow::ensure!(
    !config.server.bind_address.is_empty(),
    "server.bind_address must not be empty"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ledger::IdStyle;

  const MINIMAL: &str = r#"
    [journal]
    name = "QuantumTrading"

    [storage]
    backend = "file"
  "#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = parse_config(MINIMAL).unwrap();
    assert_eq!(config.journal.timezone, "Europe/Berlin");
    assert_eq!(config.journal.id_style, IdStyle::Sequential);
    assert_eq!(config.journal.trend_window_days, 30);
    assert_eq!(config.storage.file.path, "trades.json");
    assert_eq!(config.server.bind_address, "127.0.0.1:8080");
    assert_eq!(config.export.csv_delimiter, ",");
  }

  #[test]
  fn test_unknown_timezone_rejected() {
    let toml = MINIMAL.replace(
      "name = \"QuantumTrading\"",
      "name = \"QuantumTrading\"\ntimezone = \"Mars/Olympus\"",
    );
    assert!(parse_config(&toml).is_err());
  }

  #[test]
  fn test_remote_backend_requires_section() {
    let toml = MINIMAL.replace("backend = \"file\"", "backend = \"remote\"");
    let err = parse_config(&toml).unwrap_err();
    assert!(err.to_string().contains("[storage.remote]"));
  }

  #[test]
  fn test_remote_backend_full() {
    let toml = r#"
      [journal]
      name = "QuantumTrading"
      id_style = "token"

      [storage]
      backend = "remote"

      [storage.remote]
      owner = "me"
      repo = "journal-data"

      [export]
      csv_delimiter = ";"
    "#;
    let config = parse_config(toml).unwrap();
    let remote = config.storage.remote.unwrap();
    assert_eq!(remote.api_url, "https://api.github.com");
    assert_eq!(remote.branch, "main");
    assert_eq!(remote.token_env, "JOURNAL_REMOTE_TOKEN");
    assert_eq!(config.journal.id_style, IdStyle::Token);
  }

  #[test]
  fn test_bad_delimiter_rejected() {
    let toml = format!("{MINIMAL}\n[export]\ncsv_delimiter = \"|\"\n");
    assert!(parse_config(&toml).is_err());
  }
}
