//! File Ledger Store - Atomic Whole-File JSON Persistence
//!
//! Keeps the ledger as a pretty-printed JSON array in a single file.
//! Writes go to a temporary sibling first and are then renamed over the
//! target, so the file is always either the old or the new ledger.
//!
//! The revision marker is a hash of the file contents. A write whose
//! expected revision no longer matches the file on disk is refused,
//! which guards against two journal sessions sharing one file.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::domain::ledger::{IdStyle, Ledger};
use crate::domain::trade::Trade;
use crate::ports::store::{LedgerStore, Revision, Snapshot, StoreError};

/// Local JSON file implementing the `LedgerStore` port.
pub struct FileLedgerStore {
    /// Path to the ledger file.
    path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
}

impl FileLedgerStore {
    /// Create a store for `path`, creating its parent directory if needed.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        }

        let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        Ok(Self { path, tmp_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current revision of the file on disk, `None` if it does not exist.
    async fn current_revision(&self) -> Result<Option<Revision>, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content_revision(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch(&self) -> Result<Snapshot, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let ledger = Ledger::load_json_str(&content, IdStyle::Sequential)
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        debug!(count = ledger.len(), "Ledger file read");

        Ok(Snapshot {
            trades: ledger.into_trades(),
            revision: Some(content_revision(&content)),
        })
    }

    #[instrument(skip(self, trades), fields(path = %self.path.display(), count = trades.len()))]
    async fn store(
        &self,
        trades: &[Trade],
        expected: Option<Revision>,
    ) -> Result<Revision, StoreError> {
        let current = self.current_revision().await?;
        if current != expected {
            return Err(StoreError::Conflict(format!(
                "{} changed on disk (expected {}, found {})",
                self.path.display(),
                describe_revision(expected.as_ref()),
                describe_revision(current.as_ref()),
            )));
        }

        let json = serde_json::to_string_pretty(trades)
            .map_err(|e| StoreError::Malformed(format!("failed to serialize ledger: {e}")))?;

        // Write to tmp file
        fs::write(&self.tmp_path, &json).await?;

        // Atomic rename
        fs::rename(&self.tmp_path, &self.path).await?;

        let revision = content_revision(&json);
        info!(revision = %revision, "Ledger file written");
        Ok(revision)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn is_healthy(&self) -> bool {
        match fs::metadata(&self.path).await {
            Ok(meta) => meta.is_file(),
            // First run is OK as long as the directory is there.
            Err(_) => self
                .path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .is_none_or(Path::exists),
        }
    }
}

fn describe_revision(revision: Option<&Revision>) -> String {
    revision.map_or_else(|| "no file".to_string(), ToString::to_string)
}

/// Hash of the file contents, rendered as hex.
fn content_revision(content: &str) -> Revision {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    Revision(format!("{:016x}", hasher.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::Side;
    use rust_decimal_macros::dec;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("trade-journal-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let store = FileLedgerStore::new(scratch_path("trades.json")).await.unwrap();
        assert!(matches!(store.fetch().await, Err(StoreError::NotFound(_))));
        assert!(store.is_healthy().await);
    }

    #[tokio::test]
    async fn test_store_then_fetch_preserves_values() {
        let store = FileLedgerStore::new(scratch_path("trades.json")).await.unwrap();
        let mut t = Trade::new("Trade1", "2024-01-01 10:00:00", "BTCUSDT", Side::Long, dec!(12.5));
        t.note = Some("größer als erwartet".into());

        let rev = store.store(&[t.clone()], None).await.unwrap();
        let snap = store.fetch().await.unwrap();

        assert_eq!(snap.trades, vec![t]);
        assert_eq!(snap.revision, Some(rev));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("größer"), "non-ASCII text is written verbatim");
    }

    #[tokio::test]
    async fn test_stale_revision_is_rejected() {
        let store = FileLedgerStore::new(scratch_path("trades.json")).await.unwrap();
        let first = store.store(&[], None).await.unwrap();

        let t = Trade::new("Trade1", "", "BTC", Side::Long, dec!(1));
        store.store(&[t.clone()], Some(first.clone())).await.unwrap();

        let err = store.store(&[t], Some(first)).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_repeated_ids_load_relabelled() {
        let path = scratch_path("trades.json");
        let store = FileLedgerStore::new(&path).await.unwrap();
        std::fs::write(
            &path,
            r#"[{"id": "Trade1", "pair": "BTCUSDT", "pnl": 5},
               {"id": "Trade2", "pair": "SOLUSDT", "pnl": -2},
               {"id": "Trade2", "pair": "ETHUSDT", "pnl": 7}]"#,
        )
        .unwrap();

        let snap = store.fetch().await.unwrap();
        let ids: Vec<_> = snap.trades.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["Trade1", "Trade2", "Trade4"]);
        assert_eq!(snap.trades[2].pair, "ETHUSDT");
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let path = scratch_path("trades.json");
        let store = FileLedgerStore::new(&path).await.unwrap();
        std::fs::write(&path, "{\"not\": \"a list\"}").unwrap();
        assert!(matches!(store.fetch().await, Err(StoreError::Malformed(_))));
    }
}
