//! Ledger Store Port - Whole-Ledger Persistence Interface
//!
//! The journal persists the complete ledger on every mutation. Backends
//! hand out an opaque revision marker on every read and write; a write
//! carrying a stale marker must be rejected with `StoreError::Conflict`
//! rather than silently overwriting newer content.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::trade::Trade;

/// Opaque revision marker (content hash, blob sha, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision(pub String);

impl std::fmt::Display for Revision {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

/// Ledger content as read from a backend.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
  /// Trades in persisted order.
  pub trades: Vec<Trade>,
  /// Revision of the content read, if the backend tracks one.
  pub revision: Option<Revision>,
}

/// Failures a ledger backend can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The backing resource does not exist yet.
  #[error("ledger not found at {0}")]
  NotFound(String),

  /// The expected revision is stale.
  #[error("revision conflict: {0}")]
  Conflict(String),

  /// The resource exists but is not a JSON array of trade objects.
  #[error("malformed ledger content: {0}")]
  Malformed(String),

  /// Local filesystem failure.
  #[error("storage I/O error: {0}")]
  Io(#[from] std::io::Error),

  /// Remote backend failure (network, auth, unexpected status).
  #[error("storage backend error: {0}")]
  Backend(String),
}

impl StoreError {
  /// Whether re-fetching and re-applying the mutation may succeed.
  pub fn is_conflict(&self) -> bool {
    matches!(self, Self::Conflict(_))
  }
}

/// Trait for ledger persistence backends.
///
/// Implementations overwrite the whole resource on `store`; there are no
/// partial or merge writes.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
  /// Read the full ledger and its current revision.
  async fn fetch(&self) -> Result<Snapshot, StoreError>;

  /// Overwrite the ledger. `expected` is the revision the caller last
  /// read; `None` asserts the resource does not exist yet.
  async fn store(
    &self,
    trades: &[Trade],
    expected: Option<Revision>,
  ) -> Result<Revision, StoreError>;

  /// Human-readable location, used in logs and errors.
  fn describe(&self) -> String;

  /// Check whether the backend is reachable.
  async fn is_healthy(&self) -> bool;
}
