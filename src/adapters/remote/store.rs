//! Remote Ledger Store - `LedgerStore` over the Contents API
//!
//! The blob sha returned by the API is the revision marker. Writes
//! carry the sha last read, so the API itself rejects stale writes.

use async_trait::async_trait;
use tracing::{info, instrument};

use super::client::ContentsClient;
use crate::domain::ledger::{IdStyle, Ledger};
use crate::domain::trade::Trade;
use crate::ports::store::{LedgerStore, Revision, Snapshot, StoreError};

/// Remote repository file implementing the `LedgerStore` port.
pub struct RemoteLedgerStore {
  client: ContentsClient,
}

impl RemoteLedgerStore {
  pub fn new(client: ContentsClient) -> Self {
    Self { client }
  }
}

#[async_trait]
impl LedgerStore for RemoteLedgerStore {
  #[instrument(skip(self), fields(url = %self.client.file_url()))]
  async fn fetch(&self) -> Result<Snapshot, StoreError> {
    let file = self.client.get_file().await?;
    let ledger = Ledger::load_json_str(&file.body, IdStyle::Sequential)
      .map_err(|e| StoreError::Malformed(e.to_string()))?;

    info!(count = ledger.len(), sha = %file.sha, "Remote ledger fetched");

    Ok(Snapshot {
      trades: ledger.into_trades(),
      revision: Some(Revision(file.sha)),
    })
  }

  #[instrument(skip(self, trades), fields(count = trades.len()))]
  async fn store(
    &self,
    trades: &[Trade],
    expected: Option<Revision>,
  ) -> Result<Revision, StoreError> {
    let body = serde_json::to_string_pretty(trades)
      .map_err(|e| StoreError::Malformed(format!("failed to serialize ledger: {e}")))?;

    let sha = self
      .client
      .put_file(&body, expected.as_ref().map(|r| r.0.as_str()))
      .await?;

    info!(sha = %sha, "Remote ledger written");
    Ok(Revision(sha))
  }

  fn describe(&self) -> String {
    self.client.file_url()
  }

  async fn is_healthy(&self) -> bool {
    match self.client.get_file().await {
      Ok(_) | Err(StoreError::NotFound(_)) => true,
      Err(_) => false,
    }
  }
}
