//! Journal - Session-scoped Trade Ledger Service
//!
//! Owns the in-memory ledger for the lifetime of a session and keeps the
//! store authoritative: every mutation is applied, then the full ledger
//! is persisted, inside one critical section.
//!
//! Write policy:
//! - A failed write keeps the attempted mutation in memory and reports
//!   `JournalError::StorageWrite`, so the caller can retry with `save`.
//! - A stale-revision rejection triggers exactly one automatic retry:
//!   re-fetch, re-apply the mutation to the fresh ledger, write again.
//! - Validation (bulk import format) happens before anything changes.

use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::adapters::metrics::JournalMetrics;
use crate::config::AppConfig;
use crate::domain::export::{self, LedgerFilter, parse_delimiter};
use crate::domain::ledger::{IdStyle, Ledger, LedgerFormatError};
use crate::domain::stats::{self, GroupKey, GroupTotal, OutcomeSlice, Summary, TrendPoint};
use crate::domain::time::format_local;
use crate::domain::trade::{CoercionWarning, NewTradeInput, Trade};
use crate::ports::clock::{Clock, SystemClock};
use crate::ports::store::{LedgerStore, Revision, StoreError};

/// Errors surfaced to the presentation boundary.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
  /// The ledger could not be read. Only `reload` reports this; opening a
  /// journal falls back to an empty ledger instead.
  #[error("failed to read ledger from {backend}: {source}")]
  StorageRead {
    backend: String,
    #[source]
    source: StoreError,
  },

  /// The mutation is applied in memory but was not persisted.
  #[error("failed to persist ledger to {backend}: {source}")]
  StorageWrite {
    backend: String,
    #[source]
    source: StoreError,
  },

  /// Bulk import payload refused; the ledger is unchanged.
  #[error("malformed import: {0}")]
  MalformedInput(#[from] LedgerFormatError),

  /// Export rendering failed.
  #[error("export failed: {0:#}")]
  Export(anyhow::Error),
}

impl JournalError {
  /// Whether the failure was a stale-revision rejection.
  pub fn is_conflict(&self) -> bool {
    matches!(
      self,
      Self::StorageWrite { source, .. } if source.is_conflict()
    )
  }
}

/// Journal behaviour derived from configuration.
#[derive(Debug, Clone)]
pub struct JournalSettings {
  /// Zone trades are stamped and bucketed in.
  pub timezone: Tz,
  /// How new ids are generated.
  pub id_style: IdStyle,
  /// Default performance trend window.
  pub trend_window_days: u32,
  /// Default CSV delimiter.
  pub csv_delimiter: u8,
}

impl Default for JournalSettings {
  fn default() -> Self {
    Self {
      timezone: chrono_tz::Europe::Berlin,
      id_style: IdStyle::Sequential,
      trend_window_days: 30,
      csv_delimiter: b',',
    }
  }
}

impl JournalSettings {
  /// Derive settings from a validated config.
  pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
    Ok(Self {
      timezone: config.timezone()?,
      id_style: config.journal.id_style,
      trend_window_days: config.journal.trend_window_days,
      csv_delimiter: parse_delimiter(&config.export.csv_delimiter).unwrap_or(b','),
    })
  }
}

/// Result of the new-trade operation.
#[derive(Debug, Clone, Serialize)]
pub struct AddOutcome {
  /// The stored record.
  pub trade: Trade,
  /// Numeric fields that were coerced to zero.
  pub warnings: Vec<CoercionWarning>,
}

/// Ledger plus the revision it was last read or written at.
struct JournalState {
  ledger: Ledger,
  revision: Option<Revision>,
}

/// The trade ledger and statistics engine for one session.
pub struct Journal {
  store: Arc<dyn LedgerStore>,
  clock: Arc<dyn Clock>,
  metrics: Option<Arc<JournalMetrics>>,
  settings: JournalSettings,
  state: Mutex<JournalState>,
}

impl Journal {
  /// Open a session, loading the ledger from `store`.
  ///
  /// Never fails: a missing or unreadable ledger starts the session
  /// empty.
  pub async fn open(store: Arc<dyn LedgerStore>, settings: JournalSettings) -> Self {
    let (ledger, revision) = load_or_empty(store.as_ref()).await;
    Self {
      store,
      clock: Arc::new(SystemClock),
      metrics: None,
      settings,
      state: Mutex::new(JournalState { ledger, revision }),
    }
  }

  /// Replace the wall clock (tests, replays).
  #[must_use]
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Attach a metrics registry and publish the current ledger gauges.
  #[must_use]
  pub fn with_metrics(mut self, metrics: Arc<JournalMetrics>) -> Self {
    let state = self.state.get_mut();
    metrics.observe_ledger(state.ledger.len(), stats::compute_summary(&state.ledger).total_pnl);
    self.metrics = Some(metrics);
    self
  }

  pub fn settings(&self) -> &JournalSettings {
    &self.settings
  }

  /// Location of the backing store.
  pub fn backend(&self) -> String {
    self.store.describe()
  }

  pub async fn store_healthy(&self) -> bool {
    self.store.is_healthy().await
  }

  /// Current instant in the journal timezone.
  pub fn now(&self) -> DateTime<Tz> {
    self.clock.now().with_timezone(&self.settings.timezone)
  }

  // ── Persistence ────────────────────────────────────────────

  /// Re-read the ledger from the store, discarding in-memory state.
  ///
  /// Unlike `open`, read failures are reported and leave the current
  /// ledger untouched. A missing resource yields an empty ledger.
  #[instrument(skip(self))]
  pub async fn reload(&self) -> Result<Ledger, JournalError> {
    let mut state = self.state.lock().await;
    match self.store.fetch().await {
      Ok(snapshot) => {
        state.ledger = Ledger::from_trades(snapshot.trades);
        state.revision = snapshot.revision;
      }
      Err(StoreError::NotFound(_)) => {
        state.ledger = Ledger::new();
        state.revision = None;
      }
      Err(source) => {
        self.record("reload", "error");
        return Err(JournalError::StorageRead { backend: self.backend(), source });
      }
    }
    self.record("reload", "ok");
    self.observe(&state.ledger);
    Ok(state.ledger.clone())
  }

  /// Persist the in-memory ledger as is (retry after a failed write).
  ///
  /// A conflict is reported, not retried: there is no mutation to
  /// re-apply, and overwriting would discard the newer remote content.
  #[instrument(skip(self))]
  pub async fn save(&self) -> Result<Revision, JournalError> {
    let mut state = self.state.lock().await;
    match self.store.store(state.ledger.trades(), state.revision.clone()).await {
      Ok(revision) => {
        state.revision = Some(revision.clone());
        self.record("save", "ok");
        Ok(revision)
      }
      Err(source) => {
        self.record_write_failure();
        self.record("save", "error");
        Err(JournalError::StorageWrite { backend: self.backend(), source })
      }
    }
  }

  // ── Mutations ──────────────────────────────────────────────

  /// Record a new trade stamped with the current time.
  ///
  /// Non-numeric `pnl`/`margin` are stored as zero and reported as
  /// warnings; nothing else is validated.
  #[instrument(skip(self, input), fields(pair = %input.pair))]
  pub async fn add(&self, input: NewTradeInput) -> Result<AddOutcome, JournalError> {
    let time = format_local(&self.now());
    let (template, warnings) = input.into_trade(String::new(), time);

    for warning in &warnings {
      warn!(field = warning.field, raw = %warning.raw, "Coerced non-numeric input to 0");
      if let Some(metrics) = &self.metrics {
        metrics.coercion_warnings.inc();
      }
    }

    let style = self.settings.id_style;
    let trade = self
      .mutate("add", |ledger| {
        let mut trade = template.clone();
        trade.id = ledger.next_id(style);
        ledger.push(trade.clone());
        Ok((trade, true))
      })
      .await?;

    info!(id = %trade.id, pnl = %trade.pnl, "Trade recorded");
    Ok(AddOutcome { trade, warnings })
  }

  /// Delete the first trade with `id`. Unknown ids are a no-op and do
  /// not touch the store.
  #[instrument(skip(self))]
  pub async fn delete_by_id(&self, id: &str) -> Result<Ledger, JournalError> {
    self
      .mutate("delete", |ledger| {
        let removed = ledger.remove_by_id(id).is_some();
        Ok((ledger.clone(), removed))
      })
      .await
  }

  /// Clear the ledger and persist the empty collection.
  #[instrument(skip(self))]
  pub async fn reset(&self) -> Result<(), JournalError> {
    self
      .mutate("reset", |ledger| {
        ledger.clear();
        Ok(((), true))
      })
      .await
  }

  /// Replace the whole ledger with `payload` if it is a well-formed list
  /// of trade objects.
  #[instrument(skip(self, payload))]
  pub async fn import_bulk(&self, payload: serde_json::Value) -> Result<Ledger, JournalError> {
    let imported = match Ledger::from_json_value(payload, self.settings.id_style) {
      Ok(ledger) => ledger,
      Err(e) => {
        warn!(error = %e, "Rejected bulk import");
        self.record("import", "rejected");
        return Err(e.into());
      }
    };

    let count = imported.len();
    let ledger = self
      .mutate("import", |ledger| {
        ledger.replace(imported.trades().to_vec());
        Ok((ledger.clone(), true))
      })
      .await?;

    info!(count, "Ledger replaced by import");
    Ok(ledger)
  }

  /// [`Journal::import_bulk`] from raw JSON text.
  pub async fn import_json_str(&self, raw: &str) -> Result<Ledger, JournalError> {
    let payload = match serde_json::from_str(raw) {
      Ok(payload) => payload,
      Err(e) => {
        self.record("import", "rejected");
        return Err(LedgerFormatError::InvalidJson(e).into());
      }
    };
    self.import_bulk(payload).await
  }

  /// Apply `op` and persist, as one read-modify-write unit.
  ///
  /// `op` returns its result plus whether it changed the ledger; an
  /// unchanged ledger is not written.
  async fn mutate<T, F>(&self, operation: &'static str, op: F) -> Result<T, JournalError>
  where
    F: Fn(&mut Ledger) -> Result<(T, bool), JournalError>,
  {
    let mut state = self.state.lock().await;

    let mut working = state.ledger.clone();
    let (out, changed) = op(&mut working)?;
    if !changed {
      self.record(operation, "noop");
      return Ok(out);
    }
    state.ledger = working;

    let first = match self.store.store(state.ledger.trades(), state.revision.clone()).await {
      Ok(revision) => {
        state.revision = Some(revision);
        self.record(operation, "ok");
        self.observe(&state.ledger);
        return Ok(out);
      }
      Err(e) => e,
    };

    if !first.is_conflict() {
      return Err(self.write_failed(operation, first));
    }

    if let Some(metrics) = &self.metrics {
      metrics.storage_conflicts.inc();
    }
    warn!(operation, error = %first, "Stale revision, re-fetching and re-applying once");

    let snapshot = match self.store.fetch().await {
      Ok(snapshot) => snapshot,
      Err(StoreError::NotFound(_)) => Default::default(),
      Err(e) => {
        warn!(operation, error = %e, "Re-fetch after conflict failed");
        return Err(self.write_failed(operation, first));
      }
    };

    let mut fresh = Ledger::from_trades(snapshot.trades);
    let (out, changed) = op(&mut fresh)?;
    state.ledger = fresh;
    state.revision = snapshot.revision;

    if !changed {
      self.record(operation, "noop");
      self.observe(&state.ledger);
      return Ok(out);
    }

    match self.store.store(state.ledger.trades(), state.revision.clone()).await {
      Ok(revision) => {
        state.revision = Some(revision);
        self.record(operation, "ok");
        self.observe(&state.ledger);
        Ok(out)
      }
      Err(e) => Err(self.write_failed(operation, e)),
    }
  }

  // ── Queries ────────────────────────────────────────────────

  /// Snapshot of the full ledger.
  pub async fn ledger(&self) -> Ledger {
    self.state.lock().await.ledger.clone()
  }

  /// Trades matching `filter`, in ledger order.
  pub async fn trades(&self, filter: &LedgerFilter) -> Vec<Trade> {
    let state = self.state.lock().await;
    filter
      .apply(state.ledger.trades(), self.settings.timezone)
      .into_iter()
      .cloned()
      .collect()
  }

  pub async fn summary(&self) -> Summary {
    stats::compute_summary(&self.state.lock().await.ledger)
  }

  pub async fn outcomes(&self) -> Vec<OutcomeSlice> {
    stats::win_loss_breakdown(&self.summary().await)
  }

  pub async fn pnl_by_group(&self, key: GroupKey) -> Vec<GroupTotal> {
    stats::pnl_by_group(&self.state.lock().await.ledger, key)
  }

  /// Daily cumulative PnL over `window_days` (config default if `None`).
  pub async fn performance_trend(&self, window_days: Option<u32>) -> Vec<TrendPoint> {
    let days = window_days.unwrap_or(self.settings.trend_window_days);
    let now = self.now();
    stats::performance_trend(&self.state.lock().await.ledger, days, now)
  }

  /// CSV of the filtered view (config delimiter if `None`).
  pub async fn export_csv(
    &self,
    filter: &LedgerFilter,
    delimiter: Option<u8>,
  ) -> Result<String, JournalError> {
    let trades = self.trades(filter).await;
    export::to_csv(&trades, delimiter.unwrap_or(self.settings.csv_delimiter))
      .map_err(JournalError::Export)
  }

  /// JSON backup of the raw ledger, re-importable with `import_bulk`.
  pub async fn export_json(&self) -> Result<String, JournalError> {
    let state = self.state.lock().await;
    export::to_json(state.ledger.trades()).map_err(JournalError::Export)
  }

  // ── Instrumentation ────────────────────────────────────────

  fn write_failed(&self, operation: &'static str, source: StoreError) -> JournalError {
    warn!(operation, error = %source, "Ledger write failed, change kept in memory only");
    self.record_write_failure();
    self.record(operation, "error");
    JournalError::StorageWrite { backend: self.backend(), source }
  }

  fn record_write_failure(&self) {
    if let Some(metrics) = &self.metrics {
      metrics.storage_write_failures.inc();
    }
  }

  fn record(&self, operation: &str, outcome: &str) {
    if let Some(metrics) = &self.metrics {
      metrics.record_operation(operation, outcome);
    }
  }

  fn observe(&self, ledger: &Ledger) {
    if let Some(metrics) = &self.metrics {
      metrics.observe_ledger(ledger.len(), stats::compute_summary(ledger).total_pnl);
    }
  }
}

/// Fail-soft initial load.
async fn load_or_empty(store: &dyn LedgerStore) -> (Ledger, Option<Revision>) {
  match store.fetch().await {
    Ok(snapshot) => {
      info!(
        backend = %store.describe(),
        count = snapshot.trades.len(),
        "Ledger loaded"
      );
      (Ledger::from_trades(snapshot.trades), snapshot.revision)
    }
    Err(StoreError::NotFound(_)) => {
      info!(backend = %store.describe(), "No ledger found, starting empty");
      (Ledger::new(), None)
    }
    Err(e) => {
      warn!(
        backend = %store.describe(),
        error = %e,
        "Failed to read ledger, starting empty"
      );
      (Ledger::new(), None)
    }
  }
}
