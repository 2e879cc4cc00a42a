//! Journal Integration Tests - Use Case Against Fake and Mock Stores
//!
//! Exercises the journal's read-modify-write cycle, conflict retry and
//! fail-soft behaviour. Uses an in-memory store for stateful scenarios
//! and mockall for failure injection.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mockall::mock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use trade_journal::domain::ledger::IdStyle;
use trade_journal::domain::stats::GroupKey;
use trade_journal::domain::trade::{NewTradeInput, Side, Trade};
use trade_journal::ports::clock::FixedClock;
use trade_journal::ports::store::{LedgerStore, Revision, Snapshot, StoreError};
use trade_journal::usecases::{Journal, JournalError, JournalSettings};

// ---- In-memory store ----

#[derive(Default)]
struct MemoryStore {
    inner: Mutex<MemoryState>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

#[derive(Default)]
struct MemoryState {
    trades: Option<Vec<Trade>>,
    revision: u64,
}

impl MemoryStore {
    fn with_trades(trades: Vec<Trade>) -> Self {
        let store = Self::default();
        store.inner.lock().unwrap().trades = Some(trades);
        store
    }

    /// Simulate a write from another session.
    fn external_write(&self, trades: Vec<Trade>) {
        let mut inner = self.inner.lock().unwrap();
        inner.trades = Some(trades);
        inner.revision += 1;
    }

    fn persisted(&self) -> Vec<Trade> {
        self.inner.lock().unwrap().trades.clone().unwrap_or_default()
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn fetch(&self) -> Result<Snapshot, StoreError> {
        let inner = self.inner.lock().unwrap();
        match &inner.trades {
            Some(trades) => Ok(Snapshot {
                trades: trades.clone(),
                revision: Some(Revision(inner.revision.to_string())),
            }),
            None => Err(StoreError::NotFound("memory".into())),
        }
    }

    async fn store(
        &self,
        trades: &[Trade],
        expected: Option<Revision>,
    ) -> Result<Revision, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write refused".into()));
        }
        let mut inner = self.inner.lock().unwrap();
        let current = inner.trades.as_ref().map(|_| Revision(inner.revision.to_string()));
        if current != expected {
            return Err(StoreError::Conflict(format!("stale revision {expected:?}")));
        }
        inner.trades = Some(trades.to_vec());
        inner.revision += 1;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Revision(inner.revision.to_string()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

// ---- Mock Definitions ----

mock! {
    pub Store {}

    #[async_trait]
    impl LedgerStore for Store {
        async fn fetch(&self) -> Result<Snapshot, StoreError>;
        async fn store(
            &self,
            trades: &[Trade],
            expected: Option<Revision>,
        ) -> Result<Revision, StoreError>;
        fn describe(&self) -> String;
        async fn is_healthy(&self) -> bool;
    }
}

// ---- Helpers ----

fn clock() -> Arc<FixedClock> {
    // 12:00 UTC = 13:00 in Berlin (CET)
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()))
}

async fn open(store: Arc<dyn LedgerStore>) -> Journal {
    Journal::open(store, JournalSettings::default()).await.with_clock(clock())
}

fn input(pair: &str, side: &str, pnl: serde_json::Value) -> NewTradeInput {
    serde_json::from_value(json!({ "pair": pair, "side": side, "pnl": pnl })).unwrap()
}

fn trade(id: &str, pair: &str, pnl: Decimal) -> Trade {
    Trade::new(id, "2024-03-01 10:00:00", pair, Side::Long, pnl)
}

// ---- Mutations ----

#[tokio::test]
async fn test_add_stamps_local_time_and_persists() {
    let store = Arc::new(MemoryStore::default());
    let journal = open(store.clone()).await;

    let outcome = journal.add(input("BTCUSDT", "Long", json!(12.5))).await.unwrap();

    assert_eq!(outcome.trade.id, "Trade1");
    assert_eq!(outcome.trade.time, "2024-03-10 13:00:00");
    assert_eq!(outcome.trade.pnl, dec!(12.5));
    assert!(outcome.warnings.is_empty());
    assert_eq!(store.persisted(), vec![outcome.trade]);
}

#[tokio::test]
async fn test_add_assigns_unique_ids() {
    let store = Arc::new(MemoryStore::with_trades(vec![trade("Trade7", "SOLUSDT", dec!(1))]));
    let journal = open(store.clone()).await;

    let a = journal.add(input("BTCUSDT", "Long", json!(1))).await.unwrap().trade;
    let b = journal.add(input("BTCUSDT", "Short", json!(2))).await.unwrap().trade;

    assert_eq!(a.id, "Trade8");
    assert_eq!(b.id, "Trade9");
    assert_eq!(store.persisted().len(), 3);
}

#[tokio::test]
async fn test_add_token_ids_are_unique() {
    let store = Arc::new(MemoryStore::default());
    let settings = JournalSettings { id_style: IdStyle::Token, ..Default::default() };
    let journal = Journal::open(store, settings).await;

    let mut ids = std::collections::HashSet::new();
    for _ in 0..20 {
        let trade = journal.add(input("BTCUSDT", "Long", json!(1))).await.unwrap().trade;
        assert_eq!(trade.id.len(), 8);
        assert!(ids.insert(trade.id));
    }
}

#[tokio::test]
async fn test_add_coerces_non_numeric_pnl() {
    let store = Arc::new(MemoryStore::default());
    let journal = open(store.clone()).await;

    let outcome = journal.add(input("BTCUSDT", "Long", json!("abc"))).await.unwrap();

    assert_eq!(outcome.trade.pnl, Decimal::ZERO);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].field, "pnl");
    assert_eq!(store.persisted()[0].pnl, Decimal::ZERO);
}

#[tokio::test]
async fn test_delete_by_id() {
    let store = Arc::new(MemoryStore::with_trades(vec![
        trade("Trade1", "BTCUSDT", dec!(10)),
        trade("Trade2", "SOLUSDT", dec!(-5)),
    ]));
    let journal = open(store.clone()).await;

    let remaining = journal.delete_by_id("Trade1").await.unwrap();

    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining.trades()[0].id, "Trade2");
    assert_eq!(store.persisted().len(), 1);
}

#[tokio::test]
async fn test_delete_missing_id_is_noop_without_write() {
    let store = Arc::new(MemoryStore::with_trades(vec![trade("Trade1", "BTCUSDT", dec!(10))]));
    let journal = open(store.clone()).await;

    let remaining = journal.delete_by_id("nope").await.unwrap();

    assert_eq!(remaining.len(), 1);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_reset_persists_empty_ledger() {
    let store = Arc::new(MemoryStore::with_trades(vec![trade("Trade1", "BTCUSDT", dec!(10))]));
    let journal = open(store.clone()).await;

    journal.reset().await.unwrap();

    assert!(journal.ledger().await.is_empty());
    assert!(store.persisted().is_empty());
    assert_eq!(journal.summary().await.total, 0);
}

#[tokio::test]
async fn test_import_replaces_ledger_and_assigns_ids() {
    let store = Arc::new(MemoryStore::with_trades(vec![trade("Trade1", "BTCUSDT", dec!(10))]));
    let journal = open(store.clone()).await;

    let payload = json!([
        { "id": "a1", "pair": "ETHUSDT", "side": "Short", "pnl": "3,5" },
        { "pair": "SOLUSDT", "side": "Long", "pnl": -2 }
    ]);
    let ledger = journal.import_bulk(payload).await.unwrap();

    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.trades()[0].pnl, dec!(3.5));
    assert!(!ledger.trades()[1].id.is_empty());
    assert_ne!(ledger.trades()[1].id, "a1");
    assert_eq!(store.persisted(), ledger.into_trades());
}

#[tokio::test]
async fn test_import_malformed_leaves_state_unchanged() {
    let original = vec![trade("Trade1", "BTCUSDT", dec!(10))];
    let store = Arc::new(MemoryStore::with_trades(original.clone()));
    let journal = open(store.clone()).await;

    let err = journal.import_bulk(json!({ "not": "a list" })).await.unwrap_err();
    assert!(matches!(err, JournalError::MalformedInput(_)));

    let err = journal.import_bulk(json!([{ "pair": "BTCUSDT" }, 42])).await.unwrap_err();
    assert!(matches!(err, JournalError::MalformedInput(_)));

    let err = journal.import_json_str("[{").await.unwrap_err();
    assert!(matches!(err, JournalError::MalformedInput(_)));

    assert_eq!(journal.ledger().await.into_trades(), original);
    assert_eq!(store.writes(), 0);
}

// ---- Concurrency and failures ----

#[tokio::test]
async fn test_conflict_refetches_and_reapplies_once() {
    let store = Arc::new(MemoryStore::with_trades(vec![trade("Trade1", "BTCUSDT", dec!(10))]));
    let journal = open(store.clone()).await;

    // Another session appends a trade after we loaded.
    store.external_write(vec![
        trade("Trade1", "BTCUSDT", dec!(10)),
        trade("Trade2", "SOLUSDT", dec!(-4)),
    ]);

    let outcome = journal.add(input("ETHUSDT", "Short", json!(7))).await.unwrap();

    assert_eq!(outcome.trade.id, "Trade3");
    let persisted = store.persisted();
    assert_eq!(persisted.len(), 3);
    assert_eq!(persisted[1].id, "Trade2");
    assert_eq!(journal.ledger().await.len(), 3);
}

#[tokio::test]
async fn test_failed_write_keeps_mutation_in_memory() {
    let store = Arc::new(MemoryStore::default());
    let journal = open(store.clone()).await;

    store.fail_writes.store(true, Ordering::SeqCst);
    let err = journal.add(input("BTCUSDT", "Long", json!(5))).await.unwrap_err();
    assert!(matches!(err, JournalError::StorageWrite { .. }));
    assert!(!err.is_conflict());

    assert_eq!(journal.ledger().await.len(), 1);
    assert!(store.persisted().is_empty());

    store.fail_writes.store(false, Ordering::SeqCst);
    journal.save().await.unwrap();
    assert_eq!(store.persisted().len(), 1);
}

#[tokio::test]
async fn test_open_is_fail_soft() {
    let mut mock = MockStore::new();
    mock.expect_fetch()
        .times(1)
        .returning(|| Err(StoreError::Backend("connection refused".into())));
    mock.expect_describe().returning(|| "mock".to_string());

    let journal = Journal::open(Arc::new(mock), JournalSettings::default()).await;

    assert!(journal.ledger().await.is_empty());
}

#[tokio::test]
async fn test_reload_reports_read_failure() {
    let mut mock = MockStore::new();
    let mut calls = 0;
    mock.expect_fetch().times(2).returning(move || {
        calls += 1;
        if calls == 1 {
            Ok(Snapshot {
                trades: vec![trade("Trade1", "BTCUSDT", dec!(1))],
                revision: Some(Revision("r1".into())),
            })
        } else {
            Err(StoreError::Backend("timeout".into()))
        }
    });
    mock.expect_describe().returning(|| "mock".to_string());

    let journal = Journal::open(Arc::new(mock), JournalSettings::default()).await;
    let err = journal.reload().await.unwrap_err();

    assert!(matches!(err, JournalError::StorageRead { .. }));
    assert_eq!(journal.ledger().await.len(), 1);
}

#[tokio::test]
async fn test_second_conflict_is_reported() {
    let mut mock = MockStore::new();
    mock.expect_fetch().times(2).returning(|| {
        Ok(Snapshot { trades: vec![], revision: Some(Revision("r1".into())) })
    });
    mock.expect_store()
        .times(2)
        .returning(|_, _| Err(StoreError::Conflict("stale".into())));
    mock.expect_describe().returning(|| "mock".to_string());

    let journal = open(Arc::new(mock)).await;
    let err = journal.add(input("BTCUSDT", "Long", json!(1))).await.unwrap_err();

    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_store_receives_last_revision() {
    let mut mock = MockStore::new();
    mock.expect_fetch().times(1).returning(|| {
        Ok(Snapshot { trades: vec![], revision: Some(Revision("r1".into())) })
    });
    mock.expect_store()
        .withf(|trades, expected| trades.len() == 1 && expected == &Some(Revision("r1".into())))
        .times(1)
        .returning(|_, _| Ok(Revision("r2".into())));
    mock.expect_store()
        .withf(|trades, expected| trades.len() == 2 && expected == &Some(Revision("r2".into())))
        .times(1)
        .returning(|_, _| Ok(Revision("r3".into())));
    mock.expect_describe().returning(|| "mock".to_string());

    let journal = open(Arc::new(mock)).await;
    journal.add(input("BTCUSDT", "Long", json!(1))).await.unwrap();
    journal.add(input("BTCUSDT", "Long", json!(2))).await.unwrap();
}

// ---- Queries ----

#[tokio::test]
async fn test_summary_and_breakdown() {
    let store = Arc::new(MemoryStore::with_trades(vec![
        trade("Trade1", "BTCUSDT", dec!(10)),
        trade("Trade2", "BTCUSDT", dec!(-4)),
        trade("Trade3", "SOLUSDT", dec!(6)),
    ]));
    let journal = open(store).await;

    let summary = journal.summary().await;
    assert_eq!(summary.total, 3);
    assert_eq!(summary.wins, 2);
    assert_eq!(summary.losses, 1);
    assert_eq!(summary.total_pnl, dec!(12));

    let groups = journal.pnl_by_group(GroupKey::Pair).await;
    assert_eq!(groups[0].key, "BTCUSDT");
    assert_eq!(groups[0].pnl, dec!(6));
    assert_eq!(groups[1].key, "SOLUSDT");
}

#[tokio::test]
async fn test_cent_inputs_total_exactly() {
    let store = Arc::new(MemoryStore::default());
    let journal = open(store).await;

    journal.add(input("BTCUSDT", "Long", json!(0.1))).await.unwrap();
    journal.add(input("BTCUSDT", "Long", json!("0,2"))).await.unwrap();

    let summary = journal.summary().await;
    assert_eq!(summary.total_pnl, dec!(0.3));
    assert_eq!(serde_json::to_value(&summary).unwrap()["total_pnl"], json!(0.3));
}

#[tokio::test]
async fn test_trend_uses_journal_clock() {
    let store = Arc::new(MemoryStore::with_trades(vec![
        Trade::new("Trade1", "2024-03-09 09:00:00", "BTCUSDT", Side::Long, dec!(5)),
        Trade::new("Trade2", "2024-03-10 09:00:00", "BTCUSDT", Side::Long, dec!(-2)),
        Trade::new("Trade3", "2023-01-01 09:00:00", "BTCUSDT", Side::Long, dec!(100)),
    ]));
    let journal = open(store).await;

    let trend = journal.performance_trend(Some(7)).await;

    assert_eq!(trend.len(), 2);
    assert_eq!(trend[0].daily_pnl, dec!(5));
    assert_eq!(trend[1].cumulative_pnl, dec!(3));
}
