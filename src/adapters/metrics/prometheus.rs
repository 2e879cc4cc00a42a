//! Prometheus Metrics Registry - Journal Observability
//!
//! Registers journal metrics and renders them in the text exposition
//! format for `/metrics`. Names follow the `trade_journal_*` convention.

use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Centralized Prometheus metrics for the journal.
pub struct JournalMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Ledger operations by kind and outcome.
    pub operations: IntCounterVec,
    /// Write conflicts reported by the store (before retry).
    pub storage_conflicts: IntCounter,
    /// Writes that ultimately failed.
    pub storage_write_failures: IntCounter,
    /// Coerced numeric fields on new trades.
    pub coercion_warnings: IntCounter,
    /// Trades currently in the ledger.
    pub ledger_trades: IntGauge,
    /// Sum of PnL over the ledger.
    pub total_pnl: Gauge,
}

impl JournalMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let operations = IntCounterVec::new(
            Opts::new("trade_journal_operations_total", "Ledger operations by outcome"),
            &["operation", "outcome"],
        )?;

        let storage_conflicts = IntCounter::new(
            "trade_journal_storage_conflicts_total",
            "Ledger writes rejected for a stale revision",
        )?;

        let storage_write_failures = IntCounter::new(
            "trade_journal_storage_write_failures_total",
            "Ledger writes that could not be persisted",
        )?;

        let coercion_warnings = IntCounter::new(
            "trade_journal_coercion_warnings_total",
            "Non-numeric pnl/margin inputs stored as zero",
        )?;

        let ledger_trades =
            IntGauge::new("trade_journal_ledger_trades", "Trades currently in the ledger")?;

        let total_pnl = Gauge::new("trade_journal_total_pnl", "Sum of realized PnL")?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(storage_conflicts.clone()))?;
        registry.register(Box::new(storage_write_failures.clone()))?;
        registry.register(Box::new(coercion_warnings.clone()))?;
        registry.register(Box::new(ledger_trades.clone()))?;
        registry.register(Box::new(total_pnl.clone()))?;

        Ok(Self {
            registry,
            operations,
            storage_conflicts,
            storage_write_failures,
            coercion_warnings,
            ledger_trades,
            total_pnl,
        })
    }

    /// Count one operation with its outcome (`ok`, `error`, `noop`).
    pub fn record_operation(&self, operation: &str, outcome: &str) {
        self.operations.with_label_values(&[operation, outcome]).inc();
    }

    /// Refresh the ledger gauges. Gauges are `f64`, so the exact PnL is
    /// only approximated here.
    pub fn observe_ledger(&self, trades: usize, total_pnl: Decimal) {
        self.ledger_trades.set(i64::try_from(trades).unwrap_or(i64::MAX));
        self.total_pnl.set(total_pnl.to_f64().unwrap_or_default());
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
