//! Metrics Adapters - Prometheus Export
//!
//! Counters and gauges for ledger operations, storage failures and
//! ledger size, rendered for scraping on `/metrics`.

pub mod prometheus;

pub use self::prometheus::JournalMetrics;
