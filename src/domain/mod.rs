//! Domain layer - Trade records, ledger and statistics.
//!
//! Pure logic with no I/O (hexagonal architecture inner ring).
//! Everything here is synchronous and testable in isolation; persistence
//! and presentation live behind the ports.

pub mod export;
pub mod ledger;
pub mod stats;
pub mod time;
pub mod trade;

// Re-export core types for convenience
pub use export::LedgerFilter;
pub use ledger::{IdStyle, Ledger, LedgerFormatError};
pub use stats::{GroupKey, GroupTotal, Summary, TrendPoint};
pub use trade::{CoercionWarning, NewTradeInput, Side, Trade, TradeId};
