//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces. The journal is the
//! single use case: it owns the session ledger, persists every mutation
//! through the `LedgerStore` port and answers statistics queries.

pub mod journal;

pub use journal::{AddOutcome, Journal, JournalError, JournalSettings};
