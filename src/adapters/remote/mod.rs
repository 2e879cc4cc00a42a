//! Remote Adapters - Hosted Repository Contents API
//!
//! Persists the ledger as a single JSON file in a hosted repository.
//! Reads return the file plus its blob sha; writes must present the
//! sha they replace (optimistic concurrency).

pub mod client;
pub mod store;
pub mod types;

pub use client::{ContentsClient, ContentsClientConfig};
pub use store::RemoteLedgerStore;
