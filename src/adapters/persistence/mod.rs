//! Persistence Adapters - Local File Storage
//!
//! Implements the `LedgerStore` port with a single JSON file written
//! atomically. No database dependency.

pub mod file_store;

pub use file_store::FileLedgerStore;
