//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the journal use case requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `LedgerStore`: whole-ledger persistence with revision markers
//! - `Clock`: current time, swappable in tests

pub mod clock;
pub mod store;
