//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (local files, a hosted contents API, HTTP
//! serving). Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `api`: Journal JSON API, health probes and metrics endpoint
//! - `metrics`: Prometheus registry for journal operations
//! - `persistence`: Local JSON ledger file
//! - `remote`: Ledger file in a hosted repository (contents API)

pub mod api;
pub mod metrics;
pub mod persistence;
pub mod remote;
