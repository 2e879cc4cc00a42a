//! Journal JSON API
//!
//! axum 0.7 router exposing the ledger operations, statistics, exports
//! and liveness / readiness / metrics probes. Errors are returned as
//! `{ "success": false, "error": "..." }`.

pub mod error;
pub mod handlers;
pub mod router;

use std::sync::Arc;

use crate::adapters::metrics::JournalMetrics;
use crate::usecases::journal::Journal;

pub use error::ApiError;
pub use handlers::JournalMeta;
pub use router::{create_router, serve};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub journal: Arc<Journal>,
    pub metrics: Arc<JournalMetrics>,
    pub meta: Arc<JournalMeta>,
}
