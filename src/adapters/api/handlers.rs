//! Request handlers. Each one is a thin translation onto a `Journal`
//! operation; all state lives in the journal.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ApiState;
use super::error::ApiError;
use crate::domain::export::{LedgerFilter, parse_delimiter};
use crate::domain::ledger::Ledger;
use crate::domain::stats::{GroupKey, GroupTotal, OutcomeSlice, Summary, TrendPoint};
use crate::domain::trade::{NewTradeInput, Trade};
use crate::usecases::journal::AddOutcome;

type ApiResult<T> = Result<T, ApiError>;

// ── Ledger ───────────────────────────────────────────────────

pub async fn list_trades(
    State(state): State<ApiState>,
    Query(filter): Query<LedgerFilter>,
) -> Json<Vec<Trade>> {
    Json(state.journal.trades(&filter).await)
}

/// Parsed by hand so a broken body gets the JSON error envelope instead of
/// the extractor's plain-text rejection.
pub async fn create_trade(
    State(state): State<ApiState>,
    body: String,
) -> ApiResult<(StatusCode, Json<AddOutcome>)> {
    let input: NewTradeInput = serde_json::from_str(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid trade payload: {e}")))?;
    let outcome = state.journal.add(input).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn delete_trade(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Ledger>> {
    Ok(Json(state.journal.delete_by_id(&id).await?))
}

pub async fn reset(State(state): State<ApiState>) -> ApiResult<StatusCode> {
    state.journal.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The body is taken as text so that invalid JSON is reported as a
/// malformed import rather than an extractor rejection.
pub async fn import(State(state): State<ApiState>, body: String) -> ApiResult<Json<Ledger>> {
    Ok(Json(state.journal.import_json_str(&body).await?))
}

pub async fn reload(State(state): State<ApiState>) -> ApiResult<Json<Ledger>> {
    Ok(Json(state.journal.reload().await?))
}

pub async fn save(State(state): State<ApiState>) -> ApiResult<Json<serde_json::Value>> {
    let revision = state.journal.save().await?;
    Ok(Json(json!({ "success": true, "revision": revision })))
}

// ── Statistics ───────────────────────────────────────────────

pub async fn summary(State(state): State<ApiState>) -> Json<Summary> {
    Json(state.journal.summary().await)
}

pub async fn outcomes(State(state): State<ApiState>) -> Json<Vec<OutcomeSlice>> {
    Json(state.journal.outcomes().await)
}

pub async fn breakdown(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> ApiResult<Json<Vec<GroupTotal>>> {
    let key: GroupKey = key.parse().map_err(ApiError::BadRequest)?;
    Ok(Json(state.journal.pnl_by_group(key).await))
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub days: Option<u32>,
}

pub async fn trend(
    State(state): State<ApiState>,
    Query(query): Query<TrendQuery>,
) -> ApiResult<Json<Vec<TrendPoint>>> {
    if query.days == Some(0) {
        return Err(ApiError::BadRequest("days must be positive".into()));
    }
    Ok(Json(state.journal.performance_trend(query.days).await))
}

// ── Export ───────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CsvQuery {
    pub delimiter: Option<String>,
    #[serde(flatten)]
    pub filter: LedgerFilter,
}

pub async fn export_csv(
    State(state): State<ApiState>,
    Query(query): Query<CsvQuery>,
) -> ApiResult<impl IntoResponse> {
    let delimiter = match query.delimiter.as_deref() {
        Some(raw) => Some(
            parse_delimiter(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unsupported delimiter {raw:?}")))?,
        ),
        None => None,
    };

    let csv = state.journal.export_csv(&query.filter, delimiter).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"trades.csv\""),
        ],
        csv,
    ))
}

pub async fn export_json(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    let json = state.journal.export_json().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"trades.json\""),
        ],
        json,
    ))
}

// ── Meta / probes ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct JournalMeta {
    pub name: String,
    pub version: &'static str,
    pub timezone: String,
    pub pairs: Vec<String>,
    pub backend: String,
}

pub async fn meta(State(state): State<ApiState>) -> Json<JournalMeta> {
    Json(state.meta.as_ref().clone())
}

/// Liveness probe: always 200 while the process runs.
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe: 200 only if the ledger store is reachable.
pub async fn readiness(State(state): State<ApiState>) -> impl IntoResponse {
    if state.journal.store_healthy().await {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

pub async fn metrics(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
