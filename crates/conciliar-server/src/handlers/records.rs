//! Internal record handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{AppError, AppState, MAX_PAGE_LIMIT};
use conciliar_core::db::RecordFilter;
use conciliar_core::models::{Direction, InternalRecord, NewInternalRecord};

/// Query parameters for the unmatched record listing
#[derive(Debug, Deserialize)]
pub struct UnmatchedQuery {
    pub company_id: Option<i64>,
    /// Only records usable against a bank line of this direction
    pub direction: Option<Direction>,
    /// Start date (YYYY-MM-DD)
    pub from: Option<NaiveDate>,
    /// End date (YYYY-MM-DD)
    pub to: Option<NaiveDate>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// Search document number, counterparty name and description
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// POST /api/records - Add an accounting record
pub async fn create_record(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewInternalRecord>,
) -> Result<(StatusCode, Json<InternalRecord>), AppError> {
    let id = state.db.add_internal_record(&body)?;
    let record = state
        .db
        .get_record(id)?
        .ok_or_else(|| AppError::not_found("Record not found"))?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/records/:id - Get a single record
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<InternalRecord>, AppError> {
    let record = state
        .db
        .get_record(id)?
        .ok_or_else(|| AppError::not_found("Record not found"))?;
    Ok(Json(record))
}

/// GET /api/accounts/:id/unmatched-records - Unreconciled records for manual matching
pub async fn list_unmatched_records(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<i64>,
    Query(params): Query<UnmatchedQuery>,
) -> Result<Json<Vec<InternalRecord>>, AppError> {
    // Input validation: clamp limit
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);

    let date_range = match (params.from, params.to) {
        (Some(from), Some(to)) if from > to => {
            return Err(AppError::bad_request("'from' must not be after 'to'"));
        }
        (Some(from), Some(to)) => Some((from, to)),
        (Some(from), None) => Some((from, chrono::Local::now().date_naive())),
        (None, Some(to)) => Some((NaiveDate::default(), to)),
        (None, None) => None,
    };

    let filter = RecordFilter::new()
        .company_id(params.company_id)
        .direction(params.direction)
        .date_range(date_range)
        .amount_range(params.min_amount, params.max_amount)
        .search(params.search.as_deref())
        .limit(Some(limit));

    let records = state.db.list_unmatched_records(account_id, filter)?;
    Ok(Json(records))
}
