//! Statement handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};
use conciliar_core::models::{
    BatchResult, CounterCheck, ItemFilter, NewStatement, NewStatementLine, Statement,
    StatementItem, SummaryCounts,
};

/// Query parameters for listing statements
#[derive(Debug, Deserialize)]
pub struct StatementQuery {
    pub company_id: Option<i64>,
}

/// Query parameters for listing statement items
#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    /// all, pending, matched, suspense
    pub state: Option<String>,
}

/// Query parameters for a batch pass
#[derive(Debug, Deserialize)]
pub struct AutoMatchQuery {
    /// Bias scoring with patterns learned from confirmed matches
    #[serde(default = "default_true")]
    pub use_patterns: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct AddItemsRequest {
    pub lines: Vec<NewStatementLine>,
}

#[derive(Serialize)]
pub struct AddItemsResponse {
    pub item_ids: Vec<i64>,
    pub statement: Statement,
}

pub(crate) fn require_statement(state: &AppState, id: i64) -> Result<Statement, AppError> {
    state
        .db
        .get_statement(id)?
        .ok_or_else(|| AppError::not_found("Statement not found"))
}

/// POST /api/statements - Create an empty statement
pub async fn create_statement(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewStatement>,
) -> Result<(StatusCode, Json<Statement>), AppError> {
    let id = state.db.create_statement(&body)?;
    let statement = require_statement(&state, id)?;
    Ok((StatusCode::CREATED, Json(statement)))
}

/// GET /api/statements - List statements, newest first
pub async fn list_statements(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatementQuery>,
) -> Result<Json<Vec<Statement>>, AppError> {
    let statements = state.db.list_statements(params.company_id)?;
    Ok(Json(statements))
}

/// GET /api/statements/:id - Get a single statement with its counters
pub async fn get_statement(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Statement>, AppError> {
    Ok(Json(require_statement(&state, id)?))
}

/// POST /api/statements/:id/items - Append normalized bank lines
pub async fn add_items(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<AddItemsRequest>,
) -> Result<(StatusCode, Json<AddItemsResponse>), AppError> {
    if body.lines.is_empty() {
        return Err(AppError::bad_request("No lines provided"));
    }

    let item_ids = state.db.add_statement_items(id, &body.lines)?;
    let statement = require_statement(&state, id)?;

    Ok((
        StatusCode::CREATED,
        Json(AddItemsResponse {
            item_ids,
            statement,
        }),
    ))
}

/// GET /api/statements/:id/items - List a statement's lines
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<ItemsQuery>,
) -> Result<Json<Vec<StatementItem>>, AppError> {
    let filter = match params.state.as_deref() {
        Some(s) => s
            .parse::<ItemFilter>()
            .map_err(|e| AppError::bad_request(&e))?,
        None => ItemFilter::All,
    };

    let items = state.db.list_items(id, filter)?;
    Ok(Json(items))
}

/// POST /api/statements/:id/auto-match - Run the batch matcher
pub async fn auto_match(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<AutoMatchQuery>,
) -> Result<Json<BatchResult>, AppError> {
    let statement = require_statement(&state, id)?;

    let patterns = if params.use_patterns {
        Some(state.db.learned_patterns(statement.company_id)?)
    } else {
        None
    };

    let result = state
        .db
        .auto_match_batch_with_patterns(id, patterns.as_ref())?;
    Ok(Json(result))
}

/// GET /api/statements/:id/summary - Counts recomputed from lines
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SummaryCounts>, AppError> {
    Ok(Json(state.db.recompute_summary(id)?))
}

/// GET /api/statements/:id/verify - Stored counters vs recount
pub async fn verify_counters(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CounterCheck>, AppError> {
    Ok(Json(state.db.verify_counters(id)?))
}
