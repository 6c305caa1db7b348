//! Statement item handlers: suggestions, manual matching and suspense

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use super::statements::require_statement;
use crate::{get_user_id, AppError, AppState};
use conciliar_core::models::{
    InternalRecord, MatchResult, RecordCategory, StatementItem, SuggestionSet,
};

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub record_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MaterializeRequest {
    /// Overrides the category guessed from the bank text
    pub reference_type: Option<RecordCategory>,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct MatchResponse {
    pub item: StatementItem,
    pub result: MatchResult,
}

#[derive(Serialize)]
pub struct MaterializeResponse {
    pub item: StatementItem,
    pub record: InternalRecord,
}

fn require_item(state: &AppState, id: i64) -> Result<StatementItem, AppError> {
    state
        .db
        .get_item(id)?
        .ok_or_else(|| AppError::not_found("Statement item not found"))
}

/// GET /api/items/:id - Get a single statement line
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<StatementItem>, AppError> {
    Ok(Json(require_item(&state, id)?))
}

/// GET /api/items/:id/suggestions - Ranked candidates for manual review
pub async fn get_suggestions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuggestionSet>, AppError> {
    let item = require_item(&state, id)?;
    let statement = require_statement(&state, item.statement_id)?;
    let patterns = state.db.learned_patterns(statement.company_id)?;

    let suggestions = state.db.suggest_matches(id, Some(&patterns))?;
    Ok(Json(suggestions))
}

/// POST /api/items/:id/match - Manually match a line to a record
pub async fn match_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    let user_id = get_user_id(&headers);

    let result = state.db.manual_match(id, body.record_id, &user_id)?;
    let item = require_item(&state, id)?;

    Ok(Json(MatchResponse { item, result }))
}

/// POST /api/items/:id/unmatch - Undo a match
pub async fn unmatch_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<StatementItem>, AppError> {
    state.db.unmatch(id)?;
    Ok(Json(require_item(&state, id)?))
}

/// POST /api/items/:id/resolve-suspense - Accept a suspense line without a counterpart
pub async fn resolve_suspense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<ResolveRequest>,
) -> Result<Json<StatementItem>, AppError> {
    let user_id = get_user_id(&headers);

    state.db.resolve_suspense(id, &body.notes, &user_id)?;
    Ok(Json(require_item(&state, id)?))
}

/// POST /api/items/:id/materialize - Create a record from a suspense line and match it
pub async fn materialize(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<MaterializeRequest>,
) -> Result<Json<MaterializeResponse>, AppError> {
    let user_id = get_user_id(&headers);

    let record_id = state.db.materialize_from_suspense(
        id,
        body.reference_type,
        body.description.as_deref(),
        &user_id,
    )?;

    let item = require_item(&state, id)?;
    let record = state
        .db
        .get_record(record_id)?
        .ok_or_else(|| AppError::not_found("Record not found"))?;

    Ok(Json(MaterializeResponse { item, record }))
}
