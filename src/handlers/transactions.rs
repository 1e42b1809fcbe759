use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::access::parse_record_id;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::services::transactions::summarize;
use crate::state::AppState;
use crate::validation::{EntryQuery, LedgerEntryInput, StatsQuery};

const RECORD: &str = "Transaction";

pub async fn create_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<LedgerEntryInput>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let Json(input) = payload?;
    let new = input
        .into_new_entry(Utc::now())
        .map_err(AppError::Validation)?;

    let entry = state.ledger.record(user.owner_id, new).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "transaction": entry })),
    ))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<EntryQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(query) = query?;
    let filter = query.into_filter().map_err(AppError::Validation)?;

    let entries = state.ledger.list(user.owner_id, &filter).await?;
    let summary = summarize(&entries)?;
    Ok(Json(json!({
        "success": true,
        "count": entries.len(),
        "transactions": entries,
        "summary": summary,
    })))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_record_id(&id, RECORD)?;
    let entry = state.ledger.get(user.owner_id, id).await?;
    Ok(Json(json!({ "success": true, "transaction": entry })))
}

pub async fn update_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<LedgerEntryInput>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let id = parse_record_id(&id, RECORD)?;
    let Json(input) = payload?;
    let patch = input.into_patch().map_err(AppError::Validation)?;

    let entry = state.ledger.update(user.owner_id, id, patch).await?;
    Ok(Json(json!({ "success": true, "transaction": entry })))
}

pub async fn delete_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_record_id(&id, RECORD)?;
    state.ledger.delete(user.owner_id, id).await?;
    Ok(Json(json!({ "success": true, "message": "Transaction deleted" })))
}

pub async fn transaction_stats(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(query) = query?;
    let months = query.months_back().map_err(AppError::Validation)?;

    let breakdown = state
        .ledger
        .period_breakdown(user.owner_id, months, Utc::now())
        .await?;
    Ok(Json(json!({
        "success": true,
        "months": months,
        "monthlyData": breakdown.monthly_data,
        "categoryData": breakdown.category_data,
    })))
}
