use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::access::parse_record_id;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::validation::HoldingInput;

const RECORD: &str = "Portfolio item";

pub async fn add_holding(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<HoldingInput>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let Json(input) = payload?;
    let purchase = input.into_purchase().map_err(AppError::Validation)?;

    let outcome = state.portfolio.add_or_merge(user.owner_id, purchase).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(json!({ "success": true, "portfolio": outcome.holding })),
    ))
}

pub async fn get_portfolio(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<Value>> {
    let valuation = state.portfolio.value_portfolio(user.owner_id).await?;
    Ok(Json(json!({
        "success": true,
        "portfolio": valuation.holdings,
        "summary": valuation.summary,
    })))
}

pub async fn get_holding(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_record_id(&id, RECORD)?;
    let holding = state.portfolio.get(user.owner_id, id).await?;
    Ok(Json(json!({ "success": true, "portfolio": holding })))
}

pub async fn update_holding(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<HoldingInput>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let id = parse_record_id(&id, RECORD)?;
    let Json(input) = payload?;
    let patch = input.into_patch().map_err(AppError::Validation)?;

    let holding = state.portfolio.update(user.owner_id, id, patch).await?;
    Ok(Json(json!({ "success": true, "portfolio": holding })))
}

pub async fn delete_holding(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_record_id(&id, RECORD)?;
    state.portfolio.delete(user.owner_id, id).await?;
    Ok(Json(json!({ "success": true, "message": "Portfolio item deleted" })))
}
