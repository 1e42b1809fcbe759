use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::HistoryInterval;
use crate::state::AppState;
use crate::utils::normalize_symbol;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub interval: Option<String>,
}

fn symbol_param(raw: &str) -> AppResult<String> {
    normalize_symbol(raw).ok_or_else(|| AppError::invalid("symbol", "Stock symbol is required"))
}

pub async fn get_quote(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(symbol): Path<String>,
) -> AppResult<Json<Value>> {
    let symbol = symbol_param(&symbol)?;
    let quote = state.market.get_quote(&symbol).await?;
    Ok(Json(json!({
        "success": true,
        "data": quote.value,
        "cached": quote.cached,
    })))
}

pub async fn get_history(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(symbol): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let symbol = symbol_param(&symbol)?;
    let Query(query) = query?;
    let interval = match query.interval.as_deref() {
        None | Some("") => HistoryInterval::Daily,
        Some(raw) => HistoryInterval::parse(raw).ok_or_else(|| {
            AppError::invalid("interval", "Interval must be daily, weekly or monthly")
        })?,
    };

    let history = state.market.get_history(&symbol, interval).await?;
    Ok(Json(json!({
        "success": true,
        "data": history.value,
        "cached": history.cached,
    })))
}

pub async fn search_stocks(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(query): Path<String>,
) -> AppResult<Json<Value>> {
    if query.trim().is_empty() {
        return Err(AppError::invalid("query", "Search query is required"));
    }
    let matches = state.market.search(&query).await?;
    Ok(Json(json!({
        "success": true,
        "data": matches.value,
        "cached": matches.cached,
    })))
}
