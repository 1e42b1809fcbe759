pub mod portfolio;
pub mod stocks;
pub mod transactions;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "Financial Analytics Dashboard API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "transactions": "/api/transactions",
            "portfolio": "/api/portfolio",
            "stocks": "/api/stocks",
        },
    }))
}

pub async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Route not found" })),
    )
}
