pub mod access;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod utils;
pub mod validation;

use axum::{
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// All routes, without CORS (the allowed origin comes from configuration).
pub fn router(state: AppState) -> Router {
    let transactions = Router::new()
        .route(
            "/",
            get(handlers::transactions::list_transactions)
                .post(handlers::transactions::create_transaction),
        )
        .route("/stats/summary", get(handlers::transactions::transaction_stats))
        .route(
            "/:id",
            get(handlers::transactions::get_transaction)
                .put(handlers::transactions::update_transaction)
                .delete(handlers::transactions::delete_transaction),
        );

    let portfolio = Router::new()
        .route(
            "/",
            get(handlers::portfolio::get_portfolio).post(handlers::portfolio::add_holding),
        )
        .route(
            "/:id",
            get(handlers::portfolio::get_holding)
                .put(handlers::portfolio::update_holding)
                .delete(handlers::portfolio::delete_holding),
        );

    let stocks = Router::new()
        .route("/search/:query", get(handlers::stocks::search_stocks))
        .route("/:symbol", get(handlers::stocks::get_quote))
        .route("/:symbol/history", get(handlers::stocks::get_history));

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .nest("/api/transactions", transactions)
        .nest("/api/portfolio", portfolio)
        .nest("/api/stocks", stocks)
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
