use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(false);

/// Include the underlying error text in 500 responses. Only enabled in
/// development.
pub fn expose_error_details(enabled: bool) {
    EXPOSE_DETAILS.store(enabled, Ordering::Relaxed);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failures of the external market-data provider.
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Stock API not configured")]
    NotConfigured,
    #[error("quote provider timed out")]
    Timeout,
    #[error("quote provider error: {0}")]
    Provider(String),
    #[error("no market data for {0}")]
    NoData(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation failed: {0:?}")]
    Validation(Vec<FieldError>),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Not authorized")]
    NotAuthorized,
    #[error("{0}")]
    Unauthenticated(&'static str),
    #[error("quote unavailable: {0}")]
    QuoteUnavailable(#[from] QuoteError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotAuthorized | AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::QuoteUnavailable(QuoteError::NoData(_)) => StatusCode::NOT_FOUND,
            AppError::QuoteUnavailable(_) | AppError::Database(_) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::invalid("body", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::invalid("query", rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(errors) => json!({ "success": false, "errors": errors }),
            AppError::NotFound(what) => {
                json!({ "success": false, "message": format!("{} not found", what) })
            }
            AppError::NotAuthorized => json!({ "success": false, "message": "Not authorized" }),
            AppError::Unauthenticated(reason) => json!({ "success": false, "message": reason }),
            AppError::QuoteUnavailable(QuoteError::NoData(_)) => {
                json!({ "success": false, "message": "Stock data not found" })
            }
            AppError::QuoteUnavailable(QuoteError::NotConfigured) => {
                tracing::error!("{}", self);
                json!({ "success": false, "message": "Stock API not configured" })
            }
            AppError::QuoteUnavailable(e) => {
                tracing::error!("{}", self);
                server_error("Error fetching stock data", e)
            }
            AppError::Database(e) => {
                tracing::error!("{}", self);
                server_error("Server Error", e)
            }
            AppError::Unexpected(e) => {
                tracing::error!("{:#}", e);
                server_error("Server Error", e)
            }
        };
        (status, Json(body)).into_response()
    }
}

fn server_error(message: &str, detail: &dyn std::fmt::Display) -> serde_json::Value {
    if EXPOSE_DETAILS.load(Ordering::Relaxed) {
        json!({ "success": false, "message": message, "error": detail.to_string() })
    } else {
        json!({ "success": false, "message": message })
    }
}
