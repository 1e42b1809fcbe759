use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use finance_backend::auth::JwtKeys;
use finance_backend::config::Config;
use finance_backend::database::Database;
use finance_backend::error::expose_error_details;
use finance_backend::repositories::PgStore;
use finance_backend::services::alpha_vantage::AlphaVantageClient;
use finance_backend::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("finance_backend=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;
    expose_error_details(config.environment.is_development());

    // Initialize database
    let db = Database::new(&config.database_url).await?;
    db.ensure_schema().await?;
    let store = Arc::new(PgStore::new(db.pool().clone()));

    if config.alpha_vantage_api_key.is_none() {
        tracing::warn!("⚠️ ALPHA_VANTAGE_API_KEY not set; quote lookups will fail");
    }
    let provider = AlphaVantageClient::new(
        config.alpha_vantage_api_key.clone(),
        config.quote_timeout,
    )?
    .with_base_url(config.alpha_vantage_base_url.clone());

    let state = AppState::new(
        store.clone(),
        store,
        Arc::new(provider),
        config.quote_cache_ttl,
        JwtKeys::new(config.jwt_secret.as_bytes()),
    );

    // Build application
    let app = finance_backend::router(state).layer(
        CorsLayer::new()
            .allow_origin(config.frontend_url.parse::<HeaderValue>()?)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]),
    );

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(
        "🚀 Finance Backend running in {:?} mode on http://{}",
        config.environment,
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
