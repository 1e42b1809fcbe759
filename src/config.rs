use std::env;
use std::time::Duration;

pub const DEFAULT_ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub alpha_vantage_api_key: Option<String>,
    pub alpha_vantage_base_url: String,
    pub quote_cache_ttl: Duration,
    pub quote_timeout: Duration,
    pub frontend_url: String,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u16>()
            .map_err(|_| anyhow::anyhow!("Invalid PORT value"))?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;

        // A missing key is not fatal: quote lookups report it per request.
        let alpha_vantage_api_key = env::var("ALPHA_VANTAGE_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let alpha_vantage_base_url = env::var("ALPHA_VANTAGE_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_ALPHA_VANTAGE_URL.to_string());

        let quote_cache_ttl = Duration::from_secs(parse_secs("QUOTE_CACHE_TTL_SECS", 300)?);
        let quote_timeout = Duration::from_secs(parse_secs("QUOTE_TIMEOUT_SECS", 10)?);

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            Ok("development") | Err(_) => Environment::Development,
            Ok(other) => anyhow::bail!("Invalid APP_ENV value: {}", other),
        };

        Ok(Config {
            database_url,
            port,
            jwt_secret,
            alpha_vantage_api_key,
            alpha_vantage_base_url,
            quote_cache_ttl,
            quote_timeout,
            frontend_url,
            environment,
        })
    }
}

fn parse_secs(name: &str, default: u64) -> anyhow::Result<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("Invalid {} value", name)),
        Err(_) => Ok(default),
    }
}
