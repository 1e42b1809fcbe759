use sqlx::PgPool;
use tracing::info;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS holdings (
        id UUID PRIMARY KEY,
        owner_id UUID NOT NULL,
        symbol TEXT NOT NULL,
        shares NUMERIC NOT NULL CHECK (shares >= 0),
        cost_basis NUMERIC NOT NULL CHECK (cost_basis >= 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS holdings_owner_symbol_idx ON holdings (owner_id, symbol)",
    "CREATE TABLE IF NOT EXISTS ledger_entries (
        id UUID PRIMARY KEY,
        owner_id UUID NOT NULL,
        kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
        category TEXT NOT NULL,
        amount NUMERIC NOT NULL CHECK (amount >= 0),
        occurred_on TIMESTAMPTZ NOT NULL,
        note TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE INDEX IF NOT EXISTS ledger_entries_owner_date_idx ON ledger_entries (owner_id, occurred_on DESC)",
    "CREATE INDEX IF NOT EXISTS ledger_entries_owner_kind_idx ON ledger_entries (owner_id, kind)",
];

pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = database_url
            .parse::<sqlx::postgres::PgConnectOptions>()?
            .statement_cache_capacity(0);

        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Create tables and indexes that do not exist yet.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA.iter().copied() {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("🗄️ Database schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
