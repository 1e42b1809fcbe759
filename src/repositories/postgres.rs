use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{HoldingRepository, LedgerRepository, MergeFn};
use crate::error::{AppError, AppResult};
use crate::models::{EntryFilter, EntryKind, Holding, LedgerEntry, OwnerId};

const HOLDING_COLUMNS: &str =
    "id, owner_id, symbol, shares, cost_basis, created_at, updated_at";
const ENTRY_COLUMNS: &str =
    "id, owner_id, kind, category, amount, occurred_on, note, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    owner_id: Uuid,
    kind: String,
    category: String,
    amount: Decimal,
    occurred_on: DateTime<Utc>,
    note: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let kind = EntryKind::parse(&row.kind)
            .ok_or_else(|| anyhow!("ledger entry {} has unknown kind {:?}", row.id, row.kind))?;
        Ok(LedgerEntry {
            id: row.id,
            owner_id: row.owner_id,
            kind,
            category: row.category,
            amount: row.amount,
            occurred_on: row.occurred_on,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_entries(rows: Vec<EntryRow>) -> AppResult<Vec<LedgerEntry>> {
    rows.into_iter().map(LedgerEntry::try_from).collect()
}

#[async_trait]
impl HoldingRepository for PgStore {
    async fn find(&self, id: Uuid) -> AppResult<Option<Holding>> {
        let holding = sqlx::query_as::<_, Holding>(&format!(
            "SELECT {} FROM holdings WHERE id = $1",
            HOLDING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(holding)
    }

    async fn find_by_symbol(&self, owner: OwnerId, symbol: &str) -> AppResult<Option<Holding>> {
        let holding = sqlx::query_as::<_, Holding>(&format!(
            "SELECT {} FROM holdings WHERE owner_id = $1 AND symbol = $2",
            HOLDING_COLUMNS
        ))
        .bind(owner)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;
        Ok(holding)
    }

    async fn list_for_owner(&self, owner: OwnerId) -> AppResult<Vec<Holding>> {
        let holdings = sqlx::query_as::<_, Holding>(&format!(
            "SELECT {} FROM holdings WHERE owner_id = $1 ORDER BY created_at ASC, symbol ASC",
            HOLDING_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(holdings)
    }

    async fn upsert_position(
        &self,
        fresh: &Holding,
        merge: MergeFn<'_>,
    ) -> AppResult<(Holding, bool)> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Holding>(&format!(
            "INSERT INTO holdings (id, owner_id, symbol, shares, cost_basis, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (owner_id, symbol) DO NOTHING RETURNING {}",
            HOLDING_COLUMNS
        ))
        .bind(fresh.id)
        .bind(fresh.owner_id)
        .bind(&fresh.symbol)
        .bind(fresh.shares)
        .bind(fresh.cost_basis)
        .bind(fresh.created_at)
        .bind(fresh.updated_at)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(holding) = inserted {
            tx.commit().await?;
            return Ok((holding, true));
        }

        // Row lock held until commit, so concurrent merges apply one after another.
        let mut holding = sqlx::query_as::<_, Holding>(&format!(
            "SELECT {} FROM holdings WHERE owner_id = $1 AND symbol = $2 FOR UPDATE",
            HOLDING_COLUMNS
        ))
        .bind(fresh.owner_id)
        .bind(&fresh.symbol)
        .fetch_one(&mut *tx)
        .await?;

        let (shares, cost_basis) = merge(&holding)?;
        holding.shares = shares;
        holding.cost_basis = cost_basis;
        holding.updated_at = fresh.updated_at;

        sqlx::query(
            "UPDATE holdings SET shares = $1, cost_basis = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(holding.shares)
        .bind(holding.cost_basis)
        .bind(holding.updated_at)
        .bind(holding.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((holding, false))
    }

    async fn update(&self, holding: &Holding) -> AppResult<()> {
        sqlx::query(
            "UPDATE holdings SET symbol = $1, shares = $2, cost_basis = $3, updated_at = $4 \
             WHERE id = $5",
        )
        .bind(&holding.symbol)
        .bind(holding.shares)
        .bind(holding.cost_basis)
        .bind(holding.updated_at)
        .bind(holding.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM holdings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl LedgerRepository for PgStore {
    async fn find(&self, id: Uuid) -> AppResult<Option<LedgerEntry>> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM ledger_entries WHERE id = $1",
            ENTRY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(LedgerEntry::try_from).transpose()
    }

    async fn list(&self, owner: OwnerId, filter: &EntryFilter) -> AppResult<Vec<LedgerEntry>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM ledger_entries WHERE owner_id = ", ENTRY_COLUMNS));
        query.push_bind(owner);

        if let Some(kind) = filter.kind {
            query.push(" AND kind = ").push_bind(kind.as_str());
        }
        if let Some(category) = &filter.category {
            query.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(from) = filter.from {
            query.push(" AND occurred_on >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND occurred_on <= ").push_bind(to);
        }

        // Column names come from a closed enum, never from the request.
        let direction = if filter.sort.descending { "DESC" } else { "ASC" };
        query.push(format!(
            " ORDER BY {} {}, created_at DESC",
            filter.sort.key.column(),
            direction
        ));

        let rows = query
            .build_query_as::<EntryRow>()
            .fetch_all(&self.pool)
            .await?;
        into_entries(rows)
    }

    async fn list_since(
        &self,
        owner: OwnerId,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM ledger_entries WHERE owner_id = $1 AND occurred_on >= $2",
            ENTRY_COLUMNS
        ))
        .bind(owner)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        into_entries(rows)
    }

    async fn insert(&self, entry: &LedgerEntry) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO ledger_entries \
             (id, owner_id, kind, category, amount, occurred_on, note, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(entry.id)
        .bind(entry.owner_id)
        .bind(entry.kind.as_str())
        .bind(&entry.category)
        .bind(entry.amount)
        .bind(entry.occurred_on)
        .bind(&entry.note)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, entry: &LedgerEntry) -> AppResult<()> {
        sqlx::query(
            "UPDATE ledger_entries SET kind = $1, category = $2, amount = $3, occurred_on = $4, \
             note = $5, updated_at = $6 WHERE id = $7",
        )
        .bind(entry.kind.as_str())
        .bind(&entry.category)
        .bind(entry.amount)
        .bind(entry.occurred_on)
        .bind(&entry.note)
        .bind(entry.updated_at)
        .bind(entry.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM ledger_entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
