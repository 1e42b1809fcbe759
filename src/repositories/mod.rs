use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{EntryFilter, Holding, LedgerEntry, OwnerId};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Computes `(shares, cost_basis)` for an existing position absorbing a purchase.
pub type MergeFn<'a> = &'a (dyn Fn(&Holding) -> AppResult<(Decimal, Decimal)> + Send + Sync);

#[async_trait]
pub trait HoldingRepository: Send + Sync {
    async fn find(&self, id: Uuid) -> AppResult<Option<Holding>>;

    async fn find_by_symbol(&self, owner: OwnerId, symbol: &str) -> AppResult<Option<Holding>>;

    /// All holdings of `owner`, oldest first.
    async fn list_for_owner(&self, owner: OwnerId) -> AppResult<Vec<Holding>>;

    /// Store `fresh` if its owner holds no position in its symbol yet.
    /// Otherwise rewrite the existing position with `merge(&existing)` and
    /// `fresh.updated_at`. Concurrent calls for one position are serialized.
    /// Returns the stored holding and whether it was created.
    async fn upsert_position(&self, fresh: &Holding, merge: MergeFn<'_>)
        -> AppResult<(Holding, bool)>;

    /// Replace the stored row with `holding`.
    async fn update(&self, holding: &Holding) -> AppResult<()>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn find(&self, id: Uuid) -> AppResult<Option<LedgerEntry>>;

    /// Entries of `owner` matching `filter`, ordered by `filter.sort`.
    async fn list(&self, owner: OwnerId, filter: &EntryFilter) -> AppResult<Vec<LedgerEntry>>;

    /// Entries of `owner` dated at or after `since`.
    async fn list_since(&self, owner: OwnerId, since: DateTime<Utc>)
        -> AppResult<Vec<LedgerEntry>>;

    async fn insert(&self, entry: &LedgerEntry) -> AppResult<()>;

    async fn update(&self, entry: &LedgerEntry) -> AppResult<()>;

    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}
