//! In-memory storage, used by tests and local runs without PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{HoldingRepository, LedgerRepository, MergeFn};
use crate::error::AppResult;
use crate::models::{EntryFilter, Holding, LedgerEntry, OwnerId};

#[derive(Default)]
pub struct MemoryStore {
    holdings: RwLock<HashMap<Uuid, Holding>>,
    entries: RwLock<HashMap<Uuid, LedgerEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HoldingRepository for MemoryStore {
    async fn find(&self, id: Uuid) -> AppResult<Option<Holding>> {
        Ok(self.holdings.read().await.get(&id).cloned())
    }

    async fn find_by_symbol(&self, owner: OwnerId, symbol: &str) -> AppResult<Option<Holding>> {
        let holdings = self.holdings.read().await;
        Ok(holdings
            .values()
            .find(|h| h.owner_id == owner && h.symbol == symbol)
            .cloned())
    }

    async fn list_for_owner(&self, owner: OwnerId) -> AppResult<Vec<Holding>> {
        let holdings = self.holdings.read().await;
        let mut owned: Vec<Holding> = holdings
            .values()
            .filter(|h| h.owner_id == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.symbol.cmp(&b.symbol)));
        Ok(owned)
    }

    async fn upsert_position(
        &self,
        fresh: &Holding,
        merge: MergeFn<'_>,
    ) -> AppResult<(Holding, bool)> {
        let mut holdings = self.holdings.write().await;
        let existing = holdings
            .values_mut()
            .find(|h| h.owner_id == fresh.owner_id && h.symbol == fresh.symbol);

        match existing {
            Some(held) => {
                let (shares, cost_basis) = merge(held)?;
                held.shares = shares;
                held.cost_basis = cost_basis;
                held.updated_at = fresh.updated_at;
                Ok((held.clone(), false))
            }
            None => {
                holdings.insert(fresh.id, fresh.clone());
                Ok((fresh.clone(), true))
            }
        }
    }

    async fn update(&self, holding: &Holding) -> AppResult<()> {
        self.holdings
            .write()
            .await
            .insert(holding.id, holding.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.holdings.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl LedgerRepository for MemoryStore {
    async fn find(&self, id: Uuid) -> AppResult<Option<LedgerEntry>> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn list(&self, owner: OwnerId, filter: &EntryFilter) -> AppResult<Vec<LedgerEntry>> {
        let entries = self.entries.read().await;
        let mut matched: Vec<LedgerEntry> = entries
            .values()
            .filter(|e| e.owner_id == owner && filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| filter.sort.compare(a, b).then(b.created_at.cmp(&a.created_at)));
        Ok(matched)
    }

    async fn list_since(
        &self,
        owner: OwnerId,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|e| e.owner_id == owner && e.occurred_on >= since)
            .cloned()
            .collect())
    }

    async fn insert(&self, entry: &LedgerEntry) -> AppResult<()> {
        self.entries.write().await.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn update(&self, entry: &LedgerEntry) -> AppResult<()> {
        self.entries.write().await.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.entries.write().await.remove(&id).is_some())
    }
}
