use anyhow::anyhow;
use chrono::{DateTime, Datelike, Months, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::access::authorize;
use crate::error::{AppError, AppResult};
use crate::models::{
    CategoryTotal, EntryFilter, EntryKind, LedgerEntry, LedgerEntryPatch, LedgerSummary,
    MonthlyTotal, NewLedgerEntry, OwnerId, PeriodBreakdown,
};
use crate::repositories::LedgerRepository;
use crate::validation::MAX_MAGNITUDE;

const RECORD: &str = "Transaction";

fn add_amount(total: Decimal, amount: Decimal) -> AppResult<Decimal> {
    total
        .checked_add(amount)
        .ok_or_else(|| AppError::Unexpected(anyhow!("transaction total is out of range")))
}

pub fn summarize(entries: &[LedgerEntry]) -> AppResult<LedgerSummary> {
    let mut summary = LedgerSummary::default();
    for entry in entries {
        match entry.kind {
            EntryKind::Income => {
                summary.total_income = add_amount(summary.total_income, entry.amount)?
            }
            EntryKind::Expense => {
                summary.total_expense = add_amount(summary.total_expense, entry.amount)?
            }
        }
    }
    summary.net_balance = summary.total_income - summary.total_expense;
    Ok(summary)
}

/// Start of the trailing window covering `months` calendar months before `now`.
pub fn window_start(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Monthly totals ordered by period (income first within a month) and
/// category totals ordered by amount, largest first.
pub fn breakdown(entries: &[LedgerEntry]) -> AppResult<PeriodBreakdown> {
    let mut by_month: BTreeMap<(i32, u32, EntryKind), Decimal> = BTreeMap::new();
    let mut by_category: BTreeMap<(String, EntryKind), Decimal> = BTreeMap::new();

    for entry in entries {
        let month = (entry.occurred_on.year(), entry.occurred_on.month(), entry.kind);
        let total = by_month.entry(month).or_default();
        *total = add_amount(*total, entry.amount)?;
        let total = by_category
            .entry((entry.category.clone(), entry.kind))
            .or_default();
        *total = add_amount(*total, entry.amount)?;
    }

    let monthly_data = by_month
        .into_iter()
        .map(|((year, month, kind), total)| MonthlyTotal {
            year,
            month,
            kind,
            total,
        })
        .collect();

    let mut category_data: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|((category, kind), total)| CategoryTotal {
            category,
            kind,
            total,
        })
        .collect();
    // Stable sort keeps the (category, kind) order for equal totals.
    category_data.sort_by(|a, b| b.total.cmp(&a.total));

    Ok(PeriodBreakdown {
        monthly_data,
        category_data,
    })
}

pub struct LedgerService {
    entries: Arc<dyn LedgerRepository>,
}

impl LedgerService {
    pub fn new(entries: Arc<dyn LedgerRepository>) -> Self {
        Self { entries }
    }

    pub async fn record(&self, owner: OwnerId, new: NewLedgerEntry) -> AppResult<LedgerEntry> {
        if new.amount < Decimal::ZERO {
            return Err(AppError::invalid("amount", "Amount must be a positive number"));
        }
        if new.amount > MAX_MAGNITUDE {
            return Err(AppError::invalid(
                "amount",
                format!("Amount must be at most {}", MAX_MAGNITUDE),
            ));
        }
        if new.category.trim().is_empty() {
            return Err(AppError::invalid("category", "Category is required"));
        }

        let now = Utc::now();
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            owner_id: owner,
            kind: new.kind,
            category: new.category.trim().to_string(),
            amount: new.amount,
            occurred_on: new.occurred_on,
            note: new.note,
            created_at: now,
            updated_at: now,
        };
        self.entries.insert(&entry).await?;
        info!(
            "💵 Recorded {} {} ({}) for {}",
            entry.kind.as_str(),
            entry.amount,
            entry.category,
            owner
        );
        Ok(entry)
    }

    pub async fn list(&self, owner: OwnerId, filter: &EntryFilter) -> AppResult<Vec<LedgerEntry>> {
        self.entries.list(owner, filter).await
    }

    pub async fn get(&self, owner: OwnerId, id: Uuid) -> AppResult<LedgerEntry> {
        authorize(self.entries.find(id).await?, owner, RECORD)
    }

    pub async fn update(
        &self,
        owner: OwnerId,
        id: Uuid,
        patch: LedgerEntryPatch,
    ) -> AppResult<LedgerEntry> {
        let mut entry = self.get(owner, id).await?;

        if let Some(kind) = patch.kind {
            entry.kind = kind;
        }
        if let Some(category) = patch.category {
            entry.category = category;
        }
        if let Some(amount) = patch.amount {
            entry.amount = amount;
        }
        if let Some(occurred_on) = patch.occurred_on {
            entry.occurred_on = occurred_on;
        }
        if let Some(note) = patch.note {
            entry.note = note;
        }
        entry.updated_at = Utc::now();

        self.entries.update(&entry).await?;
        info!("✏️ Updated transaction {} for {}", entry.id, owner);
        Ok(entry)
    }

    pub async fn delete(&self, owner: OwnerId, id: Uuid) -> AppResult<()> {
        let entry = self.get(owner, id).await?;
        if !self.entries.delete(entry.id).await? {
            return Err(AppError::NotFound(RECORD));
        }
        info!("🗑️ Deleted transaction {} for {}", entry.id, owner);
        Ok(())
    }

    pub async fn period_breakdown(
        &self,
        owner: OwnerId,
        months_back: u32,
        now: DateTime<Utc>,
    ) -> AppResult<PeriodBreakdown> {
        let since = window_start(now, months_back);
        let entries = self.entries.list_since(owner, since).await?;
        breakdown(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryStore;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn new_entry(kind: EntryKind, category: &str, amount: Decimal, on: DateTime<Utc>) -> NewLedgerEntry {
        NewLedgerEntry {
            kind,
            category: category.to_string(),
            amount,
            occurred_on: on,
            note: String::new(),
        }
    }

    #[test]
    fn empty_summary_is_zero() {
        let summary = summarize(&[]).unwrap();
        assert_eq!(summary, LedgerSummary::default());
        assert_eq!(summary.net_balance, summary.total_income - summary.total_expense);
    }

    fn stored(kind: EntryKind, amount: Decimal) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            kind,
            category: "Windfall".into(),
            amount,
            occurred_on: at(2024, 1, 1),
            note: String::new(),
            created_at: at(2024, 1, 1),
            updated_at: at(2024, 1, 1),
        }
    }

    #[test]
    fn out_of_range_totals_are_errors_not_panics() {
        let entries = [
            stored(EntryKind::Income, Decimal::MAX),
            stored(EntryKind::Income, Decimal::MAX),
        ];
        assert!(matches!(summarize(&entries), Err(AppError::Unexpected(_))));
        assert!(matches!(breakdown(&entries), Err(AppError::Unexpected(_))));
    }

    #[tokio::test]
    async fn oversized_amount_is_rejected() {
        let svc = LedgerService::new(Arc::new(MemoryStore::new()));
        let owner = Uuid::new_v4();
        let err = svc
            .record(owner, new_entry(EntryKind::Income, "Lottery", Decimal::MAX, at(2024, 1, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        svc.record(owner, new_entry(EntryKind::Income, "Lottery", MAX_MAGNITUDE, at(2024, 1, 1)))
            .await
            .unwrap();
        let entries = svc.list(owner, &EntryFilter::default()).await.unwrap();
        assert_eq!(summarize(&entries).unwrap().net_balance, MAX_MAGNITUDE);
    }

    #[test]
    fn window_start_goes_back_calendar_months() {
        assert_eq!(window_start(at(2024, 8, 31), 6), at(2024, 2, 29));
        assert_eq!(window_start(at(2024, 3, 15), 3), at(2023, 12, 15));
    }

    #[tokio::test]
    async fn summary_nets_income_against_expense() {
        let svc = LedgerService::new(Arc::new(MemoryStore::new()));
        let owner = Uuid::new_v4();
        svc.record(owner, new_entry(EntryKind::Income, "Salary", dec!(3000), at(2024, 1, 31)))
            .await
            .unwrap();
        svc.record(owner, new_entry(EntryKind::Expense, "Rent", dec!(1200), at(2024, 2, 1)))
            .await
            .unwrap();
        svc.record(owner, new_entry(EntryKind::Expense, "Food", dec!(250.5), at(2024, 2, 3)))
            .await
            .unwrap();

        let entries = svc.list(owner, &EntryFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].category, "Food");

        let summary = summarize(&entries).unwrap();
        assert_eq!(summary.total_income, dec!(3000));
        assert_eq!(summary.total_expense, dec!(1450.5));
        assert_eq!(summary.net_balance, dec!(1549.5));

        let expenses_only = EntryFilter {
            kind: Some(EntryKind::Expense),
            ..EntryFilter::default()
        };
        let expenses = svc.list(owner, &expenses_only).await.unwrap();
        let summary = summarize(&expenses).unwrap();
        assert_eq!(summary.total_income, dec!(0));
        assert_eq!(summary.net_balance, dec!(-1450.5));
    }

    #[tokio::test]
    async fn breakdown_groups_trailing_months() {
        let svc = LedgerService::new(Arc::new(MemoryStore::new()));
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let entries = [
            (EntryKind::Income, "Salary", dec!(3000), at(2024, 5, 1)),
            (EntryKind::Expense, "Rent", dec!(1000), at(2024, 5, 2)),
            (EntryKind::Expense, "Food", dec!(200), at(2024, 5, 20)),
            (EntryKind::Expense, "Food", dec!(300), at(2024, 6, 2)),
            (EntryKind::Income, "Salary", dec!(3000), at(2024, 6, 1)),
            // outside the window
            (EntryKind::Expense, "Rent", dec!(999), at(2023, 11, 1)),
        ];
        for (kind, category, amount, on) in entries {
            svc.record(owner, new_entry(kind, category, amount, on))
                .await
                .unwrap();
        }
        svc.record(other, new_entry(EntryKind::Income, "Salary", dec!(1), at(2024, 6, 1)))
            .await
            .unwrap();

        let result = svc
            .period_breakdown(owner, 6, at(2024, 6, 15))
            .await
            .unwrap();

        let monthly: Vec<(i32, u32, EntryKind, Decimal)> = result
            .monthly_data
            .iter()
            .map(|m| (m.year, m.month, m.kind, m.total))
            .collect();
        assert_eq!(
            monthly,
            vec![
                (2024, 5, EntryKind::Income, dec!(3000)),
                (2024, 5, EntryKind::Expense, dec!(1200)),
                (2024, 6, EntryKind::Income, dec!(3000)),
                (2024, 6, EntryKind::Expense, dec!(300)),
            ]
        );

        let categories: Vec<(&str, Decimal)> = result
            .category_data
            .iter()
            .map(|c| (c.category.as_str(), c.total))
            .collect();
        assert_eq!(
            categories,
            vec![("Salary", dec!(6000)), ("Rent", dec!(1000)), ("Food", dec!(500))]
        );
    }

    #[tokio::test]
    async fn foreign_entries_are_not_authorized() {
        let svc = LedgerService::new(Arc::new(MemoryStore::new()));
        let owner = Uuid::new_v4();
        let entry = svc
            .record(owner, new_entry(EntryKind::Expense, "Gym", dec!(40), at(2024, 1, 1)))
            .await
            .unwrap();

        let intruder = Uuid::new_v4();
        assert!(matches!(
            svc.update(intruder, entry.id, LedgerEntryPatch::default()).await,
            Err(AppError::NotAuthorized)
        ));
        assert!(matches!(
            svc.delete(intruder, entry.id).await,
            Err(AppError::NotAuthorized)
        ));
        assert!(matches!(
            svc.get(owner, Uuid::new_v4()).await,
            Err(AppError::NotFound("Transaction"))
        ));

        let patch = LedgerEntryPatch {
            amount: Some(dec!(45)),
            note: Some("annual fee".into()),
            ..LedgerEntryPatch::default()
        };
        let updated = svc.update(owner, entry.id, patch).await.unwrap();
        assert_eq!(updated.amount, dec!(45));
        assert_eq!(updated.category, "Gym");
        assert_eq!(updated.note, "annual fee");

        svc.delete(owner, entry.id).await.unwrap();
        assert!(matches!(
            svc.get(owner, entry.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
