use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

pub type OwnerId = Uuid;

/// A recorded position in one symbol. `cost_basis` is the average price paid
/// per share across every purchase merged into this row.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub symbol: String,
    pub shares: Decimal,
    pub cost_basis: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated `POST /portfolio` body.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPurchase {
    pub symbol: String,
    pub shares: Decimal,
    pub price: Decimal,
}

/// Validated `PUT /portfolio/:id` body. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoldingPatch {
    pub symbol: Option<String>,
    pub shares: Option<Decimal>,
    pub cost_basis: Option<Decimal>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingValue {
    #[serde(flatten)]
    pub holding: Holding,
    pub current_price: Option<Decimal>,
    pub current_value: Option<Decimal>,
    pub investment_value: Decimal,
    pub gain_loss: Option<Decimal>,
    pub gain_loss_percentage: Option<Decimal>,
}

#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_value: Decimal,
    pub total_investment: Decimal,
    pub total_gain_loss: Decimal,
    pub total_gain_loss_percentage: Decimal,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PortfolioValuation {
    pub holdings: Vec<HoldingValue>,
    pub summary: PortfolioSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Income => "income",
            EntryKind::Expense => "expense",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "income" => Some(EntryKind::Income),
            "expense" => Some(EntryKind::Expense),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub owner_id: OwnerId,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub category: String,
    pub amount: Decimal,
    #[serde(rename = "date")]
    pub occurred_on: DateTime<Utc>,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub kind: EntryKind,
    pub category: String,
    pub amount: Decimal,
    pub occurred_on: DateTime<Utc>,
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerEntryPatch {
    pub kind: Option<EntryKind>,
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub occurred_on: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Date,
    Amount,
    Category,
    CreatedAt,
}

impl SortKey {
    pub fn column(self) -> &'static str {
        match self {
            SortKey::Date => "occurred_on",
            SortKey::Amount => "amount",
            SortKey::Category => "category",
            SortKey::CreatedAt => "created_at",
        }
    }
}

/// Parsed form of the `sort` query parameter (`date`, `-amount`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub key: SortKey,
    pub descending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder {
            key: SortKey::Date,
            descending: true,
        }
    }
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (descending, field) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw.strip_prefix('+').unwrap_or(raw)),
        };
        let key = match field {
            "date" => SortKey::Date,
            "amount" => SortKey::Amount,
            "category" => SortKey::Category,
            "createdAt" => SortKey::CreatedAt,
            _ => return None,
        };
        Some(SortOrder { key, descending })
    }

    pub fn compare(&self, a: &LedgerEntry, b: &LedgerEntry) -> Ordering {
        let ordering = match self.key {
            SortKey::Date => a.occurred_on.cmp(&b.occurred_on),
            SortKey::Amount => a.amount.cmp(&b.amount),
            SortKey::Category => a.category.cmp(&b.category),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Filters accepted by `GET /transactions`. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    pub kind: Option<EntryKind>,
    pub category: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub sort: SortOrder,
}

impl EntryFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.kind.map_or(true, |kind| entry.kind == kind)
            && self
                .category
                .as_deref()
                .map_or(true, |category| entry.category == category)
            && self.from.map_or(true, |from| entry.occurred_on >= from)
            && self.to.map_or(true, |to| entry.occurred_on <= to)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub net_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: u32,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub total: Decimal,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodBreakdown {
    pub monthly_data: Vec<MonthlyTotal>,
    pub category_data: Vec<CategoryTotal>,
}

/// Current market snapshot for a symbol. Never persisted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub open: Option<Decimal>,
    pub change_absolute: Option<Decimal>,
    pub change_percent: Option<Decimal>,
    pub day_high: Option<Decimal>,
    pub day_low: Option<Decimal>,
    pub volume: Option<u64>,
    pub previous_close: Option<Decimal>,
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub adjusted_close: Option<Decimal>,
    pub volume: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub region: String,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryInterval {
    Daily,
    Weekly,
    Monthly,
}

impl HistoryInterval {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "daily" => Some(HistoryInterval::Daily),
            "weekly" => Some(HistoryInterval::Weekly),
            "monthly" => Some(HistoryInterval::Monthly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HistoryInterval::Daily => "daily",
            HistoryInterval::Weekly => "weekly",
            HistoryInterval::Monthly => "monthly",
        }
    }
}
