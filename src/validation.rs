//! Request schemas for the write/query endpoints and their validation into
//! typed commands. Every field problem is collected so the client gets the
//! full list in one response.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::error::FieldError;
use crate::models::{
    EntryFilter, EntryKind, HoldingPatch, LedgerEntryPatch, NewLedgerEntry, NewPurchase,
    SortOrder,
};
use crate::utils::{normalize_symbol, parse_date, parse_end_date};

pub type Validated<T> = Result<T, Vec<FieldError>>;

/// Upper bound for share counts, prices and amounts. Keeps every product and
/// sum the services compute well inside `Decimal`'s range.
pub const MAX_MAGNITUDE: Decimal = dec!(1000000000000);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingInput {
    #[serde(alias = "stockSymbol")]
    pub symbol: Option<String>,
    pub shares: Option<Decimal>,
    #[serde(alias = "purchasePrice", alias = "costBasis")]
    pub price: Option<Decimal>,
}

impl HoldingInput {
    pub fn into_purchase(self) -> Validated<NewPurchase> {
        let mut errors = Vec::new();

        let symbol = match self.symbol.as_deref().and_then(normalize_symbol) {
            Some(symbol) => Some(symbol),
            None => {
                errors.push(FieldError::new("symbol", "Stock symbol is required"));
                None
            }
        };
        let shares = required_non_negative(self.shares, "shares", "Shares", &mut errors);
        let price = required_non_negative(self.price, "price", "Purchase price", &mut errors);

        match (symbol, shares, price) {
            (Some(symbol), Some(shares), Some(price)) if errors.is_empty() => Ok(NewPurchase {
                symbol,
                shares,
                price,
            }),
            _ => Err(errors),
        }
    }

    pub fn into_patch(self) -> Validated<HoldingPatch> {
        let mut errors = Vec::new();

        let symbol = match self.symbol.as_deref() {
            Some(raw) => match normalize_symbol(raw) {
                Some(symbol) => Some(symbol),
                None => {
                    errors.push(FieldError::new("symbol", "Stock symbol cannot be empty"));
                    None
                }
            },
            None => None,
        };
        let shares = optional_non_negative(self.shares, "shares", "Shares", &mut errors);
        let cost_basis =
            optional_non_negative(self.price, "price", "Purchase price", &mut errors);

        if errors.is_empty() {
            Ok(HoldingPatch {
                symbol,
                shares,
                cost_basis,
            })
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryInput {
    #[serde(rename = "type", alias = "kind")]
    pub kind: Option<String>,
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub date: Option<String>,
    #[serde(alias = "description")]
    pub note: Option<String>,
}

impl LedgerEntryInput {
    pub fn into_new_entry(self, now: DateTime<Utc>) -> Validated<NewLedgerEntry> {
        let mut errors = Vec::new();

        let kind = match self.kind.as_deref() {
            Some(raw) => parse_kind(raw, &mut errors),
            None => {
                errors.push(FieldError::new("type", "Type must be income or expense"));
                None
            }
        };
        let category = match self.category.as_deref() {
            Some(raw) => parse_category(raw, &mut errors),
            None => {
                errors.push(FieldError::new("category", "Category is required"));
                None
            }
        };
        let amount = required_non_negative(self.amount, "amount", "Amount", &mut errors);
        let occurred_on = match self.date.as_deref() {
            Some(raw) => parse_entry_date(raw, &mut errors),
            None => Some(now),
        };
        let note = self.note.map(|n| n.trim().to_string()).unwrap_or_default();

        match (kind, category, amount, occurred_on) {
            (Some(kind), Some(category), Some(amount), Some(occurred_on)) if errors.is_empty() => {
                Ok(NewLedgerEntry {
                    kind,
                    category,
                    amount,
                    occurred_on,
                    note,
                })
            }
            _ => Err(errors),
        }
    }

    pub fn into_patch(self) -> Validated<LedgerEntryPatch> {
        let mut errors = Vec::new();

        let kind = self
            .kind
            .as_deref()
            .and_then(|raw| parse_kind(raw, &mut errors));
        let category = self
            .category
            .as_deref()
            .and_then(|raw| parse_category(raw, &mut errors));
        let amount = optional_non_negative(self.amount, "amount", "Amount", &mut errors);
        let occurred_on = self
            .date
            .as_deref()
            .and_then(|raw| parse_entry_date(raw, &mut errors));
        let note = self.note.map(|n| n.trim().to_string());

        if errors.is_empty() {
            Ok(LedgerEntryPatch {
                kind,
                category,
                amount,
                occurred_on,
                note,
            })
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort: Option<String>,
}

impl EntryQuery {
    pub fn into_filter(self) -> Validated<EntryFilter> {
        let mut errors = Vec::new();

        let kind = non_blank(self.kind).and_then(|raw| parse_kind(&raw, &mut errors));
        let category = non_blank(self.category).map(|c| c.trim().to_string());
        let from = non_blank(self.start_date).and_then(|raw| {
            let parsed = parse_date(&raw);
            if parsed.is_none() {
                errors.push(FieldError::new("startDate", "Invalid date format"));
            }
            parsed
        });
        let to = non_blank(self.end_date).and_then(|raw| {
            let parsed = parse_end_date(&raw);
            if parsed.is_none() {
                errors.push(FieldError::new("endDate", "Invalid date format"));
            }
            parsed
        });
        let sort = match non_blank(self.sort) {
            Some(raw) => SortOrder::parse(&raw).unwrap_or_else(|| {
                errors.push(FieldError::new(
                    "sort",
                    "Sort must be one of date, amount, category, createdAt (prefix - for descending)",
                ));
                SortOrder::default()
            }),
            None => SortOrder::default(),
        };

        if errors.is_empty() {
            Ok(EntryFilter {
                kind,
                category,
                from,
                to,
                sort,
            })
        } else {
            Err(errors)
        }
    }
}

pub const DEFAULT_MONTHS_BACK: u32 = 6;
pub const MAX_MONTHS_BACK: u32 = 120;

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub months: Option<String>,
}

impl StatsQuery {
    pub fn months_back(&self) -> Validated<u32> {
        match non_blank(self.months.clone()) {
            None => Ok(DEFAULT_MONTHS_BACK),
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(months) if (1..=MAX_MONTHS_BACK).contains(&months) => Ok(months),
                _ => Err(vec![FieldError::new(
                    "months",
                    format!("Months must be a whole number between 1 and {}", MAX_MONTHS_BACK),
                )]),
            },
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_kind(raw: &str, errors: &mut Vec<FieldError>) -> Option<EntryKind> {
    let kind = EntryKind::parse(raw);
    if kind.is_none() {
        errors.push(FieldError::new("type", "Type must be income or expense"));
    }
    kind
}

fn parse_category(raw: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    let category = raw.trim();
    if category.is_empty() {
        errors.push(FieldError::new("category", "Category cannot be empty"));
        None
    } else {
        Some(category.to_string())
    }
}

fn parse_entry_date(raw: &str, errors: &mut Vec<FieldError>) -> Option<DateTime<Utc>> {
    let parsed = parse_date(raw);
    if parsed.is_none() {
        errors.push(FieldError::new("date", "Invalid date format"));
    }
    parsed
}

fn required_non_negative(
    value: Option<Decimal>,
    field: &str,
    label: &str,
    errors: &mut Vec<FieldError>,
) -> Option<Decimal> {
    match value {
        Some(_) => optional_non_negative(value, field, label, errors),
        None => {
            errors.push(FieldError::new(field, format!("{} is required", label)));
            None
        }
    }
}

fn optional_non_negative(
    value: Option<Decimal>,
    field: &str,
    label: &str,
    errors: &mut Vec<FieldError>,
) -> Option<Decimal> {
    match value {
        Some(v) if v < Decimal::ZERO => {
            errors.push(FieldError::new(
                field,
                format!("{} must be a positive number", label),
            ));
            None
        }
        Some(v) if v > MAX_MAGNITUDE => {
            errors.push(FieldError::new(
                field,
                format!("{} must be at most {}", label, MAX_MAGNITUDE),
            ));
            None
        }
        other => other,
    }
}
