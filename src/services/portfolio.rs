use anyhow::anyhow;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::market::MarketData;
use crate::access::authorize;
use crate::error::{AppError, AppResult};
use crate::models::{
    Holding, HoldingPatch, HoldingValue, NewPurchase, OwnerId, PortfolioSummary,
    PortfolioValuation, Quote,
};
use crate::repositories::HoldingRepository;
use crate::validation::MAX_MAGNITUDE;

const RECORD: &str = "Portfolio item";

// Quote lookups in flight per valuation.
const QUOTE_CONCURRENCY: usize = 5;

/// Result of `add_or_merge`: the stored holding and whether a new row was made.
#[derive(Debug)]
pub struct AddOutcome {
    pub holding: Holding,
    pub created: bool,
}

/// Weighted-average merge of a purchase into an existing position.
/// Returns `(shares, cost_basis)`, or `None` if the result leaves `Decimal`'s range.
pub fn merge_purchase(
    held_shares: Decimal,
    held_basis: Decimal,
    shares: Decimal,
    price: Decimal,
) -> Option<(Decimal, Decimal)> {
    let total_shares = held_shares.checked_add(shares)?;
    if total_shares.is_zero() {
        return Some((total_shares, held_basis));
    }
    let total_cost = held_basis
        .checked_mul(held_shares)?
        .checked_add(price.checked_mul(shares)?)?;
    Some((total_shares, total_cost.checked_div(total_shares)?))
}

fn overflow(what: &str, symbol: &str) -> AppError {
    AppError::Unexpected(anyhow!("{} of {} is out of range", what, symbol))
}

fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole > dec!(0) {
        part.checked_div(whole)
            .and_then(|ratio| ratio.checked_mul(dec!(100)))
            .unwrap_or(dec!(0))
    } else {
        dec!(0)
    }
}

/// Value one holding against its quote. A stored position whose investment
/// cannot be represented is an error; a quote that overflows the market value
/// is treated like a missing quote.
pub fn value_holding(holding: Holding, quote: Option<&Quote>) -> AppResult<HoldingValue> {
    let investment_value = holding
        .shares
        .checked_mul(holding.cost_basis)
        .ok_or_else(|| overflow("investment", &holding.symbol))?;

    let priced = quote.and_then(|quote| {
        let current_value = holding.shares.checked_mul(quote.price);
        if current_value.is_none() {
            warn!("⚠️ Market value of {} is out of range", holding.symbol);
        }
        current_value.map(|value| (quote.price, value))
    });

    Ok(match priced {
        Some((price, current_value)) => {
            let gain_loss = current_value - investment_value;
            HoldingValue {
                holding,
                current_price: Some(price),
                current_value: Some(current_value),
                investment_value,
                gain_loss: Some(gain_loss),
                gain_loss_percentage: Some(percentage(gain_loss, investment_value)),
            }
        }
        None => HoldingValue {
            holding,
            current_price: None,
            current_value: None,
            investment_value,
            gain_loss: None,
            gain_loss_percentage: None,
        },
    })
}

/// Totals over holdings that were priced. Unpriced holdings contribute
/// nothing, not even their investment.
pub fn summarize(values: &[HoldingValue]) -> AppResult<PortfolioSummary> {
    let mut total_value = dec!(0);
    let mut total_investment = dec!(0);

    for value in values {
        if let Some(current_value) = value.current_value {
            total_value = total_value
                .checked_add(current_value)
                .ok_or_else(|| overflow("total value", &value.holding.symbol))?;
            total_investment = total_investment
                .checked_add(value.investment_value)
                .ok_or_else(|| overflow("total investment", &value.holding.symbol))?;
        }
    }

    let total_gain_loss = total_value - total_investment;
    Ok(PortfolioSummary {
        total_value,
        total_investment,
        total_gain_loss,
        total_gain_loss_percentage: percentage(total_gain_loss, total_investment),
    })
}

pub struct PortfolioService {
    holdings: Arc<dyn HoldingRepository>,
    market: Arc<MarketData>,
}

impl PortfolioService {
    pub fn new(holdings: Arc<dyn HoldingRepository>, market: Arc<MarketData>) -> Self {
        Self { holdings, market }
    }

    pub async fn add_or_merge(&self, owner: OwnerId, purchase: NewPurchase) -> AppResult<AddOutcome> {
        if purchase.shares < Decimal::ZERO {
            return Err(AppError::invalid("shares", "Shares must be a positive number"));
        }
        if purchase.price < Decimal::ZERO {
            return Err(AppError::invalid("price", "Purchase price must be a positive number"));
        }
        if purchase.shares > MAX_MAGNITUDE || purchase.price > MAX_MAGNITUDE {
            return Err(AppError::invalid(
                "shares",
                format!("Shares and price must be at most {}", MAX_MAGNITUDE),
            ));
        }

        let now = Utc::now();
        let fresh = Holding {
            id: Uuid::new_v4(),
            owner_id: owner,
            symbol: purchase.symbol.clone(),
            shares: purchase.shares,
            cost_basis: purchase.price,
            created_at: now,
            updated_at: now,
        };
        let merge = |held: &Holding| {
            merge_purchase(held.shares, held.cost_basis, purchase.shares, purchase.price)
                .filter(|(shares, _)| *shares <= MAX_MAGNITUDE)
                .ok_or_else(|| {
                    AppError::invalid(
                        "shares",
                        format!("A position cannot hold more than {} shares", MAX_MAGNITUDE),
                    )
                })
        };

        let (holding, created) = self.holdings.upsert_position(&fresh, &merge).await?;
        if created {
            info!(
                "📈 Added {} {} @ {} for {}",
                holding.shares, holding.symbol, holding.cost_basis, owner
            );
        } else {
            info!(
                "📈 Merged {} {} @ {} for {}: {} shares, basis {}",
                purchase.shares,
                purchase.symbol,
                purchase.price,
                owner,
                holding.shares,
                holding.cost_basis
            );
        }
        Ok(AddOutcome { holding, created })
    }

    /// Price every holding of `owner`. A failed quote leaves that holding's
    /// market fields empty instead of failing the whole valuation.
    pub async fn value_portfolio(&self, owner: OwnerId) -> AppResult<PortfolioValuation> {
        let holdings = self.holdings.list_for_owner(owner).await?;
        if holdings.is_empty() {
            return Ok(PortfolioValuation {
                holdings: Vec::new(),
                summary: PortfolioSummary::default(),
            });
        }

        let market = &self.market;
        let values: Vec<AppResult<HoldingValue>> = stream::iter(holdings)
            .map(|holding| async move {
                match market.get_quote(&holding.symbol).await {
                    Ok(quote) => value_holding(holding, Some(&quote.value)),
                    Err(e) => {
                        warn!("⚠️ Error fetching price for {}: {}", holding.symbol, e);
                        value_holding(holding, None)
                    }
                }
            })
            .buffered(QUOTE_CONCURRENCY)
            .collect()
            .await;
        let values = values.into_iter().collect::<AppResult<Vec<_>>>()?;

        let summary = summarize(&values)?;
        Ok(PortfolioValuation {
            holdings: values,
            summary,
        })
    }

    pub async fn get(&self, owner: OwnerId, id: Uuid) -> AppResult<Holding> {
        authorize(self.holdings.find(id).await?, owner, RECORD)
    }

    pub async fn update(&self, owner: OwnerId, id: Uuid, patch: HoldingPatch) -> AppResult<Holding> {
        let mut holding = self.get(owner, id).await?;

        if let Some(symbol) = patch.symbol {
            if symbol != holding.symbol {
                if self.holdings.find_by_symbol(owner, &symbol).await?.is_some() {
                    return Err(AppError::invalid(
                        "symbol",
                        format!("{} is already in the portfolio", symbol),
                    ));
                }
                holding.symbol = symbol;
            }
        }
        let too_large = |v: &Decimal| *v > MAX_MAGNITUDE;
        if patch.shares.as_ref().is_some_and(too_large)
            || patch.cost_basis.as_ref().is_some_and(too_large)
        {
            return Err(AppError::invalid(
                "shares",
                format!("Shares and price must be at most {}", MAX_MAGNITUDE),
            ));
        }
        if let Some(shares) = patch.shares {
            holding.shares = shares;
        }
        if let Some(cost_basis) = patch.cost_basis {
            holding.cost_basis = cost_basis;
        }
        holding.updated_at = Utc::now();

        self.holdings.update(&holding).await?;
        info!("✏️ Updated holding {} ({}) for {}", holding.id, holding.symbol, owner);
        Ok(holding)
    }

    pub async fn delete(&self, owner: OwnerId, id: Uuid) -> AppResult<()> {
        let holding = self.get(owner, id).await?;
        if !self.holdings.delete(holding.id).await? {
            return Err(AppError::NotFound(RECORD));
        }
        info!("🗑️ Deleted holding {} ({}) for {}", holding.id, holding.symbol, owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryStore;
    use crate::services::market::testing::StaticProvider;
    use std::time::Duration;

    fn service(prices: &[(&str, Decimal)]) -> PortfolioService {
        let provider = Arc::new(StaticProvider::with_prices(prices));
        let market = Arc::new(MarketData::new(provider, Duration::from_secs(300)));
        PortfolioService::new(Arc::new(MemoryStore::new()), market)
    }

    fn purchase(symbol: &str, shares: Decimal, price: Decimal) -> NewPurchase {
        NewPurchase {
            symbol: symbol.to_string(),
            shares,
            price,
        }
    }

    #[test]
    fn merge_weights_by_share_count() {
        let (shares, basis) = merge_purchase(dec!(10), dec!(100), dec!(30), dec!(200)).unwrap();
        assert_eq!(shares, dec!(40));
        assert_eq!(basis, dec!(175));
    }

    #[test]
    fn merge_of_nothing_keeps_basis() {
        assert_eq!(
            merge_purchase(dec!(0), dec!(50), dec!(0), dec!(80)),
            Some((dec!(0), dec!(50)))
        );
    }

    #[test]
    fn zero_investment_has_zero_percentage() {
        let owner = Uuid::new_v4();
        let holding = Holding {
            id: Uuid::new_v4(),
            owner_id: owner,
            symbol: "FREE".into(),
            shares: dec!(3),
            cost_basis: dec!(0),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let quote = crate::services::market::testing::quote("FREE", dec!(4));
        let value = value_holding(holding, Some(&quote)).unwrap();
        assert_eq!(value.gain_loss, Some(dec!(12)));
        assert_eq!(value.gain_loss_percentage, Some(dec!(0)));
    }

    #[tokio::test]
    async fn repeated_purchase_merges_into_one_holding() {
        let svc = service(&[("AAPL", dec!(130))]);
        let owner = Uuid::new_v4();

        let first = svc
            .add_or_merge(owner, purchase("AAPL", dec!(10), dec!(100)))
            .await
            .unwrap();
        assert!(first.created);

        let second = svc
            .add_or_merge(owner, purchase("AAPL", dec!(10), dec!(120)))
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.holding.id, first.holding.id);
        assert_eq!(second.holding.shares, dec!(20));
        assert_eq!(second.holding.cost_basis, dec!(110));

        let valuation = svc.value_portfolio(owner).await.unwrap();
        assert_eq!(valuation.holdings.len(), 1);
        let value = &valuation.holdings[0];
        assert_eq!(value.current_value, Some(dec!(2600)));
        assert_eq!(value.investment_value, dec!(2200));
        assert_eq!(value.gain_loss, Some(dec!(400)));
        assert_eq!(value.gain_loss_percentage.unwrap().round_dp(2), dec!(18.18));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_purchases_land_in_one_position() {
        let svc = Arc::new(service(&[]));
        let owner = Uuid::new_v4();

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let svc = svc.clone();
                let price = if i % 2 == 0 { dec!(100) } else { dec!(200) };
                tokio::spawn(async move {
                    svc.add_or_merge(owner, purchase("AAPL", dec!(1), price)).await
                })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().created {
                created += 1;
            }
        }
        assert_eq!(created, 1);

        let holdings = svc.holdings.list_for_owner(owner).await.unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].shares, dec!(50));
        assert_eq!(holdings[0].cost_basis.round_dp(6), dec!(150));
    }

    #[tokio::test]
    async fn negative_purchase_is_rejected() {
        let svc = service(&[]);
        let err = svc
            .add_or_merge(Uuid::new_v4(), purchase("AAPL", dec!(-1), dec!(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn merge_out_of_range_is_none() {
        assert_eq!(merge_purchase(Decimal::MAX, dec!(1), dec!(1), dec!(1)), None);
        let huge = Decimal::from_scientific("1e20").unwrap();
        assert_eq!(merge_purchase(huge, huge, huge, huge), None);
    }

    #[test]
    fn out_of_range_values_are_errors_not_panics() {
        let huge = Decimal::from_scientific("1e20").unwrap();
        let holding = Holding {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            symbol: "HUGE".into(),
            shares: huge,
            cost_basis: huge,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(
            value_holding(holding.clone(), None),
            Err(AppError::Unexpected(_))
        ));

        let modest = Holding {
            shares: huge,
            cost_basis: dec!(0),
            ..holding
        };
        let quote = crate::services::market::testing::quote("HUGE", huge);
        let value = value_holding(modest, Some(&quote)).unwrap();
        assert_eq!(value.current_value, None);

        let priced = |current: Decimal| HoldingValue {
            holding: Holding {
                id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                symbol: "BIG".into(),
                shares: dec!(1),
                cost_basis: dec!(0),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            current_price: Some(current),
            current_value: Some(current),
            investment_value: dec!(0),
            gain_loss: Some(current),
            gain_loss_percentage: Some(dec!(0)),
        };
        assert!(matches!(
            summarize(&[priced(Decimal::MAX), priced(Decimal::MAX)]),
            Err(AppError::Unexpected(_))
        ));
    }

    #[tokio::test]
    async fn repeated_huge_purchases_are_rejected_without_panicking() {
        let svc = service(&[("AAPL", dec!(130))]);
        let owner = Uuid::new_v4();
        let huge = Decimal::from_scientific("1e20").unwrap();

        let err = svc
            .add_or_merge(owner, purchase("AAPL", huge, huge))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        svc.add_or_merge(owner, purchase("AAPL", MAX_MAGNITUDE, MAX_MAGNITUDE))
            .await
            .unwrap();
        let err = svc
            .add_or_merge(owner, purchase("AAPL", MAX_MAGNITUDE, MAX_MAGNITUDE))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let valuation = svc.value_portfolio(owner).await.unwrap();
        assert_eq!(valuation.holdings[0].holding.shares, MAX_MAGNITUDE);
        assert_eq!(valuation.summary.total_value, MAX_MAGNITUDE * dec!(130));
    }

    #[tokio::test]
    async fn unpriced_holdings_stay_listed_but_out_of_totals() {
        let svc = service(&[("MSFT", dec!(50))]);
        let owner = Uuid::new_v4();
        svc.add_or_merge(owner, purchase("MSFT", dec!(2), dec!(40)))
            .await
            .unwrap();
        svc.add_or_merge(owner, purchase("GONE", dec!(5), dec!(10)))
            .await
            .unwrap();

        let valuation = svc.value_portfolio(owner).await.unwrap();
        assert_eq!(valuation.holdings.len(), 2);

        let gone = valuation
            .holdings
            .iter()
            .find(|v| v.holding.symbol == "GONE")
            .unwrap();
        assert_eq!(gone.current_price, None);
        assert_eq!(gone.current_value, None);
        assert_eq!(gone.gain_loss, None);
        assert_eq!(gone.investment_value, dec!(50));

        assert_eq!(valuation.summary.total_value, dec!(100));
        assert_eq!(valuation.summary.total_investment, dec!(80));
        assert_eq!(valuation.summary.total_gain_loss, dec!(20));
        assert_eq!(valuation.summary.total_gain_loss_percentage, dec!(25));
    }

    #[tokio::test]
    async fn empty_portfolio_has_zero_summary() {
        let svc = service(&[]);
        let valuation = svc.value_portfolio(Uuid::new_v4()).await.unwrap();
        assert!(valuation.holdings.is_empty());
        assert_eq!(valuation.summary, PortfolioSummary::default());
    }

    #[tokio::test]
    async fn foreign_holdings_cannot_be_changed() {
        let svc = service(&[]);
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let added = svc
            .add_or_merge(owner, purchase("NVDA", dec!(1), dec!(400)))
            .await
            .unwrap();

        let update = svc
            .update(intruder, added.holding.id, HoldingPatch::default())
            .await;
        assert!(matches!(update, Err(AppError::NotAuthorized)));
        let delete = svc.delete(intruder, added.holding.id).await;
        assert!(matches!(delete, Err(AppError::NotAuthorized)));
        let missing = svc.delete(owner, Uuid::new_v4()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        assert!(svc.get(owner, added.holding.id).await.is_ok());
    }

    #[tokio::test]
    async fn rename_onto_held_symbol_is_rejected() {
        let svc = service(&[]);
        let owner = Uuid::new_v4();
        svc.add_or_merge(owner, purchase("AMD", dec!(1), dec!(100)))
            .await
            .unwrap();
        let intel = svc
            .add_or_merge(owner, purchase("INTC", dec!(1), dec!(30)))
            .await
            .unwrap();

        let patch = HoldingPatch {
            symbol: Some("AMD".into()),
            ..HoldingPatch::default()
        };
        let err = svc.update(owner, intel.holding.id, patch).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
