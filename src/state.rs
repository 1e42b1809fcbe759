use crate::auth::JwtKeys;
use crate::repositories::{HoldingRepository, LedgerRepository};
use crate::services::market::{MarketData, QuoteProvider};
use crate::services::portfolio::PortfolioService;
use crate::services::transactions::LedgerService;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub portfolio: Arc<PortfolioService>,
    pub ledger: Arc<LedgerService>,
    pub market: Arc<MarketData>,
    pub jwt: Arc<JwtKeys>,
}

impl AppState {
    pub fn new(
        holdings: Arc<dyn HoldingRepository>,
        entries: Arc<dyn LedgerRepository>,
        provider: Arc<dyn QuoteProvider>,
        quote_ttl: Duration,
        jwt: JwtKeys,
    ) -> Self {
        let market = Arc::new(MarketData::new(provider, quote_ttl));
        Self {
            portfolio: Arc::new(PortfolioService::new(holdings, market.clone())),
            ledger: Arc::new(LedgerService::new(entries)),
            market,
            jwt: Arc::new(jwt),
        }
    }
}
