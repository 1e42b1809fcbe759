pub mod alpha_vantage;
pub mod market;
pub mod portfolio;
pub mod quote_cache;
pub mod transactions;
