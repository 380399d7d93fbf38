//! Portfolio composition, risk/return statistics, and the Monte Carlo
//! projection engine built on top of `md-core`'s typed series.
//!
//! Failures here are caller-input mistakes (mismatched lengths, missing
//! prices, unknown symbols) rather than the provider-facing taxonomy in
//! `md_core::MarketDataError`, so this crate defines its own small
//! [`PortfolioError`].

pub mod monte_carlo;
pub mod portfolio;

pub use monte_carlo::{
    simulate_asset, FinalStatistics, MonteCarloParams, Percentiles, SimulationResult,
};
pub use portfolio::{Portfolio, PortfolioError, PortfolioStatistics, PriceMatrix, TRADING_DAYS_PER_YEAR};
