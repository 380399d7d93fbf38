use thiserror::Error;

/// Trading days per year used to annualize daily drift/volatility,
/// grounded in `simulation/portfolio.py::TRADING_DAYS_PER_YEAR`.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Error, Debug, PartialEq)]
pub enum PortfolioError {
    #[error("symbols length ({symbols}) does not match weights length ({weights})")]
    WeightsLengthMismatch { symbols: usize, weights: usize },

    #[error("empty price frame")]
    EmptyPrices,

    #[error("price frame column count ({given}) does not match portfolio size ({expected})")]
    PriceColumnMismatch { given: usize, expected: usize },

    #[error("no returns data; call set_prices first")]
    NoReturns,

    #[error("symbol '{0}' is not in this portfolio")]
    UnknownSymbol(String),
}

/// A multi-column numeric matrix over a shared timestamp index: the Rust
/// stand-in for a `pandas.DataFrame` of one column per symbol, grounded in
/// the Design Notes' "struct of aligned columns, not a general dataframe"
/// guidance. Used both for the aligned close-price input to
/// [`Portfolio::set_prices`] and for the log-returns it derives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceMatrix {
    pub index_millis: Vec<i64>,
    /// One column per symbol, in the same order as `Portfolio::symbols`.
    pub columns: Vec<Vec<f64>>,
}

impl PriceMatrix {
    pub fn new(index_millis: Vec<i64>, columns: Vec<Vec<f64>>) -> Self {
        Self { index_millis, columns }
    }

    pub fn is_empty(&self) -> bool {
        self.index_millis.is_empty() || self.columns.iter().all(|c| c.is_empty())
    }

    pub fn num_rows(&self) -> usize {
        self.index_millis.len()
    }

    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    fn column_mean(&self, col: usize) -> f64 {
        let data = &self.columns[col];
        data.iter().sum::<f64>() / data.len() as f64
    }
}

/// Basic risk/return statistics, grounded in `portfolio.py::get_statistics`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioStatistics {
    pub r#return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub num_assets: usize,
}

/// A weighted composition of symbols, grounded in
/// `simulation/portfolio.py::Portfolio`.
///
/// Construction normalizes weights to sum to 1 only when the raw sum falls
/// outside `[0.99, 1.01]` — mirroring the original's `__post_init__`
/// literally rather than unconditionally re-normalizing, so a portfolio
/// built with weights already summing to (say) 0.995 is left as-is.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub name: String,
    pub symbols: Vec<String>,
    pub weights: Vec<f64>,
    pub prices: Option<PriceMatrix>,
    pub log_returns: Option<PriceMatrix>,
}

impl Portfolio {
    pub fn new(
        name: impl Into<String>,
        symbols: Vec<String>,
        weights: Vec<f64>,
    ) -> Result<Self, PortfolioError> {
        if symbols.len() != weights.len() {
            return Err(PortfolioError::WeightsLengthMismatch {
                symbols: symbols.len(),
                weights: weights.len(),
            });
        }

        let total_weight: f64 = weights.iter().sum();
        let weights = if !(0.99..=1.01).contains(&total_weight) {
            weights.iter().map(|w| w / total_weight).collect()
        } else {
            weights
        };

        Ok(Self {
            name: name.into(),
            symbols,
            weights,
            prices: None,
            log_returns: None,
        })
    }

    /// Assigns `prices` and derives `log_returns := ln(prices / prices.shift(1))`,
    /// dropping the first (undefined) row, per §4.8.
    pub fn set_prices(&mut self, prices: PriceMatrix) -> Result<(), PortfolioError> {
        if prices.is_empty() {
            return Err(PortfolioError::EmptyPrices);
        }
        if prices.num_cols() != self.symbols.len() {
            return Err(PortfolioError::PriceColumnMismatch {
                given: prices.num_cols(),
                expected: self.symbols.len(),
            });
        }

        let n_rows = prices.num_rows();
        let mut ret_columns = vec![Vec::with_capacity(n_rows.saturating_sub(1)); prices.num_cols()];
        for (c, col) in prices.columns.iter().enumerate() {
            for t in 1..col.len() {
                ret_columns[c].push((col[t] / col[t - 1]).ln());
            }
        }

        let ret_index = if n_rows > 0 {
            prices.index_millis[1..].to_vec()
        } else {
            Vec::new()
        };

        self.log_returns = Some(PriceMatrix::new(ret_index, ret_columns));
        self.prices = Some(prices);
        Ok(())
    }

    /// Weighted mean of per-column means of `log_returns`: the estimated
    /// daily drift μ.
    pub fn portfolio_return(&self) -> Result<f64, PortfolioError> {
        let returns = self.log_returns.as_ref().ok_or(PortfolioError::NoReturns)?;
        let means: Vec<f64> = (0..returns.num_cols())
            .map(|c| returns.column_mean(c))
            .collect();
        Ok(dot(&self.weights, &means))
    }

    /// `sqrt(w^T * Sigma * w * TRADING_DAYS_PER_YEAR)` where `Sigma` is the
    /// sample covariance (ddof=1) of `log_returns`.
    pub fn portfolio_volatility(&self) -> Result<f64, PortfolioError> {
        let returns = self.log_returns.as_ref().ok_or(PortfolioError::NoReturns)?;
        let cov = covariance_matrix(returns);
        let variance = quadratic_form(&self.weights, &cov);
        Ok((variance * TRADING_DAYS_PER_YEAR).sqrt())
    }

    /// `(mu * 252 - rf) / portfolio_volatility()`, 0 when volatility is 0.
    pub fn sharpe_ratio(&self, risk_free_rate: f64) -> Result<f64, PortfolioError> {
        let ret = self.portfolio_return()? * TRADING_DAYS_PER_YEAR;
        let vol = self.portfolio_volatility()?;
        if vol == 0.0 {
            return Ok(0.0);
        }
        Ok((ret - risk_free_rate) / vol)
    }

    pub fn get_statistics(&self) -> Result<PortfolioStatistics, PortfolioError> {
        Ok(PortfolioStatistics {
            r#return: self.portfolio_return()?,
            volatility: self.portfolio_volatility()?,
            sharpe_ratio: self.sharpe_ratio(0.0)?,
            num_assets: self.symbols.len(),
        })
    }

    /// Daily mean and annualized std (`std * sqrt(252)`) of log returns for
    /// one symbol, used by `monte_carlo_simulation_individual`. Also
    /// returns the last observed close price for that symbol, if any.
    pub fn asset_daily_stats(
        &self,
        symbol: &str,
    ) -> Result<(f64, f64, Option<f64>), PortfolioError> {
        let col_idx = self
            .symbols
            .iter()
            .position(|s| s == symbol)
            .ok_or_else(|| PortfolioError::UnknownSymbol(symbol.to_string()))?;
        let returns = self.log_returns.as_ref().ok_or(PortfolioError::NoReturns)?;

        let (mean, std) = md_core::mean_std(&returns.columns[col_idx]);
        let annualized_std = std * TRADING_DAYS_PER_YEAR.sqrt();

        let last_price = self
            .prices
            .as_ref()
            .and_then(|p| p.columns.get(col_idx))
            .and_then(|col| col.last().copied());

        Ok((mean, annualized_std, last_price))
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Sample covariance matrix (ddof=1) across the columns of `returns`.
fn covariance_matrix(returns: &PriceMatrix) -> Vec<Vec<f64>> {
    let n_cols = returns.num_cols();
    let n_rows = returns.num_rows() as f64;
    let means: Vec<f64> = (0..n_cols).map(|c| returns.column_mean(c)).collect();

    let mut cov = vec![vec![0.0; n_cols]; n_cols];
    if n_rows < 2.0 {
        return cov;
    }
    for i in 0..n_cols {
        for j in 0..n_cols {
            let sum: f64 = (0..returns.num_rows())
                .map(|t| (returns.columns[i][t] - means[i]) * (returns.columns[j][t] - means[j]))
                .sum();
            cov[i][j] = sum / (n_rows - 1.0);
        }
    }
    cov
}

fn quadratic_form(w: &[f64], m: &[Vec<f64>]) -> f64 {
    let n = w.len();
    let mut total = 0.0;
    for i in 0..n {
        for j in 0..n {
            total += w[i] * m[i][j] * w[j];
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices_matrix() -> PriceMatrix {
        // Two symbols, 5 days, both rising steadily.
        PriceMatrix::new(
            (0..5).map(|i| i * 86_400_000).collect(),
            vec![
                vec![100.0, 101.0, 102.0, 103.0, 104.0],
                vec![50.0, 50.5, 51.0, 51.5, 52.0],
            ],
        )
    }

    #[test]
    fn normalizes_weights_out_of_tolerance_band() {
        let portfolio = Portfolio::new("p", vec!["A".into(), "B".into()], vec![60.0, 40.0]).unwrap();
        assert!((portfolio.weights[0] - 0.6).abs() < 1e-9);
        assert!((portfolio.weights[1] - 0.4).abs() < 1e-9);
    }

    #[test]
    fn leaves_weights_within_tolerance_band_untouched() {
        let portfolio = Portfolio::new("p", vec!["A".into(), "B".into()], vec![0.5, 0.495]).unwrap();
        assert_eq!(portfolio.weights, vec![0.5, 0.495]);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let err = Portfolio::new("p", vec!["A".into()], vec![0.5, 0.5]).unwrap_err();
        assert!(matches!(err, PortfolioError::WeightsLengthMismatch { .. }));
    }

    #[test]
    fn metrics_require_prices() {
        let portfolio = Portfolio::new("p", vec!["A".into()], vec![1.0]).unwrap();
        assert_eq!(portfolio.portfolio_return().unwrap_err(), PortfolioError::NoReturns);
    }

    #[test]
    fn set_prices_drops_first_row_of_log_returns() {
        let mut portfolio =
            Portfolio::new("p", vec!["A".into(), "B".into()], vec![0.5, 0.5]).unwrap();
        portfolio.set_prices(prices_matrix()).unwrap();
        let returns = portfolio.log_returns.as_ref().unwrap();
        assert_eq!(returns.num_rows(), 4);
        assert!((returns.columns[0][0] - (101.0f64 / 100.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn sharpe_ratio_is_zero_when_volatility_is_zero() {
        let mut portfolio = Portfolio::new("p", vec!["A".into()], vec![1.0]).unwrap();
        portfolio
            .set_prices(PriceMatrix::new(
                (0..4).map(|i| i * 86_400_000).collect(),
                vec![vec![100.0, 100.0, 100.0, 100.0]],
            ))
            .unwrap();
        assert_eq!(portfolio.sharpe_ratio(0.0).unwrap(), 0.0);
    }

    #[test]
    fn asset_daily_stats_reports_last_price() {
        let mut portfolio =
            Portfolio::new("p", vec!["A".into(), "B".into()], vec![0.5, 0.5]).unwrap();
        portfolio.set_prices(prices_matrix()).unwrap();
        let (_, _, last) = portfolio.asset_daily_stats("A").unwrap();
        assert_eq!(last, Some(104.0));
    }

    #[test]
    fn asset_daily_stats_rejects_unknown_symbol() {
        let mut portfolio = Portfolio::new("p", vec!["A".into()], vec![1.0]).unwrap();
        portfolio
            .set_prices(PriceMatrix::new(
                (0..3).map(|i| i * 86_400_000).collect(),
                vec![vec![1.0, 1.1, 1.2]],
            ))
            .unwrap();
        assert!(matches!(
            portfolio.asset_daily_stats("ZZZ"),
            Err(PortfolioError::UnknownSymbol(_))
        ));
    }
}
