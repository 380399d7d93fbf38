use rand::{Rng, SeedableRng};

use crate::portfolio::{Portfolio, PortfolioError, TRADING_DAYS_PER_YEAR};

/// Parameters driving a Monte Carlo projection, grounded in
/// `simulation/monte_carlo.py::MonteCarloParams`.
#[derive(Debug, Clone, Copy)]
pub struct MonteCarloParams {
    pub num_simulations: usize,
    pub num_days: usize,
    pub seed: Option<u64>,
    /// When `true`, volatility is redrawn per step from a chi-squared-like
    /// jitter around the base estimate instead of held constant, mirroring
    /// `dynamic_vol` in the original.
    pub dynamic_vol: bool,
    /// Starting portfolio value `S₀`, grounded in
    /// `simulation/monte_carlo.py::MonteCarloParams.initial_value`.
    pub initial_value: f64,
}

impl Default for MonteCarloParams {
    fn default() -> Self {
        Self {
            num_simulations: 1000,
            num_days: 252,
            seed: None,
            dynamic_vol: false,
            initial_value: 10_000.0,
        }
    }
}

/// `(p5, p25, p50, p75, p95)` of the terminal-value distribution, grounded
/// in `calculate_percentiles`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

/// Summary statistics over the terminal-value distribution, grounded in
/// `get_final_statistics`. Deliberately a distinct record from
/// [`Percentiles`] — the original keeps the two separate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalStatistics {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_5: f64,
    pub percentile_95: f64,
}

/// One full simulation run: every path plus the derived terminal-value
/// reports.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// `paths[sim][day]`, `day = 0` is the seed value (`initial_value`).
    pub paths: Vec<Vec<f64>>,
    pub final_values: Vec<f64>,
    pub percentiles: Percentiles,
    pub statistics: FinalStatistics,
}

/// Draws a standard normal variate via the Box-Muller transform over two
/// independent uniform draws from `rng`, grounded in
/// `cooprefr-bettersys::backtest_v2::latency::sample_normal` — avoids a
/// dependency on an external normal-distribution crate the teacher does
/// not carry.
fn sample_normal(rng: &mut rand::rngs::StdRng, mean: f64, std: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std * z
}

/// Simulates `num_simulations` GBM paths of `num_days` steps for a single
/// asset, given its *daily* drift `mu` and *annualized* volatility `sigma`
/// and a starting value. Mirrors `MonteCarloSimulation.simulate_asset`:
/// the source passes the daily `portfolio_return` straight through as
/// drift and only rescales `sigma` from annualized to daily.
///
/// Draws are made in row-major `(sim, step)` order from a single
/// `StdRng`, seeded via `seed_from_u64` when `params.seed` is set so the
/// same seed reproduces the same paths regardless of simulation count or
/// day count ordering changes elsewhere in the call graph; with no seed
/// the generator is seeded from OS entropy and draws differ per call.
pub fn simulate_asset(
    initial_value: f64,
    mu: f64,
    sigma: f64,
    params: &MonteCarloParams,
) -> Vec<Vec<f64>> {
    let daily_mu = mu;
    let daily_sigma = sigma / TRADING_DAYS_PER_YEAR.sqrt();
    let mut rng = match params.seed {
        Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
        None => rand::rngs::StdRng::from_entropy(),
    };

    let mut paths = vec![vec![0.0; params.num_days + 1]; params.num_simulations];
    for sim in 0..params.num_simulations {
        paths[sim][0] = initial_value;
        let mut value = initial_value;
        for day in 1..=params.num_days {
            let step_sigma = if params.dynamic_vol {
                daily_sigma * rng.gen_range(0.8..1.2)
            } else {
                daily_sigma
            };
            // Ito correction: drift net of the variance term.
            let drift = daily_mu - 0.5 * step_sigma * step_sigma;
            let shock = sample_normal(&mut rng, 0.0, 1.0);
            let log_return = drift + step_sigma * shock;
            value *= log_return.exp();
            paths[sim][day] = value;
        }
    }
    paths
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

fn calculate_percentiles(final_values: &[f64]) -> Percentiles {
    let mut sorted = final_values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    Percentiles {
        p5: percentile(&sorted, 5.0),
        p25: percentile(&sorted, 25.0),
        p50: percentile(&sorted, 50.0),
        p75: percentile(&sorted, 75.0),
        p95: percentile(&sorted, 95.0),
    }
}

fn get_final_statistics(final_values: &[f64]) -> FinalStatistics {
    let (mean, std) = md_core::mean_std(final_values);
    let mut sorted = final_values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = percentile(&sorted, 50.0);
    FinalStatistics {
        mean,
        median,
        std,
        min: *sorted.first().unwrap_or(&f64::NAN),
        max: *sorted.last().unwrap_or(&f64::NAN),
        percentile_5: percentile(&sorted, 5.0),
        percentile_95: percentile(&sorted, 95.0),
    }
}

fn summarize(paths: Vec<Vec<f64>>) -> SimulationResult {
    let final_values: Vec<f64> = paths.iter().map(|p| *p.last().unwrap()).collect();
    let percentiles = calculate_percentiles(&final_values);
    let statistics = get_final_statistics(&final_values);
    SimulationResult {
        paths,
        final_values,
        percentiles,
        statistics,
    }
}

impl Portfolio {
    /// Simulates the whole portfolio's combined value forward, weighting
    /// each asset's contribution by its current portfolio weight. Grounded
    /// in `Portfolio.monte_carlo_simulation`.
    pub fn monte_carlo_simulation(
        &self,
        params: &MonteCarloParams,
    ) -> Result<SimulationResult, PortfolioError> {
        let mu = self.portfolio_return()?;
        let sigma = self.portfolio_volatility()?;
        let paths = simulate_asset(params.initial_value, mu, sigma, params);
        Ok(summarize(paths))
    }

    /// Simulates a single constituent asset forward from its own daily
    /// drift / annualized volatility and last observed close, grounded in
    /// `Portfolio.monte_carlo_simulation_individual`.
    pub fn monte_carlo_simulation_individual(
        &self,
        symbol: &str,
        params: &MonteCarloParams,
    ) -> Result<SimulationResult, PortfolioError> {
        let (daily_mean, annualized_std, last_price) = self.asset_daily_stats(symbol)?;
        let initial_value = last_price.unwrap_or(100.0);
        let paths = simulate_asset(initial_value, daily_mean, annualized_std, params);
        Ok(summarize(paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_produces_identical_paths() {
        let params = MonteCarloParams {
            num_simulations: 10,
            num_days: 30,
            seed: Some(7),
            dynamic_vol: false,
            ..Default::default()
        };
        let a = simulate_asset(100.0, 0.08, 0.2, &params);
        let b = simulate_asset(100.0, 0.08, 0.2, &params);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_diverge() {
        let params_a = MonteCarloParams { seed: Some(1), num_simulations: 5, num_days: 10, dynamic_vol: false, ..Default::default() };
        let params_b = MonteCarloParams { seed: Some(2), num_simulations: 5, num_days: 10, dynamic_vol: false, ..Default::default() };
        let a = simulate_asset(100.0, 0.08, 0.2, &params_a);
        let b = simulate_asset(100.0, 0.08, 0.2, &params_b);
        assert_ne!(a, b);
    }

    #[test]
    fn paths_start_at_initial_value() {
        let params = MonteCarloParams { seed: Some(1), num_simulations: 3, num_days: 5, dynamic_vol: false, ..Default::default() };
        let paths = simulate_asset(250.0, 0.05, 0.15, &params);
        for path in &paths {
            assert_eq!(path[0], 250.0);
            assert_eq!(path.len(), 6);
        }
    }

    #[test]
    fn percentiles_are_monotonic() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let p = calculate_percentiles(&values);
        assert!(p.p5 <= p.p25);
        assert!(p.p25 <= p.p50);
        assert!(p.p50 <= p.p75);
        assert!(p.p75 <= p.p95);
    }

    #[test]
    fn final_statistics_min_max_bound_mean() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let stats = get_final_statistics(&values);
        assert!(stats.min <= stats.mean && stats.mean <= stats.max);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
    }

    #[test]
    fn portfolio_monte_carlo_simulation_runs_end_to_end() {
        let mut portfolio =
            Portfolio::new("p", vec!["A".into(), "B".into()], vec![0.5, 0.5]).unwrap();
        portfolio
            .set_prices(crate::portfolio::PriceMatrix::new(
                (0..30).map(|i| i * 86_400_000).collect(),
                vec![
                    (0..30).map(|i| 100.0 + i as f64).collect(),
                    (0..30).map(|i| 50.0 + i as f64 * 0.5).collect(),
                ],
            ))
            .unwrap();
        let params = MonteCarloParams { num_simulations: 20, num_days: 10, seed: Some(3), dynamic_vol: true, ..Default::default() };
        let result = portfolio.monte_carlo_simulation(&params).unwrap();
        assert_eq!(result.final_values.len(), 20);
        assert_eq!(result.paths[0].len(), 11);
        assert!(result.paths.iter().all(|p| p[0] == params.initial_value));
    }

    #[test]
    fn monte_carlo_simulation_individual_falls_back_to_100_without_prices() {
        let mut portfolio = Portfolio::new("p", vec!["A".into()], vec![1.0]).unwrap();
        portfolio
            .set_prices(crate::portfolio::PriceMatrix::new(
                (0..5).map(|i| i * 86_400_000).collect(),
                vec![vec![10.0, 10.1, 10.2, 10.3, 10.4]],
            ))
            .unwrap();
        // Clear the recorded prices so `asset_daily_stats` has no last close to report.
        portfolio.prices = None;
        let params = MonteCarloParams { num_simulations: 2, num_days: 3, seed: Some(9), dynamic_vol: false, ..Default::default() };
        let result = portfolio.monte_carlo_simulation_individual("A", &params).unwrap();
        assert!(result.paths.iter().all(|p| p[0] == 100.0));
    }
}
