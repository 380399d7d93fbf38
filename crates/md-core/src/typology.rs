use crate::error::{ErrorMeta, MarketDataError};
use crate::frame::Frame;
use crate::series::{
    PerformanceSeries, PriceSeries, ReturnsKind, SeriesType, VolatilitySeries,
    VolumeActivitySeries,
};

const DEFAULT_WINDOW: usize = 20;
const DEFAULT_ANN_FACTOR: f64 = 252.0;

/// The closed set of output shapes the facade can build from an aligned
/// frame, replacing the original extractor's string-keyed dynamic dispatch
/// (`core/market_data.py::DataKind` plus `normalizer.py`'s five `_build_*`
/// functions) with an exhaustively-matched enum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Typology {
    Ohlcv,
    ReturnsPct,
    ReturnsLog,
    VolumeActivity { window: usize },
    Volatility { window: usize, ann_factor: f64 },
}

impl Typology {
    /// Parses a facade-compatibility tag (`"ohlcv"`, `"returns_pct"`, ...)
    /// into a `Typology`, applying the defaults `window=20`/`ann_factor=252`
    /// when the caller doesn't override them.
    pub fn parse(
        kind: &str,
        window: Option<usize>,
        ann_factor: Option<f64>,
    ) -> Result<Self, MarketDataError> {
        match kind {
            "ohlcv" => Ok(Typology::Ohlcv),
            "returns_pct" => Ok(Typology::ReturnsPct),
            "returns_log" => Ok(Typology::ReturnsLog),
            "volume_activity" => Ok(Typology::VolumeActivity {
                window: window.unwrap_or(DEFAULT_WINDOW),
            }),
            "volatility" => Ok(Typology::Volatility {
                window: window.unwrap_or(DEFAULT_WINDOW),
                ann_factor: ann_factor.unwrap_or(DEFAULT_ANN_FACTOR),
            }),
            other => Err(MarketDataError::normalization(
                format!("unknown typology '{other}'"),
                ErrorMeta::new(),
            )),
        }
    }
}

/// Builds the typed series for `typology` from an aligned canonical frame.
/// Every path that reads "close" actually reads `Adj Close`, folding the
/// adjusted-close column into close the way `normalizer.py` does before
/// computing returns or volatility.
pub fn build(
    typology: Typology,
    symbol: &str,
    source: &str,
    frame: &Frame,
) -> Result<SeriesType, MarketDataError> {
    let meta = || ErrorMeta::new().source(source).symbol(symbol);
    match typology {
        Typology::Ohlcv => {
            let series = PriceSeries::new(
                symbol,
                source,
                frame.index_millis.clone(),
                frame.open.clone(),
                frame.high.clone(),
                frame.low.clone(),
                frame.adj_close.clone(),
                frame.volume.clone(),
            )
            .map_err(|e| MarketDataError::normalization(e, meta()))?;
            Ok(SeriesType::Ohlcv(series))
        }
        Typology::ReturnsPct => {
            let (index, data) = pct_returns(&frame.index_millis, &frame.adj_close);
            let series = PerformanceSeries::new(symbol, source, index, data, ReturnsKind::Pct)
                .map_err(|e| MarketDataError::normalization(e, meta()))?;
            Ok(SeriesType::Returns(series))
        }
        Typology::ReturnsLog => {
            let (index, data) = log_returns(&frame.index_millis, &frame.adj_close);
            let series = PerformanceSeries::new(symbol, source, index, data, ReturnsKind::Log)
                .map_err(|e| MarketDataError::normalization(e, meta()))?;
            Ok(SeriesType::Returns(series))
        }
        Typology::VolumeActivity { window } => {
            let data = rolling_zscore(&frame.volume, window);
            let series =
                VolumeActivitySeries::new(symbol, source, frame.index_millis.clone(), data, window)
                    .map_err(|e| MarketDataError::normalization(e, meta()))?;
            Ok(SeriesType::VolumeActivity(series))
        }
        Typology::Volatility { window, ann_factor } => {
            let (ret_index, log_ret) = log_returns(&frame.index_millis, &frame.adj_close);
            let vol = rolling_std(&log_ret, window)
                .into_iter()
                .map(|v| v * ann_factor.sqrt())
                .collect();
            let series =
                VolatilitySeries::new(symbol, source, ret_index, vol, window, ann_factor)
                    .map_err(|e| MarketDataError::normalization(e, meta()))?;
            Ok(SeriesType::Volatility(series))
        }
    }
}

/// Simple percentage returns, dropping the first (undefined) observation.
fn pct_returns(index: &[i64], close: &[f64]) -> (Vec<i64>, Vec<f64>) {
    if close.len() < 2 {
        return (Vec::new(), Vec::new());
    }
    let data = close
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    (index[1..].to_vec(), data)
}

/// Logarithmic returns, dropping the first (undefined) observation.
fn log_returns(index: &[i64], close: &[f64]) -> (Vec<i64>, Vec<f64>) {
    if close.len() < 2 {
        return (Vec::new(), Vec::new());
    }
    let data = close.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    (index[1..].to_vec(), data)
}

/// Rolling population-free sample std over a trailing `window`; the first
/// `window - 1` entries are `NAN` (insufficient history), matching pandas'
/// `.rolling(window).std()` default (`ddof=1`).
fn rolling_std(data: &[f64], window: usize) -> Vec<f64> {
    let n = data.len();
    let mut out = vec![f64::NAN; n];
    if window < 2 {
        return out;
    }
    for i in (window - 1)..n {
        let slice = &data[i + 1 - window..=i];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window as f64 - 1.0);
        out[i] = var.sqrt();
    }
    out
}

/// Rolling z-score `(x - rolling_mean) / rolling_std` over a trailing
/// `window`, grounded in `normalizer.py::_build_volume_activity`.
fn rolling_zscore(data: &[f64], window: usize) -> Vec<f64> {
    let n = data.len();
    let mut out = vec![f64::NAN; n];
    if window < 2 {
        return out;
    }
    for i in (window - 1)..n {
        let slice = &data[i + 1 - window..=i];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window as f64 - 1.0);
        let std = var.sqrt();
        out[i] = if std == 0.0 {
            f64::NAN
        } else {
            (data[i] - mean) / std
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame {
            index_millis: (0..6).map(|i| i * 86_400_000).collect(),
            open: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            high: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            low: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            close: vec![10.0, 20.0, 10.0, 30.0, 15.0, 45.0],
            adj_close: vec![10.0, 20.0, 10.0, 30.0, 15.0, 45.0],
            volume: vec![100.0, 110.0, 90.0, 120.0, 80.0, 130.0],
        }
    }

    #[test]
    fn parses_known_tags_and_rejects_unknown() {
        assert_eq!(Typology::parse("ohlcv", None, None).unwrap(), Typology::Ohlcv);
        assert!(Typology::parse("nonsense", None, None).is_err());
    }

    #[test]
    fn ohlcv_folds_adj_close_into_close() {
        let frame = sample_frame();
        let built = build(Typology::Ohlcv, "AAPL", "yahoo", &frame).unwrap();
        match built {
            SeriesType::Ohlcv(p) => assert_eq!(p.close, frame.adj_close),
            _ => panic!("expected Ohlcv"),
        }
    }

    #[test]
    fn returns_pct_drops_first_row() {
        let frame = sample_frame();
        let built = build(Typology::ReturnsPct, "AAPL", "yahoo", &frame).unwrap();
        match built {
            SeriesType::Returns(p) => {
                assert_eq!(p.data.len(), frame.len() - 1);
                assert_eq!(p.kind, ReturnsKind::Pct);
                assert!((p.data[0] - 1.0).abs() < 1e-9); // 20 vs 10 -> +100%
            }
            _ => panic!("expected Returns"),
        }
    }

    #[test]
    fn volatility_rolling_window_leaves_leading_nan() {
        let frame = sample_frame();
        let built = build(
            Typology::Volatility {
                window: 3,
                ann_factor: 252.0,
            },
            "AAPL",
            "yahoo",
            &frame,
        )
        .unwrap();
        match built {
            SeriesType::Volatility(v) => {
                assert!(v.data[0].is_nan());
                assert!(v.data[1].is_nan());
                assert!(v.data[2].is_finite());
            }
            _ => panic!("expected Volatility"),
        }
    }
}
