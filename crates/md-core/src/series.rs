/// Mean/std over the non-NaN values of a series, sample standard deviation
/// (`ddof=1`). Mirrors `core/base/base_series.py::mean_std_from_series`:
/// `NAN` when there are no finite observations, `std = NAN` when fewer than
/// two are present.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    if finite.len() < 2 {
        return (mean, f64::NAN);
    }
    let variance =
        finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (finite.len() as f64 - 1.0);
    (mean, variance.sqrt())
}

fn validate_index(index: &[i64]) -> Result<(), &'static str> {
    if index.windows(2).any(|w| w[1] <= w[0]) {
        return Err("index is not strictly ascending / contains duplicates");
    }
    Ok(())
}

/// A price series: the five OHLCV columns (adjusted close folded into
/// `close`) plus the mean/std of `close`. Grounded in `series/price_series.py`.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub symbol: String,
    pub source: String,
    pub index_millis: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
    pub mean_close: f64,
    pub std_close: f64,
}

impl PriceSeries {
    pub fn new(
        symbol: impl Into<String>,
        source: impl Into<String>,
        index_millis: Vec<i64>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Vec<f64>,
    ) -> Result<Self, &'static str> {
        validate_index(&index_millis)?;
        let (mean_close, std_close) = mean_std(&close);
        Ok(Self {
            symbol: symbol.into(),
            source: source.into(),
            index_millis,
            open,
            high,
            low,
            close,
            volume,
            mean_close,
            std_close,
        })
    }
}

/// Whether a [`PerformanceSeries`] holds simple (`pct_change`) or
/// logarithmic returns. Grounded in `core/market_data.py::DataKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnsKind {
    Pct,
    Log,
}

/// A returns series (percentage or log), grounded in
/// `series/performance_series.py`.
#[derive(Debug, Clone)]
pub struct PerformanceSeries {
    pub symbol: String,
    pub source: String,
    pub index_millis: Vec<i64>,
    pub data: Vec<f64>,
    pub kind: ReturnsKind,
    pub mean_ret: f64,
    pub std_ret: f64,
}

impl PerformanceSeries {
    pub fn new(
        symbol: impl Into<String>,
        source: impl Into<String>,
        index_millis: Vec<i64>,
        data: Vec<f64>,
        kind: ReturnsKind,
    ) -> Result<Self, &'static str> {
        validate_index(&index_millis)?;
        let (mean_ret, std_ret) = mean_std(&data);
        Ok(Self {
            symbol: symbol.into(),
            source: source.into(),
            index_millis,
            data,
            kind,
            mean_ret,
            std_ret,
        })
    }
}

/// A rolling trading-volume z-score series, grounded in
/// `series/volume_activity_series.py`.
#[derive(Debug, Clone)]
pub struct VolumeActivitySeries {
    pub symbol: String,
    pub source: String,
    pub index_millis: Vec<i64>,
    pub data: Vec<f64>,
    pub window: usize,
    pub mean_val: f64,
    pub std_val: f64,
}

impl VolumeActivitySeries {
    pub fn new(
        symbol: impl Into<String>,
        source: impl Into<String>,
        index_millis: Vec<i64>,
        data: Vec<f64>,
        window: usize,
    ) -> Result<Self, &'static str> {
        validate_index(&index_millis)?;
        let (mean_val, std_val) = mean_std(&data);
        Ok(Self {
            symbol: symbol.into(),
            source: source.into(),
            index_millis,
            data,
            window,
            mean_val,
            std_val,
        })
    }
}

/// A rolling realized-volatility series, grounded in
/// `series/volatility_series.py`. Unlike the other series kinds this one
/// only reports a mean — the original carries no `std_vol` field.
#[derive(Debug, Clone)]
pub struct VolatilitySeries {
    pub symbol: String,
    pub source: String,
    pub index_millis: Vec<i64>,
    pub data: Vec<f64>,
    pub window: usize,
    pub ann_factor: f64,
    pub mean_vol: f64,
}

impl VolatilitySeries {
    pub fn new(
        symbol: impl Into<String>,
        source: impl Into<String>,
        index_millis: Vec<i64>,
        data: Vec<f64>,
        window: usize,
        ann_factor: f64,
    ) -> Result<Self, &'static str> {
        validate_index(&index_millis)?;
        let (mean_vol, _) = mean_std(&data);
        Ok(Self {
            symbol: symbol.into(),
            source: source.into(),
            index_millis,
            data,
            window,
            ann_factor,
            mean_vol,
        })
    }
}

/// The closed sum of series kinds a [`crate::typology::Typology`] can build.
#[derive(Debug, Clone)]
pub enum SeriesType {
    Ohlcv(PriceSeries),
    Returns(PerformanceSeries),
    VolumeActivity(VolumeActivitySeries),
    Volatility(VolatilitySeries),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_std_matches_sample_variance() {
        let (mean, std) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean - 5.0).abs() < 1e-9);
        assert!((std - 2.138089935299395).abs() < 1e-9);
    }

    #[test]
    fn mean_std_ignores_nan() {
        let (mean, std) = mean_std(&[1.0, f64::NAN, 3.0]);
        assert_eq!(mean, 2.0);
        assert!(std.is_nan());
    }

    #[test]
    fn mean_std_empty_is_all_nan() {
        let (mean, std) = mean_std(&[]);
        assert!(mean.is_nan());
        assert!(std.is_nan());
    }

    #[test]
    fn rejects_non_ascending_index() {
        let err = PriceSeries::new(
            "AAPL",
            "yahoo",
            vec![2, 1],
            vec![1.0, 1.0],
            vec![1.0, 1.0],
            vec![1.0, 1.0],
            vec![1.0, 1.0],
            vec![1.0, 1.0],
        )
        .unwrap_err();
        assert_eq!(err, "index is not strictly ascending / contains duplicates");
    }
}
