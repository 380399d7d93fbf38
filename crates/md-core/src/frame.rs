use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{ErrorMeta, MarketDataError};

/// A single provider frame before canonicalization: an arbitrary set of
/// named columns (any casing) over a UTC timestamp index. Column lookup is
/// case-insensitive, matching the original extractor's `_safe_col` helper.
#[derive(Debug, Clone, Default)]
pub struct RawFrame {
    pub index: Vec<DateTime<Utc>>,
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl RawFrame {
    pub fn new(index: Vec<DateTime<Utc>>) -> Self {
        Self {
            index,
            columns: BTreeMap::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.columns.insert(name.into(), values);
        self
    }

    fn column_ci(&self, wanted: &str) -> Option<&Vec<f64>> {
        self.columns
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(wanted))
            .map(|(_, v)| v)
    }
}

/// A canonical OHLCV frame: strictly ascending, duplicate-free,
/// timezone-naive index (stored as Unix milliseconds) with the six
/// columns `[Open, High, Low, Close, Adj Close, Volume]` always present,
/// numeric, and of the same length as the index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub index_millis: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub adj_close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.index_millis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_millis.is_empty()
    }

    /// Implements the canonicalization procedure of the component design's
    /// §4.2: rename/locate columns case-insensitively, default `Adj Close`
    /// to `Close`, coerce to numeric (already `f64` here — missing parses
    /// are expected to already be `NAN` upstream), sort ascending, drop
    /// duplicate index entries keeping the first occurrence, and fix the
    /// column order.
    pub fn canonicalize(raw: &RawFrame, source: &str) -> Result<Frame, MarketDataError> {
        if raw.index.is_empty() {
            return Err(MarketDataError::normalization(
                "empty frame",
                ErrorMeta::new().source(source),
            ));
        }

        let open = raw.column_ci("Open");
        let high = raw.column_ci("High");
        let low = raw.column_ci("Low");
        let close = raw.column_ci("Close");
        let volume = raw.column_ci("Volume");

        let missing: Vec<&str> = [
            ("Open", open),
            ("High", high),
            ("Low", low),
            ("Close", close),
            ("Volume", volume),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_none())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(MarketDataError::normalization(
                format!("missing required column(s): {}", missing.join(", ")),
                ErrorMeta::new().source(source),
            ));
        }

        let open = open.unwrap().clone();
        let high = high.unwrap().clone();
        let low = low.unwrap().clone();
        let close = close.unwrap().clone();
        let volume = volume.unwrap().clone();
        let adj_close = raw
            .column_ci("Adj Close")
            .cloned()
            .unwrap_or_else(|| close.clone());

        let n = raw.index.len();
        for (name, col) in [
            ("Open", &open),
            ("High", &high),
            ("Low", &low),
            ("Close", &close),
            ("Adj Close", &adj_close),
            ("Volume", &volume),
        ] {
            if col.len() != n {
                return Err(MarketDataError::normalization(
                    format!("column {name} length does not match index"),
                    ErrorMeta::new().source(source),
                ));
            }
        }

        let mut rows: Vec<(i64, usize)> = raw
            .index
            .iter()
            .enumerate()
            .map(|(i, ts)| (ts.timestamp_millis(), i))
            .collect();
        // Stable sort by timestamp; ties keep original (first-seen) relative order.
        rows.sort_by_key(|(ts, _)| *ts);

        let mut out_millis = Vec::with_capacity(n);
        let mut out_open = Vec::with_capacity(n);
        let mut out_high = Vec::with_capacity(n);
        let mut out_low = Vec::with_capacity(n);
        let mut out_close = Vec::with_capacity(n);
        let mut out_adj_close = Vec::with_capacity(n);
        let mut out_volume = Vec::with_capacity(n);

        let mut last_millis: Option<i64> = None;
        for (ts, i) in rows {
            if last_millis == Some(ts) {
                continue; // duplicate index entry: keep first occurrence only
            }
            last_millis = Some(ts);
            out_millis.push(ts);
            out_open.push(open[i]);
            out_high.push(high[i]);
            out_low.push(low[i]);
            out_close.push(close[i]);
            out_adj_close.push(adj_close[i]);
            out_volume.push(volume[i]);
        }

        Ok(Frame {
            index_millis: out_millis,
            open: out_open,
            high: out_high,
            low: out_low,
            close: out_close,
            adj_close: out_adj_close,
            volume: out_volume,
        })
    }

    /// Clips the frame to an inclusive `[start, end]` window. Either bound
    /// may be absent.
    pub fn clip_range(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Frame {
        let start_millis = start.map(|d| d.timestamp_millis());
        let end_millis = end.map(|d| d.timestamp_millis());

        let keep: Vec<usize> = self
            .index_millis
            .iter()
            .enumerate()
            .filter(|(_, &ts)| {
                start_millis.is_none_or(|s| ts >= s) && end_millis.is_none_or(|e| ts <= e)
            })
            .map(|(i, _)| i)
            .collect();

        Frame {
            index_millis: keep.iter().map(|&i| self.index_millis[i]).collect(),
            open: keep.iter().map(|&i| self.open[i]).collect(),
            high: keep.iter().map(|&i| self.high[i]).collect(),
            low: keep.iter().map(|&i| self.low[i]).collect(),
            close: keep.iter().map(|&i| self.close[i]).collect(),
            adj_close: keep.iter().map(|&i| self.adj_close[i]).collect(),
            volume: keep.iter().map(|&i| self.volume[i]).collect(),
        }
    }

    /// Validates the canonical-frame invariants from §3/§8: exact column
    /// set (implicit in the struct shape), strictly ascending and
    /// duplicate-free index.
    pub fn validate(&self, source: &str) -> Result<(), MarketDataError> {
        for w in self.index_millis.windows(2) {
            if w[1] <= w[0] {
                return Err(MarketDataError::normalization(
                    "index is not strictly ascending / contains duplicates",
                    ErrorMeta::new().source(source),
                ));
            }
        }
        let n = self.index_millis.len();
        let cols_ok = self.open.len() == n
            && self.high.len() == n
            && self.low.len() == n
            && self.close.len() == n
            && self.adj_close.len() == n
            && self.volume.len() == n;
        if !cols_ok {
            return Err(MarketDataError::normalization(
                "column lengths do not match index length",
                ErrorMeta::new().source(source),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn canonicalizes_case_insensitive_columns_and_fills_adj_close() {
        let raw = RawFrame::new(vec![ts("2024-01-02T00:00:00Z"), ts("2024-01-03T00:00:00Z")])
            .with_column("open", vec![1.0, 2.0])
            .with_column("HIGH", vec![1.5, 2.5])
            .with_column("low", vec![0.5, 1.5])
            .with_column("Close", vec![1.2, 2.2])
            .with_column("Volume", vec![100.0, 200.0]);

        let frame = Frame::canonicalize(&raw, "test").unwrap();
        assert_eq!(frame.adj_close, frame.close);
        assert_eq!(frame.len(), 2);
        frame.validate("test").unwrap();
    }

    #[test]
    fn rejects_empty_frame() {
        let raw = RawFrame::new(vec![]);
        let err = Frame::canonicalize(&raw, "test").unwrap_err();
        assert!(matches!(err, MarketDataError::NormalizationError { .. }));
    }

    #[test]
    fn rejects_missing_required_column() {
        let raw = RawFrame::new(vec![ts("2024-01-02T00:00:00Z")])
            .with_column("Open", vec![1.0])
            .with_column("High", vec![1.0])
            .with_column("Low", vec![1.0])
            .with_column("Close", vec![1.0]);
        // Volume missing.
        let err = Frame::canonicalize(&raw, "test").unwrap_err();
        assert!(matches!(err, MarketDataError::NormalizationError { .. }));
    }

    #[test]
    fn sorts_ascending_and_dedupes_keeping_first() {
        let raw = RawFrame::new(vec![
            ts("2024-01-03T00:00:00Z"),
            ts("2024-01-02T00:00:00Z"),
            ts("2024-01-02T00:00:00Z"),
        ])
        .with_column("Open", vec![3.0, 2.0, 99.0])
        .with_column("High", vec![3.0, 2.0, 99.0])
        .with_column("Low", vec![3.0, 2.0, 99.0])
        .with_column("Close", vec![3.0, 2.0, 99.0])
        .with_column("Volume", vec![3.0, 2.0, 99.0]);

        let frame = Frame::canonicalize(&raw, "test").unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.open, vec![2.0, 3.0]);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let raw = RawFrame::new(vec![ts("2024-01-02T00:00:00Z"), ts("2024-01-03T00:00:00Z")])
            .with_column("Open", vec![1.0, 2.0])
            .with_column("High", vec![1.5, 2.5])
            .with_column("Low", vec![0.5, 1.5])
            .with_column("Close", vec![1.2, 2.2])
            .with_column("Volume", vec![100.0, 200.0]);

        let once = Frame::canonicalize(&raw, "test").unwrap();

        let mut raw2 = RawFrame::new(
            once.index_millis
                .iter()
                .map(|&m| DateTime::<Utc>::from_timestamp_millis(m).unwrap())
                .collect(),
        );
        raw2 = raw2
            .with_column("Open", once.open.clone())
            .with_column("High", once.high.clone())
            .with_column("Low", once.low.clone())
            .with_column("Close", once.close.clone())
            .with_column("Adj Close", once.adj_close.clone())
            .with_column("Volume", once.volume.clone());
        let twice = Frame::canonicalize(&raw2, "test").unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn clip_range_is_inclusive() {
        let raw = RawFrame::new(vec![
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-02T00:00:00Z"),
            ts("2024-01-03T00:00:00Z"),
        ])
        .with_column("Open", vec![1.0, 2.0, 3.0])
        .with_column("High", vec![1.0, 2.0, 3.0])
        .with_column("Low", vec![1.0, 2.0, 3.0])
        .with_column("Close", vec![1.0, 2.0, 3.0])
        .with_column("Volume", vec![1.0, 2.0, 3.0]);
        let frame = Frame::canonicalize(&raw, "test").unwrap();

        let clipped = frame.clip_range(Some(ts("2024-01-01T00:00:00Z")), Some(ts("2024-01-02T00:00:00Z")));
        assert_eq!(clipped.len(), 2);
    }
}
