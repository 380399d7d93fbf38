//! Canonical OHLCV frames, the multi-series aligner, and the closed set of
//! derived "typology" views over them.
//!
//! This crate has no I/O: it is the synchronous normalization core shared by
//! every provider adapter in `md-providers` and consumed by `md-portfolio`
//! and `md-facade`.

pub mod aligner;
pub mod error;
pub mod frame;
pub mod series;
pub mod typology;

pub use aligner::{align, AlignMode};
pub use error::{build_error_from_http, ErrorMeta, MarketDataError};
pub use frame::{Frame, RawFrame};
pub use series::{
    mean_std, PerformanceSeries, PriceSeries, ReturnsKind, SeriesType, VolatilitySeries,
    VolumeActivitySeries,
};
pub use typology::{build as build_typology, Typology};
