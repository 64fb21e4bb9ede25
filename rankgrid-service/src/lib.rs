//! rankgrid Service - Metric Aggregation and Backlink Gap Analysis
//!
//! [`AggregationService`] ties the cache, quota ledger and remote client
//! together behind one operation per metric. The gap helpers, the optional
//! retry layer and tracing setup live alongside it.

pub mod gap;
pub mod retry;
pub mod service;
pub mod telemetry;

pub use gap::{
    competitor_window, gap_prospects, normalize_competitors, parse_competitors,
    per_competitor_limit,
};
pub use retry::RetryPolicy;
pub use service::AggregationService;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
