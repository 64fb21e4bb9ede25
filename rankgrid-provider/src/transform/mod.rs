//! Response transformers: pure functions from raw provider text to typed
//! records.
//!
//! Single-row reports are read by header name and fail closed when a header
//! they need is missing. Tabular reports are read by position; rows shorter
//! than the report schema are skipped, and an empty body (the provider's
//! "nothing found" answer) is an empty list.

mod audit;
mod backlink;
mod domain;
mod keyword;

pub use audit::site_audit;
pub use backlink::{backlink_overview, backlinks, competitor_overlap, referring_domains};
pub use domain::domain_overview;
pub use keyword::{global_keyword_metrics, keyword_metrics, related_keywords};

use crate::report::{Layout, ReportType};

/// Shortest row a tabular report accepts.
pub(crate) fn min_columns(report: ReportType) -> usize {
    match report.schema().layout {
        Layout::Tabular { min_columns } => min_columns,
        Layout::SingleRow => 1,
    }
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
