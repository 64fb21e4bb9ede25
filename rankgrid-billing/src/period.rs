//! Calendar-month billing periods.

use chrono::Datelike;
use rankgrid_core::{TenantId, Timestamp};
use rankgrid_storage::Filter;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A UTC calendar month. Usage rolls over implicitly when "now" enters a new
/// month, because lookups are keyed on the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub year: i32,
    /// 1-based month.
    pub month: u32,
}

impl BillingPeriod {
    pub fn containing(at: Timestamp) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    /// Filters selecting `tenant`'s quota row for this period.
    pub fn quota_key(&self, tenant: TenantId) -> Vec<Filter> {
        vec![
            Filter::eq("user_id", tenant.to_string()),
            Filter::eq("billing_month", self.month),
            Filter::eq("billing_year", self.year),
        ]
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
