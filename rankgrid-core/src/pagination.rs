//! Pagination parameters and the page envelope returned by paginated metrics.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// A `(limit, offset)` window over a provider report.
///
/// `limit` is always in `[1, MAX_PAGE_LIMIT]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    limit: u32,
    offset: u32,
}

impl Pagination {
    /// Build a window from caller input, applying defaults and clamping.
    ///
    /// A missing or non-positive limit falls back to `default_limit`; negative
    /// offsets become 0.
    pub fn new(limit: Option<i64>, offset: Option<i64>, default_limit: u32) -> Self {
        let limit = match limit {
            Some(l) if l > 0 => l.min(MAX_PAGE_LIMIT as i64) as u32,
            _ => default_limit.clamp(1, MAX_PAGE_LIMIT),
        };
        let offset = offset.unwrap_or(0).clamp(0, u32::MAX as i64) as u32;
        Self { limit, offset }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// 1-based page index: `floor(offset / limit) + 1`, saturating at `u32::MAX`.
    pub fn page_number(&self) -> u32 {
        (self.offset / self.limit).saturating_add(1)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None, DEFAULT_PAGE_LIMIT)
    }
}

/// One page of a paginated metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: u32,
    pub limit: u32,
    pub count: usize,
    /// A full page suggests more rows exist.
    pub has_more: bool,
    /// Lower-bound estimate: one extra page is assumed when this page is full.
    pub total_available: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination) -> Self {
        let count = items.len();
        let has_more = count == pagination.limit() as usize;
        let extra = if has_more { pagination.limit() as u64 } else { 0 };
        Self {
            offset: pagination.offset(),
            limit: pagination.limit(),
            count,
            has_more,
            total_available: pagination.offset() as u64 + count as u64 + extra,
            items,
        }
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            offset: self.offset,
            limit: self.limit,
            count: self.count,
            has_more: self.has_more,
            total_available: self.total_available,
        }
    }
}
