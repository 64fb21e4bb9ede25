//! Composite cache keys.

use crate::store::Filter;
use rankgrid_core::{normalize_subject, DataType, Pagination, Region};
use serde_json::Value;
use std::fmt;

/// Cache key: `(subject, data_type, region)` plus an optional page scope.
///
/// A page scope is the 1-based page number together with the page size it was
/// fetched with; the same page index at a different limit is a different slice.
///
/// Keys are tenant-independent; two tenants asking for the same metric share
/// one entry. The subject is normalized on construction so `Example.com` and
/// ` example.com` resolve to the same row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    subject: String,
    data_type: DataType,
    region: Region,
    page: Option<u32>,
    page_limit: Option<u32>,
}

impl CacheKey {
    pub fn new(subject: &str, data_type: DataType, region: Region) -> Self {
        Self {
            subject: normalize_subject(subject),
            data_type,
            region,
            page: None,
            page_limit: None,
        }
    }

    /// Same key scoped to the page `pagination` points at.
    pub fn for_page(&self, pagination: Pagination) -> Self {
        Self {
            page: Some(pagination.page_number()),
            page_limit: Some(pagination.limit()),
            ..self.clone()
        }
    }

    /// Same key without page scoping.
    pub fn unpaged(&self) -> Self {
        Self {
            page: None,
            page_limit: None,
            ..self.clone()
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn page(&self) -> Option<u32> {
        self.page
    }

    pub fn page_limit(&self) -> Option<u32> {
        self.page_limit
    }

    pub(crate) fn filters(&self) -> Vec<Filter> {
        vec![
            Filter::eq("subject", self.subject.clone()),
            Filter::eq("data_type", self.data_type.as_db_str()),
            Filter::eq("database_region", self.region.as_str()),
            Filter::eq("page", self.page.map_or(Value::Null, Value::from)),
            Filter::eq("page_limit", self.page_limit.map_or(Value::Null, Value::from)),
        ]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.data_type, self.region, self.subject)?;
        if let Some(page) = self.page {
            write!(f, "#{}", page)?;
        }
        if let Some(limit) = self.page_limit {
            write!(f, "/{}", limit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_normalized() {
        let a = CacheKey::new(" Example.COM ", DataType::BacklinkOverview, Region::Global);
        let b = CacheKey::new("example.com", DataType::BacklinkOverview, Region::Global);
        assert_eq!(a, b);
        assert_eq!(a.subject(), "example.com");
    }

    #[test]
    fn test_page_scoping() {
        let base = CacheKey::new("example.com", DataType::Backlinks, Region::parse(Some("us")));
        let page = base.for_page(Pagination::new(Some(20), Some(40), 20));
        assert_ne!(base, page);
        assert_eq!(page.page(), Some(3));
        assert_eq!(page.page_limit(), Some(20));
        assert_eq!(page.unpaged(), base);
        assert_eq!(page.to_string(), "backlinks:us:example.com#3/20");
        assert_eq!(base.to_string(), "backlinks:us:example.com");
    }

    #[test]
    fn test_page_scope_includes_limit() {
        let base = CacheKey::new("example.com", DataType::ReferringDomains, Region::Global);
        let wide = base.for_page(Pagination::new(Some(20), Some(0), 20));
        let narrow = base.for_page(Pagination::new(Some(10), Some(0), 20));
        assert_eq!(wide.page(), narrow.page());
        assert_ne!(wide, narrow);
        assert_ne!(wide.filters(), narrow.filters());
    }
}
