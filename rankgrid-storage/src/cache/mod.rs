//! Page-aware TTL cache for provider results.
//!
//! Entries are keyed by `(subject, data_type, region)`. Paginated metrics are
//! stored either one row per page ([`PageMode::PerPageKey`]) or as a single
//! merged row mapping page numbers to records ([`PageMode::Merged`]). Either
//! way, a page lookup only hits when that page's own records are present.
//!
//! [`PageMode::PerPageKey`]: rankgrid_core::PageMode::PerPageKey
//! [`PageMode::Merged`]: rankgrid_core::PageMode::Merged

pub mod key;
pub mod stats;
pub mod store;

pub use key::CacheKey;
pub use stats::CacheStats;
pub use store::{CacheStore, MergedPages, PageSlice};
