//! rankgrid Storage - Store Contract and Cache
//!
//! This crate defines the narrow store interface rankgrid talks to
//! ([`KvStore`]), an in-memory implementation, the typed rows of the quota,
//! usage-log and cache tables, and the TTL cache built on top of them.

pub mod cache;
pub mod memory;
pub mod store;
pub mod tables;

pub use cache::{CacheKey, CacheStats, CacheStore, MergedPages, PageSlice};
pub use memory::InMemoryStore;
pub use store::{
    from_row, select_one, to_row, CounterLimit, CounterOutcome, CounterUpdate, Filter, KvStore,
    Row,
};
pub use tables::{
    limit_column, used_column, CacheRow, QuotaPeriod, TenantAccount, TierLimit, UsageLogEntry,
    METRIC_CACHE_TABLE, QUOTA_USAGE_TABLE, TIER_LIMITS_TABLE, TOTAL_LIMIT_COLUMN,
    TOTAL_USED_COLUMN, USAGE_LOG_TABLE, USERS_TABLE,
};
