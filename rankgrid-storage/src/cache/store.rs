//! TTL cache over the metric cache table.

use super::key::CacheKey;
use super::stats::{CacheStats, StatsCounters};
use crate::store::{from_row, to_row, KvStore};
use crate::tables::{CacheRow, METRIC_CACHE_TABLE};
use chrono::Duration;
use rankgrid_core::{PageMode, Pagination, RankgridResult, SharedClock, StorageError, TtlPolicy};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One page of a merged payload and the page size it was fetched with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSlice {
    pub limit: u32,
    pub records: Vec<Value>,
}

/// Payload layout for [`PageMode::Merged`]: page number to that page's slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedPages {
    pub pages: BTreeMap<u32, PageSlice>,
}

impl MergedPages {
    /// Replace the page `pagination` points at with `records`. Other pages are
    /// untouched.
    pub fn merge(&mut self, pagination: Pagination, records: Vec<Value>) {
        self.pages.insert(
            pagination.page_number(),
            PageSlice {
                limit: pagination.limit(),
                records,
            },
        );
    }

    /// Records of the page `pagination` points at, if that page was stored
    /// with the same limit.
    pub fn take(&mut self, pagination: Pagination) -> Option<Vec<Value>> {
        match self.pages.remove(&pagination.page_number()) {
            Some(slice) if slice.limit == pagination.limit() => Some(slice.records),
            _ => None,
        }
    }

    pub fn record_count(&self) -> usize {
        self.pages.values().map(|slice| slice.records.len()).sum()
    }
}

/// Cache store with expiry checked at read time.
///
/// Expired rows are not deleted; they read as misses until overwritten.
#[derive(Debug)]
pub struct CacheStore {
    store: Arc<dyn KvStore>,
    clock: SharedClock,
    ttl: TtlPolicy,
    page_mode: PageMode,
    stats: StatsCounters,
}

impl CacheStore {
    pub fn new(store: Arc<dyn KvStore>, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            ttl: TtlPolicy::default(),
            page_mode: PageMode::default(),
            stats: StatsCounters::default(),
        }
    }

    pub fn with_ttl_policy(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_page_mode(mut self, page_mode: PageMode) -> Self {
        self.page_mode = page_mode;
        self
    }

    pub fn page_mode(&self) -> PageMode {
        self.page_mode
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    // ========================================================================
    // Point entries
    // ========================================================================

    /// Cached payload for `key`, or `None` when missing, expired or undecodable.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> RankgridResult<Option<T>> {
        let payload = match self.read_live(key).await? {
            Some(payload) => payload,
            None => {
                self.stats.miss();
                debug!(key = %key, "cache miss");
                return Ok(None);
            }
        };

        match serde_json::from_value(payload) {
            Ok(value) => {
                self.stats.hit();
                debug!(key = %key, "cache hit");
                Ok(Some(value))
            }
            Err(e) => {
                self.stats.miss();
                warn!(key = %key, error = %e, "cached payload could not be decoded, treating as miss");
                Ok(None)
            }
        }
    }

    /// Store `payload` under `key` using the TTL policy for its data type.
    pub async fn set<T: Serialize>(&self, key: &CacheKey, payload: &T) -> RankgridResult<()> {
        let hours = self.ttl.hours(key.data_type());
        self.set_with_ttl(key, payload, hours).await
    }

    /// Store `payload` under `key`, expiring `ttl_hours` from now. Last writer wins.
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &CacheKey,
        payload: &T,
        ttl_hours: u32,
    ) -> RankgridResult<()> {
        let data = serde_json::to_value(payload).map_err(|e| StorageError::Serialization {
            table: METRIC_CACHE_TABLE.to_string(),
            reason: e.to_string(),
        })?;
        self.write(key, data, ttl_hours).await
    }

    // ========================================================================
    // Paginated entries
    // ========================================================================

    /// Cached records for the page `pagination` points at.
    ///
    /// A hit requires that page's own slice, fetched with the same limit, to be
    /// present; other cached pages never satisfy it.
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
        pagination: Pagination,
    ) -> RankgridResult<Option<Vec<T>>> {
        let page = pagination.page_number();
        match self.page_mode {
            PageMode::PerPageKey => self.get(&key.for_page(pagination)).await,
            PageMode::Merged => {
                let merged: Option<MergedPages> = match self.read_live(&key.unpaged()).await? {
                    Some(payload) => serde_json::from_value(payload).ok(),
                    None => None,
                };
                let slice = merged.and_then(|mut m| m.take(pagination));
                let decoded = slice.and_then(|records| {
                    records
                        .into_iter()
                        .map(serde_json::from_value)
                        .collect::<Result<Vec<T>, _>>()
                        .ok()
                });
                match decoded {
                    Some(records) => {
                        self.stats.hit();
                        debug!(key = %key, page, "cache page hit");
                        Ok(Some(records))
                    }
                    None => {
                        self.stats.miss();
                        debug!(key = %key, page, "cache page miss");
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Store one page of records in the configured layout.
    pub async fn put_page<T: Serialize>(
        &self,
        key: &CacheKey,
        pagination: Pagination,
        records: &[T],
    ) -> RankgridResult<()> {
        match self.page_mode {
            PageMode::PerPageKey => self.set(&key.for_page(pagination), &records).await,
            PageMode::Merged => self.merge_page(key, pagination, records).await,
        }
    }

    /// Read-modify-write of a merged payload: the page's previous records are
    /// dropped and replaced, every other page is kept.
    ///
    /// Concurrent merges on the same key may lose a page; the per-page layout
    /// does not have that race.
    pub async fn merge_page<T: Serialize>(
        &self,
        key: &CacheKey,
        pagination: Pagination,
        records: &[T],
    ) -> RankgridResult<()> {
        let base = key.unpaged();
        let mut merged: MergedPages = match self.read_live(&base).await? {
            Some(payload) => serde_json::from_value(payload).unwrap_or_else(|e| {
                warn!(key = %base, error = %e, "discarding undecodable merged payload");
                MergedPages::default()
            }),
            None => MergedPages::default(),
        };

        let values = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Serialization {
                table: METRIC_CACHE_TABLE.to_string(),
                reason: e.to_string(),
            })?;
        merged.merge(pagination, values);

        let data = serde_json::to_value(&merged).map_err(|e| StorageError::Serialization {
            table: METRIC_CACHE_TABLE.to_string(),
            reason: e.to_string(),
        })?;
        self.write(&base, data, self.ttl.hours(key.data_type())).await
    }

    // ========================================================================
    // Row access
    // ========================================================================

    async fn read_live(&self, key: &CacheKey) -> RankgridResult<Option<Value>> {
        let rows = self.store.select(METRIC_CACHE_TABLE, &key.filters()).await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let row: CacheRow = match from_row(METRIC_CACHE_TABLE, row) {
            Ok(row) => row,
            Err(e) => {
                warn!(key = %key, error = %e, "malformed cache row, treating as miss");
                return Ok(None);
            }
        };

        if self.clock.now() < row.expires_at {
            Ok(Some(row.data))
        } else {
            debug!(key = %key, expired_at = %row.expires_at, "cache entry expired");
            Ok(None)
        }
    }

    async fn write(&self, key: &CacheKey, data: Value, ttl_hours: u32) -> RankgridResult<()> {
        let now = self.clock.now();
        let row = CacheRow {
            subject: key.subject().to_string(),
            data_type: key.data_type().as_db_str().to_string(),
            database_region: key.region().as_str().to_string(),
            page: key.page(),
            page_limit: key.page_limit(),
            data,
            expires_at: now + Duration::hours(i64::from(ttl_hours)),
            updated_at: now,
        };
        self.store
            .upsert(
                METRIC_CACHE_TABLE,
                to_row(METRIC_CACHE_TABLE, &row)?,
                &CacheRow::CONFLICT_KEY,
            )
            .await?;
        self.stats.write();
        debug!(key = %key, ttl_hours, "cache write");
        Ok(())
    }
}
