//! Aggregation service: cache, quota, remote call and transform per metric.
//!
//! Every operation follows the same path. A cache hit returns immediately and
//! costs nothing. On a miss the tenant's quota is gated, the provider is
//! called, the response is transformed and written back to the cache.

use crate::gap::{competitor_window, gap_prospects, normalize_competitors, parse_competitors};
use crate::retry::RetryPolicy;
use futures_util::future::try_join_all;
use rankgrid_billing::{QuotaLedger, Settlement, UsageRecorder, UsageSummary};
use rankgrid_core::{
    normalize_domain, BacklinkOverview, BacklinkRecord, CompetitorOverlap, DataType,
    DomainOverview, KeywordMetrics, Page, Pagination, Prospect, QuotaMode, RankgridConfig,
    RankgridError, RankgridResult, ReferringDomain, Region, RelatedKeyword, SharedClock,
    SiteAudit, TenantId,
};
use rankgrid_provider::{transform, HttpTransport, RemoteCall, RemoteDataClient, ReportType};
use rankgrid_storage::{CacheKey, CacheStats, CacheStore, KvStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Backlink reports are always queried for the whole registrable domain.
const TARGET_TYPE: &str = "root_domain";

#[derive(Debug)]
pub struct AggregationService {
    cache: CacheStore,
    ledger: QuotaLedger,
    client: RemoteDataClient,
    retry: RetryPolicy,
    quota_mode: QuotaMode,
}

impl AggregationService {
    pub fn new(cache: CacheStore, ledger: QuotaLedger, client: RemoteDataClient) -> Self {
        Self {
            cache,
            ledger,
            client,
            retry: RetryPolicy::disabled(),
            quota_mode: QuotaMode::default(),
        }
    }

    /// Wire every component over one store and clock.
    pub fn from_config(
        config: &RankgridConfig,
        store: Arc<dyn KvStore>,
        clock: SharedClock,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let recorder = UsageRecorder::new(store.clone(), clock.clone());
        let client = RemoteDataClient::new(config.provider.clone(), transport, recorder);
        let cache = CacheStore::new(store.clone(), clock.clone())
            .with_ttl_policy(config.ttl.clone())
            .with_page_mode(config.page_mode);
        let ledger = QuotaLedger::new(store, clock);

        Self::new(cache, ledger, client)
            .with_retry_policy(RetryPolicy::new(config.retry))
            .with_quota_mode(config.quota_mode)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_quota_mode(mut self, quota_mode: QuotaMode) -> Self {
        self.quota_mode = quota_mode;
        self
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    pub async fn usage_summary(&self, tenant: TenantId) -> RankgridResult<UsageSummary> {
        self.ledger.summary(tenant).await
    }

    // ========================================================================
    // DOMAIN & AUDIT
    // ========================================================================

    /// Organic overview of `domain`, optionally in one regional database.
    pub async fn domain_overview(
        &self,
        domain: &str,
        tenant: TenantId,
        region: &Region,
    ) -> RankgridResult<DomainOverview> {
        let domain = require_domain("domain", domain)?;
        let span = info_span!("domain_overview", domain = %domain, tenant = %tenant, region = %region);
        async {
            let key = CacheKey::new(&domain, DataType::DomainOverview, region.clone());
            self.cached(&key, |_| true, async {
                let call = RemoteCall::new(ReportType::DomainRank, tenant)
                    .param("domain", &domain)
                    .optional_param("database", region.database_param());
                let raw = self.fetch_raw(call).await?;
                Ok(transform::domain_overview(&raw)?)
            })
            .await
        }
        .instrument(span)
        .await
    }

    pub async fn site_audit(&self, domain: &str, tenant: TenantId) -> RankgridResult<SiteAudit> {
        let domain = require_domain("domain", domain)?;
        let span = info_span!("site_audit", domain = %domain, tenant = %tenant);
        async {
            let key = CacheKey::new(&domain, DataType::SiteAudit, Region::Global);
            self.cached(&key, |_| true, async {
                let call = RemoteCall::new(ReportType::SiteAudit, tenant).param("domain", &domain);
                let raw = self.fetch_raw(call).await?;
                Ok(transform::site_audit(&raw)?)
            })
            .await
        }
        .instrument(span)
        .await
    }

    // ========================================================================
    // KEYWORDS
    // ========================================================================

    /// Keyword metrics in `region`. The global region is served by the
    /// all-databases aggregate, see [`Self::global_keyword`].
    pub async fn keyword(
        &self,
        keyword: &str,
        tenant: TenantId,
        region: &Region,
    ) -> RankgridResult<KeywordMetrics> {
        let Some(database) = region.database_param() else {
            return self.global_keyword(keyword, tenant).await;
        };
        let keyword = require_keyword(keyword)?;
        let span = info_span!("keyword", keyword = %keyword, tenant = %tenant, region = %region);
        async {
            let key = CacheKey::new(&keyword, DataType::Keyword, region.clone());
            self.cached(&key, is_complete_keyword, async {
                let call = RemoteCall::new(ReportType::PhraseThis, tenant)
                    .param("phrase", &keyword)
                    .param("database", database);
                let raw = self.fetch_raw(call).await?;
                Ok(transform::keyword_metrics(&raw, region)?)
            })
            .await
        }
        .instrument(span)
        .await
    }

    /// Keyword metrics summed and averaged over every regional database.
    pub async fn global_keyword(
        &self,
        keyword: &str,
        tenant: TenantId,
    ) -> RankgridResult<KeywordMetrics> {
        let keyword = require_keyword(keyword)?;
        let span = info_span!("global_keyword", keyword = %keyword, tenant = %tenant);
        async {
            let key = CacheKey::new(&keyword, DataType::Keyword, Region::Global);
            self.cached(&key, is_complete_keyword, async {
                let call = RemoteCall::new(ReportType::PhraseAll, tenant)
                    .param("phrase", &keyword)
                    .with_request_type("keyword_research");
                let raw = self.fetch_raw(call).await?;
                Ok(transform::global_keyword_metrics(&raw)?)
            })
            .await
        }
        .instrument(span)
        .await
    }

    /// Keyword metrics in one country database. The country is required.
    pub async fn country_keyword(
        &self,
        keyword: &str,
        tenant: TenantId,
        country: &str,
    ) -> RankgridResult<KeywordMetrics> {
        if country.trim().is_empty() {
            return Err(RankgridError::required("country"));
        }
        let region = Region::parse(Some(country));
        let valid = match &region {
            Region::Global => false,
            Region::Database(code) => code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-'),
        };
        if !valid {
            return Err(RankgridError::invalid(
                "country",
                format!("'{}' is not a regional database code", country.trim()),
            ));
        }
        self.keyword(keyword, tenant, &region).await
    }

    pub async fn related_keywords(
        &self,
        keyword: &str,
        tenant: TenantId,
        region: &Region,
        pagination: Pagination,
    ) -> RankgridResult<Page<RelatedKeyword>> {
        let keyword = require_keyword(keyword)?;
        let span = info_span!(
            "related_keywords",
            keyword = %keyword,
            tenant = %tenant,
            region = %region,
            page = pagination.page_number(),
        );
        async {
            let key = CacheKey::new(&keyword, DataType::RelatedKeywords, region.clone());
            self.cached_page(&key, pagination, async {
                let call = paged(
                    RemoteCall::new(ReportType::PhraseRelated, tenant).param("phrase", &keyword),
                    pagination,
                )
                .optional_param("database", region.database_param());
                let raw = self.fetch_raw(call).await?;
                Ok(transform::related_keywords(&raw, region)?)
            })
            .await
        }
        .instrument(span)
        .await
    }

    // ========================================================================
    // BACKLINKS
    // ========================================================================

    pub async fn backlink_overview(
        &self,
        domain: &str,
        tenant: TenantId,
    ) -> RankgridResult<BacklinkOverview> {
        let domain = require_domain("domain", domain)?;
        let span = info_span!("backlink_overview", domain = %domain, tenant = %tenant);
        async {
            let key = CacheKey::new(&domain, DataType::BacklinkOverview, Region::Global);
            self.cached(&key, |_| true, async {
                let call = backlink_call(ReportType::BacklinksOverview, tenant, &domain);
                let raw = self.fetch_raw(call).await?;
                Ok(transform::backlink_overview(&raw, &domain)?)
            })
            .await
        }
        .instrument(span)
        .await
    }

    pub async fn backlinks(
        &self,
        domain: &str,
        tenant: TenantId,
        pagination: Pagination,
    ) -> RankgridResult<Page<BacklinkRecord>> {
        let domain = require_domain("domain", domain)?;
        let span = info_span!("backlinks", domain = %domain, tenant = %tenant, page = pagination.page_number());
        async {
            let key = CacheKey::new(&domain, DataType::Backlinks, Region::Global);
            self.cached_page(&key, pagination, async {
                let call = paged(backlink_call(ReportType::Backlinks, tenant, &domain), pagination);
                let raw = self.fetch_raw(call).await?;
                Ok(transform::backlinks(&raw)?)
            })
            .await
        }
        .instrument(span)
        .await
    }

    pub async fn referring_domains(
        &self,
        domain: &str,
        tenant: TenantId,
        pagination: Pagination,
    ) -> RankgridResult<Page<ReferringDomain>> {
        let domain = require_domain("domain", domain)?;
        let span = info_span!("referring_domains", domain = %domain, tenant = %tenant, page = pagination.page_number());
        async {
            let key = CacheKey::new(&domain, DataType::ReferringDomains, Region::Global);
            self.cached_page(&key, pagination, async {
                let call = paged(
                    backlink_call(ReportType::BacklinksRefdomains, tenant, &domain),
                    pagination,
                );
                let raw = self.fetch_raw(call).await?;
                Ok(transform::referring_domains(&raw)?)
            })
            .await
        }
        .instrument(span)
        .await
    }

    /// Domains whose backlink profiles overlap `domain`'s.
    pub async fn competitor_overlap(
        &self,
        domain: &str,
        tenant: TenantId,
        pagination: Pagination,
    ) -> RankgridResult<Page<CompetitorOverlap>> {
        let domain = require_domain("domain", domain)?;
        let span = info_span!("competitor_overlap", domain = %domain, tenant = %tenant, page = pagination.page_number());
        async {
            let key = CacheKey::new(&domain, DataType::CompetitorOverlap, Region::Global);
            self.cached_page(&key, pagination, async {
                let call = paged(
                    backlink_call(ReportType::BacklinksCompetitors, tenant, &domain),
                    pagination,
                );
                let raw = self.fetch_raw(call).await?;
                Ok(transform::competitor_overlap(&raw)?)
            })
            .await
        }
        .instrument(span)
        .await
    }

    /// Link-building prospects: domains referring to any competitor but not
    /// to `target`.
    ///
    /// The target and every competitor are fetched concurrently, each through
    /// the cached referring-domain path; the first failure aborts the whole
    /// analysis. The result is an approximation over the requested window,
    /// never cached itself.
    pub async fn backlink_gap<S: AsRef<str>>(
        &self,
        target: &str,
        competitors: &[S],
        tenant: TenantId,
        pagination: Pagination,
    ) -> RankgridResult<Page<Prospect>> {
        let target = require_domain("target", target)?;
        let competitors = normalize_competitors(&target, &parse_competitors(competitors));
        if competitors.is_empty() {
            return Err(RankgridError::invalid(
                "competitors",
                "at least one competitor other than the target is required",
            ));
        }

        let span = info_span!(
            "backlink_gap",
            target = %target,
            tenant = %tenant,
            competitors = competitors.len(),
            page = pagination.page_number(),
        );
        async {
            let window = competitor_window(pagination, competitors.len());
            let fetches = std::iter::once(self.referring_domains(&target, tenant, pagination))
                .chain(
                    competitors
                        .iter()
                        .map(|c| self.referring_domains(c, tenant, window)),
                );
            let mut pages = try_join_all(fetches).await?.into_iter();

            let target_referring = pages.next().map(|p| p.items).unwrap_or_default();
            let competitor_referring: Vec<Vec<ReferringDomain>> =
                pages.map(|p| p.items).collect();

            let prospects = gap_prospects(
                &target,
                &target_referring,
                &competitor_referring,
                pagination.limit() as usize,
            );
            info!(
                target_domains = target_referring.len(),
                prospects = prospects.len(),
                "backlink gap computed"
            );
            Ok(Page::new(prospects, pagination))
        }
        .instrument(span)
        .await
    }

    // ========================================================================
    // PLUMBING
    // ========================================================================

    /// Gate the call on the tenant's quota and perform it.
    ///
    /// Under [`QuotaMode::Reserve`] credits are held up front and handed back
    /// if the call fails; the recorder then only logs. Under
    /// [`QuotaMode::CheckThenCharge`] the ledger is only consulted and the
    /// recorder charges on success.
    async fn fetch_raw(&self, call: RemoteCall) -> RankgridResult<String> {
        let (tenant, category, credits) = (call.tenant(), call.category(), call.credits());
        match self.quota_mode {
            QuotaMode::CheckThenCharge => {
                self.ledger.check_quota(tenant, category, credits).await?;
                self.retry.run(|| self.client.call(call.clone())).await
            }
            QuotaMode::Reserve => {
                let reservation = self.ledger.reserve(tenant, category, credits).await?;
                let call = call.with_settlement(Settlement::Reserved);
                match self.retry.run(|| self.client.call(call.clone())).await {
                    Ok(body) => Ok(body),
                    Err(e) => {
                        self.ledger.release(&reservation).await;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Serve `key` from the cache when the cached value passes `accept`,
    /// otherwise run `fetch` and write its result back.
    ///
    /// A failed cache write does not fail the request.
    async fn cached<T, Fut>(
        &self,
        key: &CacheKey,
        accept: fn(&T) -> bool,
        fetch: Fut,
    ) -> RankgridResult<T>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = RankgridResult<T>>,
    {
        if let Some(hit) = self.cache.get::<T>(key).await? {
            if accept(&hit) {
                return Ok(hit);
            }
            debug!(key = %key, "cached payload incomplete, refetching");
        }

        let value = fetch.await?;
        if let Err(e) = self.cache.set(key, &value).await {
            warn!(key = %key, error = %e, "cache write failed");
        }
        Ok(value)
    }

    async fn cached_page<T, Fut>(
        &self,
        key: &CacheKey,
        pagination: Pagination,
        fetch: Fut,
    ) -> RankgridResult<Page<T>>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = RankgridResult<Vec<T>>>,
    {
        if let Some(items) = self.cache.get_page::<T>(key, pagination).await? {
            return Ok(Page::new(items, pagination));
        }

        let items = fetch.await?;
        if let Err(e) = self.cache.put_page(key, pagination, &items).await {
            warn!(key = %key, page = pagination.page_number(), error = %e, "cache page write failed");
        }
        Ok(Page::new(items, pagination))
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// A cached keyword is only served when volume, difficulty and CPC are all
/// present; zeroes mean an earlier fetch came back incomplete.
fn is_complete_keyword(metrics: &KeywordMetrics) -> bool {
    metrics.search_volume != 0 && metrics.keyword_difficulty != 0 && metrics.cpc != 0.0
}

fn require_domain(field: &str, input: &str) -> RankgridResult<String> {
    let domain = normalize_domain(input);
    if domain.is_empty() {
        return Err(RankgridError::required(field));
    }
    Ok(domain)
}

fn require_keyword(input: &str) -> RankgridResult<String> {
    let keyword = input.trim();
    if keyword.is_empty() {
        return Err(RankgridError::required("keyword"));
    }
    Ok(keyword.to_string())
}

fn backlink_call(report: ReportType, tenant: TenantId, domain: &str) -> RemoteCall {
    RemoteCall::new(report, tenant)
        .param("target", domain)
        .param("target_type", TARGET_TYPE)
}

/// `display_offset` is only sent past the first row.
fn paged(call: RemoteCall, pagination: Pagination) -> RemoteCall {
    let offset = (pagination.offset() > 0).then_some(pagination.offset());
    call.param("display_limit", pagination.limit())
        .optional_param("display_offset", offset)
}
