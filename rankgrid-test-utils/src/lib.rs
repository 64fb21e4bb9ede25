//! rankgrid Test Utilities
//!
//! Shared test infrastructure for the rankgrid workspace:
//! - A scripted HTTP transport standing in for the remote provider
//! - A store wrapper that fails on chosen tables
//! - Fixtures: fixed clock, seeded tenants, canned provider responses
//! - Proptest generators and custom assertions

pub use rankgrid_core::{
    CompetitionLevel, DataType, EndpointCategory, ManualClock, Pagination, ProviderConfig,
    RankgridError, RankgridResult, ReferringDomain, Region, StorageError, TenantId, Timestamp,
};
pub use rankgrid_provider::{HttpResponse, HttpTransport, ReportType, TransportError};
pub use rankgrid_storage::{InMemoryStore, KvStore};

use async_trait::async_trait;
use rankgrid_storage::{CounterLimit, CounterOutcome, CounterUpdate, Filter, Row};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// SCRIPTED TRANSPORT
// ============================================================================

#[derive(Debug, Clone)]
struct Route {
    matchers: Vec<(String, String)>,
    response: Result<HttpResponse, TransportError>,
}

impl Route {
    fn matches(&self, query: &[(String, String)]) -> bool {
        self.matchers
            .iter()
            .all(|(name, value)| query.iter().any(|(k, v)| k == name && v == value))
    }
}

/// [`HttpTransport`] answering from a script instead of the network.
///
/// Routes match on query parameters and answer every matching request;
/// queued responses are consumed in order by requests no route matches.
/// Unscripted requests get an HTTP 500.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    queue: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<Vec<(String, String)>>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next unrouted request.
    pub fn push(&self, response: HttpResponse) -> &Self {
        lock(&self.queue).push_back(Ok(response));
        self
    }

    /// Queue a transport failure for the next unrouted request.
    pub fn push_failure(&self, reason: impl Into<String>) -> &Self {
        lock(&self.queue).push_back(Err(TransportError(reason.into())));
        self
    }

    /// Answer every request whose query contains all `matchers`.
    pub fn route(&self, matchers: &[(&str, &str)], response: HttpResponse) -> &Self {
        lock(&self.routes).push(Route {
            matchers: matchers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            response: Ok(response),
        });
        self
    }

    /// Answer every request for `report` about `subject` (`domain`, `phrase`
    /// or `target` parameter).
    pub fn route_report(&self, report: ReportType, subject: &str, response: HttpResponse) -> &Self {
        let param = subject_param(report);
        self.route(&[("type", report.as_str()), (param, subject)], response)
    }

    /// Sleep before answering each request.
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.delay) = Some(delay);
        self
    }

    /// Every query seen so far, in arrival order.
    pub fn requests(&self) -> Vec<Vec<(String, String)>> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of requests made for `report`.
    pub fn count_for(&self, report: ReportType) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|q| q.iter().any(|(k, v)| k == "type" && v == report.as_str()))
            .count()
    }

    fn answer(&self, query: &[(String, String)]) -> Result<HttpResponse, TransportError> {
        if let Some(route) = lock(&self.routes).iter().find(|r| r.matches(query)) {
            return route.response.clone();
        }
        lock(&self.queue).pop_front().unwrap_or_else(|| {
            Ok(HttpResponse {
                status: 500,
                retry_after: None,
                body: "unscripted request".to_string(),
            })
        })
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(
        &self,
        _url: &str,
        query: &[(String, String)],
    ) -> Result<HttpResponse, TransportError> {
        lock(&self.requests).push(query.to_vec());
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.answer(query)
    }
}

/// Query parameter naming the subject of a report.
pub fn subject_param(report: ReportType) -> &'static str {
    match report {
        ReportType::DomainRank | ReportType::SiteAudit => "domain",
        ReportType::PhraseThis | ReportType::PhraseAll | ReportType::PhraseRelated => "phrase",
        ReportType::BacklinksOverview
        | ReportType::Backlinks
        | ReportType::BacklinksRefdomains
        | ReportType::BacklinksCompetitors => "target",
    }
}

// ============================================================================
// FAILING STORE
// ============================================================================

/// [`InMemoryStore`] wrapper whose operations on chosen tables fail with a
/// backend error.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: InMemoryStore,
    failing: Mutex<HashSet<String>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(tables: &[&str]) -> Self {
        let store = Self::new();
        for table in tables {
            store.fail_table(table);
        }
        store
    }

    pub fn fail_table(&self, table: &str) {
        lock(&self.failing).insert(table.to_string());
    }

    pub fn heal_table(&self, table: &str) {
        lock(&self.failing).remove(table);
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    fn check(&self, table: &str) -> RankgridResult<()> {
        if lock(&self.failing).contains(table) {
            Err(StorageError::Backend {
                table: table.to_string(),
                reason: "injected failure".to_string(),
            }
            .into())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KvStore for FailingStore {
    async fn select(&self, table: &str, filters: &[Filter]) -> RankgridResult<Vec<Row>> {
        self.check(table)?;
        self.inner.select(table, filters).await
    }

    async fn upsert(&self, table: &str, row: Row, conflict_key: &[&str]) -> RankgridResult<()> {
        self.check(table)?;
        self.inner.upsert(table, row, conflict_key).await
    }

    async fn insert(&self, table: &str, row: Row) -> RankgridResult<()> {
        self.check(table)?;
        self.inner.insert(table, row).await
    }

    async fn increment(&self, update: &CounterUpdate) -> RankgridResult<()> {
        self.check(&update.table)?;
        self.inner.increment(update).await
    }

    async fn increment_within_limits(
        &self,
        update: &CounterUpdate,
        limits: &[CounterLimit],
    ) -> RankgridResult<CounterOutcome> {
        self.check(&update.table)?;
        self.inner.increment_within_limits(update, limits).await
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};
    use rankgrid_storage::{
        to_row, TenantAccount, TierLimit, QUOTA_USAGE_TABLE, TIER_LIMITS_TABLE, USERS_TABLE,
    };
    use std::sync::Arc;
    use uuid::Uuid;

    /// 2025-03-15 12:00:00 UTC.
    pub fn fixed_now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(fixed_now()))
    }

    pub fn test_provider_config() -> ProviderConfig {
        ProviderConfig::new("test-api-key").with_base_url("http://provider.test")
    }

    /// A tier with `limit` credits in every category and no total cap.
    pub fn uniform_tier(name: &str, limit: i64) -> TierLimit {
        EndpointCategory::ALL
            .iter()
            .fold(TierLimit::named(name), |tier, category| {
                tier.with_limit(*category, limit)
            })
    }

    /// The default test tier: 100 credits per category, 300 in total.
    pub fn standard_tier() -> TierLimit {
        uniform_tier("pro", 100).with_total_limit(300)
    }

    /// Insert a tenant on `tier` (and the tier itself) and return its id.
    pub async fn seed_tenant(store: &dyn KvStore, tier: &TierLimit) -> TenantId {
        let tenant = Uuid::now_v7();
        let account = TenantAccount {
            id: tenant,
            subscription_tier: tier.tier_name.clone(),
        };
        let account_row = to_row(USERS_TABLE, &account).unwrap_or_default();
        let tier_row = to_row(TIER_LIMITS_TABLE, tier).unwrap_or_default();
        let seeded = async {
            store.insert(USERS_TABLE, account_row).await?;
            store
                .upsert(TIER_LIMITS_TABLE, tier_row, &["tier_name"])
                .await
        };
        if let Err(e) = seeded.await {
            panic!("failed to seed tenant: {e}");
        }
        tenant
    }

    /// Credits `tenant` has used in `category` this period, read raw.
    pub async fn used_credits(
        store: &dyn KvStore,
        tenant: TenantId,
        at: Timestamp,
        category: EndpointCategory,
    ) -> i64 {
        use chrono::Datelike;
        let filters = [
            Filter::eq("user_id", tenant.to_string()),
            Filter::eq("billing_month", at.month()),
            Filter::eq("billing_year", at.year()),
        ];
        let rows = store
            .select(QUOTA_USAGE_TABLE, &filters)
            .await
            .unwrap_or_default();
        rows.first()
            .and_then(|row| row.get(&rankgrid_storage::used_column(category)))
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }

    // === Canned provider responses ===

    pub const WIDGETS_KEYWORD_CSV: &str =
        "Keyword;Search Volume;CPC;Competition;Keyword Difficulty Index\nwidgets;1000;2.5;0.5;40\n";

    pub const WIDGETS_GLOBAL_CSV: &str = "Database;Keyword;Search Volume;CPC;Competition;Keyword Difficulty Index\n\
        us;widgets;1000;2.5;0.5;40\n\
        uk;widgets;300;1.5;0.3;30\n";

    pub const RELATED_CSV: &str =
        "Keyword;Search Volume;CPC;Competition;Keyword Difficulty Index;Related Relevance\n\
        blue widgets;880;1.9;0.7;35;0.85\n\
        cheap widgets;320;0.4;0.2;12;0.6\n";

    pub const DOMAIN_RANK_CSV: &str = "Domain;Rank;Organic Keywords;Organic Traffic;Organic Cost;Adwords Keywords;Adwords Traffic;Adwords Cost\n\
        example.com;1520;48210;391004;512000.5;12;300;410.2\n";

    pub const BACKLINKS_OVERVIEW_CSV: &str =
        "ascore;total;domains_num;urls_num;ips_num;follows_num;nofollows_num\n\
        57;120400;3100;88000;2400;99000;21400\n";

    pub const BACKLINKS_CSV: &str = "page_ascore;source_title;source_url;target_url;anchor;nofollow;first_seen;last_seen\n\
        44;Widget news;https://www.news.example.org/post/1;https://example.com/;widgets;0;1700000000;1710000000\n\
        9;Forum;http://forum.example.net/t/2;https://example.com/buy;buy here;1;1690000000;1700000000\n";

    pub const COMPETITORS_CSV: &str =
        "ascore;neighbour;similarity;common_refdomains;domains_num;backlinks_num\n\
        60;rival.com;72;410;5200;64000\n\
        35;other.com;20;12;800;3000\n";

    pub const SITE_AUDIT_CSV: &str = "domain;pages_crawled;errors;warnings;notices;health_score\n\
        example.com;250;4;31;112;87.5\n";

    /// `backlinks_refdomains` body listing `(domain, authority)` rows. A
    /// `None` authority leaves the cell blank.
    pub fn refdomains_csv(rows: &[(&str, Option<i64>)]) -> String {
        let mut csv = String::from("domain_ascore;domain;backlinks_num;ip;country;first_seen;last_seen\n");
        for (domain, authority) in rows {
            let authority = authority.map(|a| a.to_string()).unwrap_or_default();
            csv.push_str(&format!(
                "{};{};10;192.0.2.1;us;1600000000;1700000000\n",
                authority, domain
            ));
        }
        csv
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for rankgrid types.

    use super::*;
    use proptest::prelude::*;

    /// Competition values, including the bucket boundaries.
    pub fn arb_competition() -> impl Strategy<Value = f64> {
        prop_oneof![
            Just(0.0),
            Just(0.33),
            Just(0.66),
            Just(1.0),
            0.0f64..=1.0,
        ]
    }

    pub fn arb_endpoint_category() -> impl Strategy<Value = EndpointCategory> {
        prop::sample::select(EndpointCategory::ALL.to_vec())
    }

    pub fn arb_data_type() -> impl Strategy<Value = DataType> {
        prop::sample::select(DataType::ALL.to_vec())
    }

    pub fn arb_region() -> impl Strategy<Value = Region> {
        prop_oneof![
            Just(Region::Global),
            prop::sample::select(vec!["us", "uk", "de", "fr", "ca"])
                .prop_map(|code| Region::parse(Some(code))),
        ]
    }

    /// A bare lowercase hostname such as `abc-12.example.com`.
    pub fn arb_domain() -> impl Strategy<Value = String> {
        (
            "[a-z][a-z0-9-]{0,10}[a-z0-9]".prop_filter("www is stripped", |l| l != "www"),
            prop::sample::select(vec!["com", "org", "net", "io"]),
        )
            .prop_map(|(label, tld)| format!("{}.{}", label, tld))
    }

    pub fn arb_referring_domain() -> impl Strategy<Value = ReferringDomain> {
        (arb_domain(), prop::option::of(0i64..=100), 0i64..10_000).prop_map(
            |(domain, domain_authority, backlinks)| ReferringDomain {
                domain,
                domain_authority,
                backlinks,
                ip: "192.0.2.1".to_string(),
                country: "us".to_string(),
                first_seen: 1_600_000_000,
                last_seen: 1_700_000_000,
            },
        )
    }

    /// Raw caller pagination input, including out-of-range values.
    pub fn arb_pagination_input() -> impl Strategy<Value = (Option<i64>, Option<i64>)> {
        (
            prop::option::of(-10i64..500),
            prop::option::of(-10i64..10_000),
        )
    }

    pub fn arb_pagination() -> impl Strategy<Value = Pagination> {
        arb_pagination_input().prop_map(|(limit, offset)| {
            Pagination::new(limit, offset, rankgrid_core::DEFAULT_PAGE_LIMIT)
        })
    }

    /// Generate a Timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(chrono::Utc::now)
        })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for rankgrid error variants.

    use super::*;
    use rankgrid_core::{ProviderError, QuotaDenial};

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &RankgridResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert a quota error and return its denial reason.
    #[track_caller]
    pub fn assert_quota_exceeded<T: std::fmt::Debug>(result: &RankgridResult<T>) -> QuotaDenial {
        match result {
            Err(RankgridError::Quota(q)) => q.reason().clone(),
            other => panic!("Expected Quota error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &RankgridResult<T>) {
        match result {
            Err(RankgridError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_rate_limited<T: std::fmt::Debug>(result: &RankgridResult<T>, secs: u64) {
        match result {
            Err(RankgridError::Provider(ProviderError::RateLimited {
                retry_after_secs, ..
            })) => assert_eq!(*retry_after_secs, secs),
            other => panic!("Expected RateLimited error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_malformed<T: std::fmt::Debug>(result: &RankgridResult<T>) {
        match result {
            Err(RankgridError::Provider(ProviderError::MalformedResponse { .. })) => {}
            other => panic!("Expected MalformedResponse error, got: {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_scripted_routes_before_queue() {
        let transport = ScriptedTransport::new();
        transport
            .route_report(ReportType::PhraseThis, "widgets", HttpResponse::ok("routed"))
            .push(HttpResponse::ok("queued"));

        let routed = vec![
            ("type".to_string(), "phrase_this".to_string()),
            ("phrase".to_string(), "widgets".to_string()),
        ];
        let other = vec![("type".to_string(), "domain_rank".to_string())];

        assert_eq!(transport.get("u", &routed).await.unwrap().body, "routed");
        assert_eq!(transport.get("u", &routed).await.unwrap().body, "routed");
        assert_eq!(transport.get("u", &other).await.unwrap().body, "queued");
        assert_eq!(transport.get("u", &other).await.unwrap().status, 500);
        assert_eq!(transport.request_count(), 4);
        assert_eq!(transport.count_for(ReportType::PhraseThis), 2);
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = FailingStore::failing_on(&["api_usage_logs"]);
        assert!(store.insert("api_usage_logs", Row::new()).await.is_err());
        assert!(store.insert("users", Row::new()).await.is_ok());
        store.heal_table("api_usage_logs");
        assert!(store.insert("api_usage_logs", Row::new()).await.is_ok());
        assert_eq!(store.inner().row_count("api_usage_logs"), 1);
    }

    #[test]
    fn test_refdomains_csv_blank_authority() {
        let csv = fixtures::refdomains_csv(&[("a.com", Some(80)), ("b.com", None)]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("80;a.com;"));
        assert!(lines[2].starts_with(";b.com;"));
    }

    proptest! {
        #[test]
        fn prop_generated_domains_are_bare_hosts(domain in generators::arb_domain()) {
            prop_assert_eq!(rankgrid_core::hostname_from_url(&domain), domain);
        }
    }
}
