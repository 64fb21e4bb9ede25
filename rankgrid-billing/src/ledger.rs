//! Quota ledger: per-tenant, per-period credit accounting against tier limits.
//!
//! Every failure to establish that a call is allowed is itself a denial.
//! Unknown tenants, unknown tiers, categories without a limit and store
//! errors all surface as [`QuotaError::Exceeded`].

use crate::period::BillingPeriod;
use rankgrid_core::{
    EndpointCategory, QuotaDenial, QuotaError, RankgridError, RankgridResult, SharedClock,
    TenantId,
};
use rankgrid_storage::{
    select_one, used_column, CounterLimit, CounterOutcome, CounterUpdate, Filter, KvStore,
    QuotaPeriod, TenantAccount, TierLimit, QUOTA_USAGE_TABLE, TIER_LIMITS_TABLE,
    TOTAL_USED_COLUMN, USERS_TABLE,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Credits held against a tenant's quota before a remote call.
///
/// Either the call succeeds and the reservation stands, or it is handed back
/// with [`QuotaLedger::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub tenant: TenantId,
    pub category: EndpointCategory,
    pub credits: i64,
    pub period: BillingPeriod,
}

/// Usage against one category's limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryUsage {
    pub category: EndpointCategory,
    pub used: i64,
    /// `None` when the tier has no limit for the category (always denied).
    pub limit: Option<i64>,
}

impl CategoryUsage {
    pub fn remaining(&self) -> i64 {
        self.limit.map_or(0, |limit| (limit - self.used).max(0))
    }
}

/// Snapshot of a tenant's usage in the current period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub tenant: TenantId,
    pub tier: String,
    pub period: BillingPeriod,
    pub categories: Vec<CategoryUsage>,
    pub total_used: i64,
    pub total_limit: Option<i64>,
}

impl UsageSummary {
    pub fn category(&self, category: EndpointCategory) -> Option<&CategoryUsage> {
        self.categories.iter().find(|c| c.category == category)
    }
}

#[derive(Debug, Clone)]
pub struct QuotaLedger {
    store: Arc<dyn KvStore>,
    clock: SharedClock,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn KvStore>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub fn current_period(&self) -> BillingPeriod {
        BillingPeriod::containing(self.clock.now())
    }

    /// Read-only check that `credits` more would stay within both the
    /// category limit and the tier's total limit.
    ///
    /// Does not reserve anything; a concurrent caller may pass the same check.
    pub async fn check_quota(
        &self,
        tenant: TenantId,
        category: EndpointCategory,
        credits: i64,
    ) -> RankgridResult<()> {
        let deny = |reason: QuotaDenial| -> RankgridError {
            QuotaError::exceeded(category, reason).into()
        };

        let tier = self.resolve_tier(tenant).await.map_err(&deny)?;
        let limit = tier
            .limit_for(category)
            .ok_or_else(|| deny(QuotaDenial::NoLimitForCategory))?;

        let period = self.current_period();
        let usage = self
            .load_period(tenant, period)
            .await
            .map_err(|reason| deny(QuotaDenial::LookupFailed { reason }))?;

        let used = usage.used_for(category);
        if used + credits > limit {
            info!(tenant = %tenant, category = %category, used, limit, credits, "endpoint quota exceeded");
            return Err(deny(QuotaDenial::EndpointLimit { used, limit }));
        }

        if let Some(total_limit) = tier.total_credit_limit {
            let total_used = usage.total_credits_used;
            if total_used + credits > total_limit {
                info!(tenant = %tenant, category = %category, total_used, total_limit, credits, "total quota exceeded");
                return Err(deny(QuotaDenial::TotalLimit {
                    used: total_used,
                    limit: total_limit,
                }));
            }
        }

        debug!(tenant = %tenant, category = %category, used, limit, credits, "quota check passed");
        Ok(())
    }

    /// Atomically check and charge `credits`.
    ///
    /// The category and total counters are raised in one store operation,
    /// and only when both gates pass.
    pub async fn reserve(
        &self,
        tenant: TenantId,
        category: EndpointCategory,
        credits: i64,
    ) -> RankgridResult<Reservation> {
        let deny = |reason: QuotaDenial| -> RankgridError {
            QuotaError::exceeded(category, reason).into()
        };

        let tier = self.resolve_tier(tenant).await.map_err(&deny)?;
        let limit = tier
            .limit_for(category)
            .ok_or_else(|| deny(QuotaDenial::NoLimitForCategory))?;

        let period = self.current_period();
        let used_col = used_column(category);
        let update = counter_update(tenant, period, category, credits);

        let mut limits = vec![CounterLimit::new(used_col.clone(), limit)];
        if let Some(total_limit) = tier.total_credit_limit {
            limits.push(CounterLimit::new(TOTAL_USED_COLUMN, total_limit));
        }

        let outcome = self
            .store
            .increment_within_limits(&update, &limits)
            .await
            .map_err(|e| {
                warn!(tenant = %tenant, category = %category, error = %e, "quota reservation failed");
                deny(QuotaDenial::LookupFailed {
                    reason: e.to_string(),
                })
            })?;

        match outcome {
            CounterOutcome::Applied => {
                debug!(tenant = %tenant, category = %category, credits, period = %period, "credits reserved");
                Ok(Reservation {
                    tenant,
                    category,
                    credits,
                    period,
                })
            }
            CounterOutcome::Rejected {
                column,
                current,
                limit,
            } => {
                info!(tenant = %tenant, category = %category, column = %column, current, limit, credits, "reservation rejected");
                let reason = if column == TOTAL_USED_COLUMN {
                    QuotaDenial::TotalLimit {
                        used: current,
                        limit,
                    }
                } else {
                    QuotaDenial::EndpointLimit {
                        used: current,
                        limit,
                    }
                };
                Err(deny(reason))
            }
        }
    }

    /// Hand back a reservation whose call did not succeed. Best-effort: a
    /// failed refund is logged, never raised.
    pub async fn release(&self, reservation: &Reservation) {
        let update = counter_update(
            reservation.tenant,
            reservation.period,
            reservation.category,
            reservation.credits,
        )
        .reversed();

        match self.store.increment(&update).await {
            Ok(()) => debug!(
                tenant = %reservation.tenant,
                category = %reservation.category,
                credits = reservation.credits,
                "reservation released"
            ),
            Err(e) => warn!(
                tenant = %reservation.tenant,
                category = %reservation.category,
                credits = reservation.credits,
                error = %e,
                "failed to release reservation"
            ),
        }
    }

    /// Usage and limits for `tenant` in the current period.
    pub async fn summary(&self, tenant: TenantId) -> RankgridResult<UsageSummary> {
        let account: TenantAccount = select_one(
            self.store.as_ref(),
            USERS_TABLE,
            &[Filter::eq("id", tenant.to_string())],
        )
        .await?
        .ok_or_else(|| RankgridError::invalid("tenant_id", "unknown tenant"))?;

        let tier: TierLimit = select_one(
            self.store.as_ref(),
            TIER_LIMITS_TABLE,
            &[Filter::eq("tier_name", account.subscription_tier.clone())],
        )
        .await?
        .ok_or_else(|| {
            RankgridError::invalid(
                "subscription_tier",
                format!("no limits for tier {}", account.subscription_tier),
            )
        })?;

        let period = self.current_period();
        let usage: QuotaPeriod = select_one(
            self.store.as_ref(),
            QUOTA_USAGE_TABLE,
            &period.quota_key(tenant),
        )
        .await?
        .unwrap_or_else(|| QuotaPeriod::empty(tenant, period.month, period.year));

        Ok(UsageSummary {
            tenant,
            tier: tier.tier_name.clone(),
            period,
            categories: EndpointCategory::ALL
                .iter()
                .map(|&category| CategoryUsage {
                    category,
                    used: usage.used_for(category),
                    limit: tier.limit_for(category),
                })
                .collect(),
            total_used: usage.total_credits_used,
            total_limit: tier.total_credit_limit,
        })
    }

    async fn resolve_tier(&self, tenant: TenantId) -> Result<TierLimit, QuotaDenial> {
        let account: TenantAccount = select_one(
            self.store.as_ref(),
            USERS_TABLE,
            &[Filter::eq("id", tenant.to_string())],
        )
        .await
        .map_err(|e| lookup_failed(tenant, "tenant", e))?
        .ok_or(QuotaDenial::UnknownTenant)?;

        select_one(
            self.store.as_ref(),
            TIER_LIMITS_TABLE,
            &[Filter::eq("tier_name", account.subscription_tier.clone())],
        )
        .await
        .map_err(|e| lookup_failed(tenant, "tier", e))?
        .ok_or(QuotaDenial::UnknownTier {
            tier: account.subscription_tier,
        })
    }

    /// Current-period usage, with a zero baseline when no row exists yet.
    async fn load_period(&self, tenant: TenantId, period: BillingPeriod) -> Result<QuotaPeriod, String> {
        match select_one(self.store.as_ref(), QUOTA_USAGE_TABLE, &period.quota_key(tenant)).await {
            Ok(Some(usage)) => Ok(usage),
            Ok(None) => Ok(QuotaPeriod::empty(tenant, period.month, period.year)),
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "quota usage lookup failed");
                Err(e.to_string())
            }
        }
    }
}

/// Counter update charging `credits` to `category` and the period total.
pub(crate) fn counter_update(
    tenant: TenantId,
    period: BillingPeriod,
    category: EndpointCategory,
    credits: i64,
) -> CounterUpdate {
    CounterUpdate::new(QUOTA_USAGE_TABLE, period.quota_key(tenant))
        .add(used_column(category), credits)
        .add(TOTAL_USED_COLUMN, credits)
}

fn lookup_failed(tenant: TenantId, what: &str, error: RankgridError) -> QuotaDenial {
    warn!(tenant = %tenant, lookup = what, error = %error, "quota lookup failed");
    QuotaDenial::LookupFailed {
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rankgrid_core::ManualClock;
    use rankgrid_storage::{to_row, InMemoryStore};
    use uuid::Uuid;

    struct Fixture {
        ledger: QuotaLedger,
        store: Arc<InMemoryStore>,
        clock: Arc<ManualClock>,
        tenant: TenantId,
    }

    async fn fixture(tier: TierLimit) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 15, 10, 0, 0).unwrap(),
        ));
        let tenant = Uuid::now_v7();

        let account = TenantAccount {
            id: tenant,
            subscription_tier: tier.tier_name.clone(),
        };
        store
            .insert(USERS_TABLE, to_row(USERS_TABLE, &account).unwrap())
            .await
            .unwrap();
        store
            .insert(TIER_LIMITS_TABLE, to_row(TIER_LIMITS_TABLE, &tier).unwrap())
            .await
            .unwrap();

        Fixture {
            ledger: QuotaLedger::new(store.clone(), clock.clone()),
            store,
            clock,
            tenant,
        }
    }

    async fn charge(f: &Fixture, category: EndpointCategory, credits: i64) {
        let update = counter_update(f.tenant, f.ledger.current_period(), category, credits);
        f.store.increment(&update).await.unwrap();
    }

    fn denial(err: RankgridError) -> QuotaDenial {
        match err {
            RankgridError::Quota(q) => q.reason().clone(),
            other => panic!("expected quota error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_check_allows_within_limit() {
        let f = fixture(TierLimit::named("pro").with_limit(EndpointCategory::KeywordResearch, 100)).await;
        charge(&f, EndpointCategory::KeywordResearch, 99).await;
        f.ledger
            .check_quota(f.tenant, EndpointCategory::KeywordResearch, 1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_check_denies_at_limit_and_is_idempotent() {
        let f = fixture(TierLimit::named("pro").with_limit(EndpointCategory::KeywordResearch, 100)).await;
        charge(&f, EndpointCategory::KeywordResearch, 100).await;

        for _ in 0..3 {
            let err = f
                .ledger
                .check_quota(f.tenant, EndpointCategory::KeywordResearch, 1)
                .await
                .unwrap_err();
            assert_eq!(denial(err), QuotaDenial::EndpointLimit { used: 100, limit: 100 });
        }
    }

    #[tokio::test]
    async fn test_check_denies_unknown_tenant_and_tier() {
        let f = fixture(TierLimit::named("pro").with_limit(EndpointCategory::KeywordResearch, 100)).await;
        let err = f
            .ledger
            .check_quota(Uuid::now_v7(), EndpointCategory::KeywordResearch, 1)
            .await
            .unwrap_err();
        assert_eq!(denial(err), QuotaDenial::UnknownTenant);

        let orphan = Uuid::now_v7();
        let account = TenantAccount {
            id: orphan,
            subscription_tier: "legacy".to_string(),
        };
        f.store
            .insert(USERS_TABLE, to_row(USERS_TABLE, &account).unwrap())
            .await
            .unwrap();
        let err = f
            .ledger
            .check_quota(orphan, EndpointCategory::KeywordResearch, 1)
            .await
            .unwrap_err();
        assert_eq!(
            denial(err),
            QuotaDenial::UnknownTier {
                tier: "legacy".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_check_denies_category_without_limit() {
        let f = fixture(TierLimit::named("basic").with_limit(EndpointCategory::KeywordResearch, 10)).await;
        let err = f
            .ledger
            .check_quota(f.tenant, EndpointCategory::WebsiteAudit, 1)
            .await
            .unwrap_err();
        assert_eq!(denial(err), QuotaDenial::NoLimitForCategory);
    }

    #[tokio::test]
    async fn test_total_limit_gate() {
        let tier = TierLimit::named("pro")
            .with_limit(EndpointCategory::KeywordResearch, 100)
            .with_limit(EndpointCategory::BacklinkAnalysis, 100)
            .with_total_limit(120);
        let f = fixture(tier).await;
        charge(&f, EndpointCategory::BacklinkAnalysis, 90).await;
        charge(&f, EndpointCategory::KeywordResearch, 25).await;

        let err = f
            .ledger
            .check_quota(f.tenant, EndpointCategory::KeywordResearch, 10)
            .await
            .unwrap_err();
        assert_eq!(denial(err), QuotaDenial::TotalLimit { used: 115, limit: 120 });
    }

    #[tokio::test]
    async fn test_new_period_starts_at_zero() {
        let f = fixture(TierLimit::named("pro").with_limit(EndpointCategory::KeywordResearch, 100)).await;
        charge(&f, EndpointCategory::KeywordResearch, 100).await;
        assert!(f
            .ledger
            .check_quota(f.tenant, EndpointCategory::KeywordResearch, 1)
            .await
            .is_err());

        f.clock.advance(Duration::days(20));
        f.ledger
            .check_quota(f.tenant, EndpointCategory::KeywordResearch, 1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reserve_and_release() {
        let f = fixture(TierLimit::named("pro").with_limit(EndpointCategory::CompetitorAnalysis, 5)).await;

        let first = f
            .ledger
            .reserve(f.tenant, EndpointCategory::CompetitorAnalysis, 2)
            .await
            .unwrap();
        f.ledger
            .reserve(f.tenant, EndpointCategory::CompetitorAnalysis, 2)
            .await
            .unwrap();
        let err = f
            .ledger
            .reserve(f.tenant, EndpointCategory::CompetitorAnalysis, 2)
            .await
            .unwrap_err();
        assert_eq!(denial(err), QuotaDenial::EndpointLimit { used: 4, limit: 5 });

        f.ledger.release(&first).await;
        let summary = f.ledger.summary(f.tenant).await.unwrap();
        let usage = summary.category(EndpointCategory::CompetitorAnalysis).unwrap();
        assert_eq!(usage.used, 2);
        assert_eq!(usage.remaining(), 3);
        assert_eq!(summary.total_used, 2);
    }

    #[tokio::test]
    async fn test_reserve_reports_total_gate() {
        let tier = TierLimit::named("pro")
            .with_limit(EndpointCategory::KeywordResearch, 100)
            .with_total_limit(3);
        let f = fixture(tier).await;
        f.ledger
            .reserve(f.tenant, EndpointCategory::KeywordResearch, 3)
            .await
            .unwrap();
        let err = f
            .ledger
            .reserve(f.tenant, EndpointCategory::KeywordResearch, 1)
            .await
            .unwrap_err();
        assert_eq!(denial(err), QuotaDenial::TotalLimit { used: 3, limit: 3 });
    }

    #[tokio::test]
    async fn test_summary_unknown_tenant() {
        let f = fixture(TierLimit::named("pro")).await;
        let err = f.ledger.summary(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, RankgridError::Validation(_)));
    }
}
