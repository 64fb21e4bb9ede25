//! Property-Based Tests for the quota ledger and usage recorder.
//!
//! - A denial at `used + credits > limit` is idempotent: repeating the check
//!   never changes counters and keeps denying.
//! - Reservations never push a counter above its limit, and a release hands
//!   the credits back.
//! - Recorder failures never surface to the caller.

use proptest::prelude::*;
use rankgrid_billing::{QuotaLedger, UsageEvent, UsageRecorder};
use rankgrid_core::{EndpointCategory, QuotaDenial, UsageStatus};
use rankgrid_storage::{
    CounterUpdate, InMemoryStore, KvStore, QUOTA_USAGE_TABLE, USAGE_LOG_TABLE,
};
use rankgrid_test_utils::assertions::assert_quota_exceeded;
use rankgrid_test_utils::fixtures::{self, fixed_now, seed_tenant, uniform_tier, used_credits};
use rankgrid_test_utils::generators::arb_endpoint_category;
use rankgrid_test_utils::FailingStore;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime should build")
}

async fn charge(
    store: &dyn KvStore,
    ledger: &QuotaLedger,
    tenant: uuid::Uuid,
    category: EndpointCategory,
    credits: i64,
) {
    let period = ledger.current_period();
    let update = CounterUpdate::new(QUOTA_USAGE_TABLE, period.quota_key(tenant))
        .add(rankgrid_storage::used_column(category), credits)
        .add(rankgrid_storage::TOTAL_USED_COLUMN, credits);
    store.increment(&update).await.unwrap();
}

#[tokio::test]
async fn test_full_quota_denies_one_more_credit() {
    let store = Arc::new(InMemoryStore::new());
    let ledger = QuotaLedger::new(store.clone(), fixtures::manual_clock());
    let tenant = seed_tenant(store.as_ref(), &uniform_tier("basic", 100)).await;

    charge(store.as_ref(), &ledger, tenant, EndpointCategory::KeywordResearch, 100).await;

    let result = ledger
        .check_quota(tenant, EndpointCategory::KeywordResearch, 1)
        .await;
    assert_eq!(
        assert_quota_exceeded(&result),
        QuotaDenial::EndpointLimit { used: 100, limit: 100 }
    );
    // Other categories are unaffected.
    assert!(ledger
        .check_quota(tenant, EndpointCategory::BacklinkAnalysis, 1)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_recorder_swallows_store_failures() {
    let store = Arc::new(FailingStore::failing_on(&[USAGE_LOG_TABLE, QUOTA_USAGE_TABLE]));
    let recorder = UsageRecorder::new(store.clone(), fixtures::manual_clock());
    let tenant = uuid::Uuid::now_v7();

    recorder
        .log_usage(UsageEvent::new(
            tenant,
            EndpointCategory::WebsiteAudit,
            "site_audit",
            UsageStatus::Success,
            5,
        ))
        .await;

    assert_eq!(store.inner().row_count(USAGE_LOG_TABLE), 0);
    assert_eq!(store.inner().row_count(QUOTA_USAGE_TABLE), 0);
}

#[tokio::test]
async fn test_ledger_lookup_failure_is_a_denial() {
    let store = Arc::new(FailingStore::new());
    let ledger = QuotaLedger::new(store.clone(), fixtures::manual_clock());
    let tenant = seed_tenant(store.as_ref(), &uniform_tier("basic", 10)).await;
    store.fail_table(QUOTA_USAGE_TABLE);

    let result = ledger
        .check_quota(tenant, EndpointCategory::KeywordResearch, 1)
        .await;
    assert!(matches!(
        assert_quota_exceeded(&result),
        QuotaDenial::LookupFailed { .. }
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_denial_is_idempotent(
        category in arb_endpoint_category(),
        limit in 1i64..200,
        extra in 1i64..20,
        repeats in 1usize..5,
    ) {
        runtime().block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let ledger = QuotaLedger::new(store.clone(), fixtures::manual_clock());
            let tenant = seed_tenant(store.as_ref(), &uniform_tier("t", limit)).await;
            charge(store.as_ref(), &ledger, tenant, category, limit).await;

            for _ in 0..repeats {
                let result = ledger.check_quota(tenant, category, extra).await;
                let denial = assert_quota_exceeded(&result);
                prop_assert_eq!(denial, QuotaDenial::EndpointLimit { used: limit, limit });
                let reserved = ledger.reserve(tenant, category, extra).await;
                prop_assert!(reserved.is_err());
            }
            prop_assert_eq!(used_credits(store.as_ref(), tenant, fixed_now(), category).await, limit);
            Ok(())
        })?;
    }

    #[test]
    fn prop_reservations_stay_within_limit(
        limit in 1i64..50,
        requests in prop::collection::vec(1i64..10, 1..30),
    ) {
        runtime().block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let ledger = QuotaLedger::new(store.clone(), fixtures::manual_clock());
            let category = EndpointCategory::BacklinkAnalysis;
            let tenant = seed_tenant(store.as_ref(), &uniform_tier("t", limit)).await;

            let mut expected = 0;
            for credits in requests {
                match ledger.reserve(tenant, category, credits).await {
                    Ok(_) => expected += credits,
                    Err(_) => {
                        prop_assert!(expected + credits > limit);
                    }
                }
            }
            let used = used_credits(store.as_ref(), tenant, fixed_now(), category).await;
            prop_assert_eq!(used, expected);
            prop_assert!(used <= limit);
            Ok(())
        })?;
    }

    #[test]
    fn prop_release_refunds_reservation(credits in 1i64..10) {
        runtime().block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let ledger = QuotaLedger::new(store.clone(), fixtures::manual_clock());
            let category = EndpointCategory::KeywordResearch;
            let tenant = seed_tenant(store.as_ref(), &uniform_tier("t", 10)).await;

            let reservation = ledger.reserve(tenant, category, credits).await.unwrap();
            prop_assert_eq!(used_credits(store.as_ref(), tenant, fixed_now(), category).await, credits);
            ledger.release(&reservation).await;
            prop_assert_eq!(used_credits(store.as_ref(), tenant, fixed_now(), category).await, 0);
            Ok(())
        })?;
    }
}
