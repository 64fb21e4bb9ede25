//! Usage recorder: best-effort audit log of remote-call attempts.

use crate::ledger::counter_update;
use crate::period::BillingPeriod;
use rankgrid_core::{EndpointCategory, SharedClock, TenantId, UsageStatus};
use rankgrid_storage::{to_row, KvStore, UsageLogEntry, USAGE_LOG_TABLE};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const PROVIDER_NAME: &str = "semrush";

/// How the credits of an attempt reach the quota counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Settlement {
    /// Add the credits to the period counters when logging.
    #[default]
    Charge,
    /// Credits were already counted by a ledger reservation; log only.
    Reserved,
}

/// One remote-call attempt to be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEvent {
    pub tenant: TenantId,
    pub category: EndpointCategory,
    pub request_type: String,
    pub status: UsageStatus,
    pub credits: i64,
    pub subject: Option<String>,
    pub error_message: Option<String>,
    pub settlement: Settlement,
}

impl UsageEvent {
    pub fn new(
        tenant: TenantId,
        category: EndpointCategory,
        request_type: impl Into<String>,
        status: UsageStatus,
        credits: i64,
    ) -> Self {
        Self {
            tenant,
            category,
            request_type: request_type.into(),
            status,
            credits,
            subject: None,
            error_message: None,
            settlement: Settlement::Charge,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_settlement(mut self, settlement: Settlement) -> Self {
        self.settlement = settlement;
        self
    }
}

#[derive(Debug, Clone)]
pub struct UsageRecorder {
    store: Arc<dyn KvStore>,
    clock: SharedClock,
}

impl UsageRecorder {
    pub fn new(store: Arc<dyn KvStore>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Append a usage log entry and, for [`Settlement::Charge`], add the
    /// credits to the period counters.
    ///
    /// Never fails: store errors are logged and dropped. The log entry and
    /// the counter update are separate writes, so either may land without
    /// the other.
    pub async fn log_usage(&self, event: UsageEvent) {
        let now = self.clock.now();
        let period = BillingPeriod::containing(now);

        // Subjects that look like hostnames are domains, anything else a keyword.
        let (target_domain, target_keyword) = match event.subject.as_deref() {
            Some(s) if s.contains('.') => (Some(s.to_string()), None),
            Some(s) => (None, Some(s.to_string())),
            None => (None, None),
        };

        let entry = UsageLogEntry {
            id: Uuid::now_v7(),
            user_id: event.tenant,
            api_endpoint: event.category,
            api_provider: PROVIDER_NAME.to_string(),
            request_type: event.request_type.clone(),
            credits_consumed: event.credits,
            target_domain,
            target_keyword,
            status: event.status,
            error_message: event.error_message.clone(),
            billing_month: period.month,
            billing_year: period.year,
            created_at: now,
        };

        let inserted = match to_row(USAGE_LOG_TABLE, &entry) {
            Ok(row) => self.store.insert(USAGE_LOG_TABLE, row).await,
            Err(e) => Err(e),
        };
        if let Err(e) = inserted {
            warn!(
                tenant = %event.tenant,
                category = %event.category,
                request_type = %event.request_type,
                status = %event.status,
                error = %e,
                "failed to write usage log entry"
            );
        }

        if event.settlement == Settlement::Charge {
            let update = counter_update(event.tenant, period, event.category, event.credits);
            if let Err(e) = self.store.increment(&update).await {
                warn!(
                    tenant = %event.tenant,
                    category = %event.category,
                    credits = event.credits,
                    error = %e,
                    "failed to update quota counters"
                );
            }
        }

        debug!(
            tenant = %event.tenant,
            category = %event.category,
            request_type = %event.request_type,
            status = %event.status,
            credits = event.credits,
            "usage recorded"
        );
    }
}
