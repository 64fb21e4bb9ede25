//! Typed rows for the tables rankgrid reads and writes.

use rankgrid_core::{EndpointCategory, TenantId, Timestamp, UsageStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const USERS_TABLE: &str = "users";
pub const TIER_LIMITS_TABLE: &str = "tier_api_limits";
pub const QUOTA_USAGE_TABLE: &str = "api_quota_usage";
pub const USAGE_LOG_TABLE: &str = "api_usage_logs";
pub const METRIC_CACHE_TABLE: &str = "metric_cache";

pub const TOTAL_USED_COLUMN: &str = "total_credits_used";
pub const TOTAL_LIMIT_COLUMN: &str = "total_credit_limit";

/// Column holding credits used for `category` in the quota table.
pub fn used_column(category: EndpointCategory) -> String {
    format!("{}_used", category.as_db_str())
}

/// Column holding the tier's credit limit for `category`.
pub fn limit_column(category: EndpointCategory) -> String {
    format!("{}_limit", category.as_db_str())
}

/// Tenant reference data: which subscription tier governs its quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantAccount {
    pub id: TenantId,
    pub subscription_tier: String,
}

/// Per-tier credit limits. Read-only to rankgrid.
///
/// A missing per-category limit denies that category; a missing total limit
/// disables the total gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimit {
    pub tier_name: String,
    #[serde(default)]
    pub keyword_research_limit: Option<i64>,
    #[serde(default)]
    pub website_audit_limit: Option<i64>,
    #[serde(default)]
    pub backlink_analysis_limit: Option<i64>,
    #[serde(default)]
    pub competitor_analysis_limit: Option<i64>,
    #[serde(default)]
    pub rank_tracking_limit: Option<i64>,
    #[serde(default)]
    pub total_credit_limit: Option<i64>,
}

impl TierLimit {
    /// Tier with no limits at all; every category is denied until set.
    pub fn named(tier_name: impl Into<String>) -> Self {
        Self {
            tier_name: tier_name.into(),
            keyword_research_limit: None,
            website_audit_limit: None,
            backlink_analysis_limit: None,
            competitor_analysis_limit: None,
            rank_tracking_limit: None,
            total_credit_limit: None,
        }
    }

    pub fn with_limit(mut self, category: EndpointCategory, limit: i64) -> Self {
        *self.slot(category) = Some(limit);
        self
    }

    pub fn with_total_limit(mut self, limit: i64) -> Self {
        self.total_credit_limit = Some(limit);
        self
    }

    pub fn limit_for(&self, category: EndpointCategory) -> Option<i64> {
        match category {
            EndpointCategory::KeywordResearch => self.keyword_research_limit,
            EndpointCategory::WebsiteAudit => self.website_audit_limit,
            EndpointCategory::BacklinkAnalysis => self.backlink_analysis_limit,
            EndpointCategory::CompetitorAnalysis => self.competitor_analysis_limit,
            EndpointCategory::RankTracking => self.rank_tracking_limit,
        }
    }

    fn slot(&mut self, category: EndpointCategory) -> &mut Option<i64> {
        match category {
            EndpointCategory::KeywordResearch => &mut self.keyword_research_limit,
            EndpointCategory::WebsiteAudit => &mut self.website_audit_limit,
            EndpointCategory::BacklinkAnalysis => &mut self.backlink_analysis_limit,
            EndpointCategory::CompetitorAnalysis => &mut self.competitor_analysis_limit,
            EndpointCategory::RankTracking => &mut self.rank_tracking_limit,
        }
    }
}

/// Credits consumed by one tenant in one billing month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPeriod {
    pub user_id: TenantId,
    pub billing_month: u32,
    pub billing_year: i32,
    #[serde(default)]
    pub keyword_research_used: i64,
    #[serde(default)]
    pub website_audit_used: i64,
    #[serde(default)]
    pub backlink_analysis_used: i64,
    #[serde(default)]
    pub competitor_analysis_used: i64,
    #[serde(default)]
    pub rank_tracking_used: i64,
    #[serde(default)]
    pub total_credits_used: i64,
}

impl QuotaPeriod {
    /// Zero baseline for a period with no recorded usage.
    pub fn empty(user_id: TenantId, billing_month: u32, billing_year: i32) -> Self {
        Self {
            user_id,
            billing_month,
            billing_year,
            ..Self::default()
        }
    }

    pub fn used_for(&self, category: EndpointCategory) -> i64 {
        match category {
            EndpointCategory::KeywordResearch => self.keyword_research_used,
            EndpointCategory::WebsiteAudit => self.website_audit_used,
            EndpointCategory::BacklinkAnalysis => self.backlink_analysis_used,
            EndpointCategory::CompetitorAnalysis => self.competitor_analysis_used,
            EndpointCategory::RankTracking => self.rank_tracking_used,
        }
    }
}

/// Append-only audit record of one remote-call attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLogEntry {
    pub id: Uuid,
    pub user_id: TenantId,
    pub api_endpoint: EndpointCategory,
    pub api_provider: String,
    pub request_type: String,
    pub credits_consumed: i64,
    pub target_domain: Option<String>,
    pub target_keyword: Option<String>,
    pub status: UsageStatus,
    pub error_message: Option<String>,
    pub billing_month: u32,
    pub billing_year: i32,
    pub created_at: Timestamp,
}

/// One cached payload. `page` and `page_limit` are `None` for non-paginated
/// metrics and for merged page payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRow {
    pub subject: String,
    pub data_type: String,
    pub database_region: String,
    pub page: Option<u32>,
    #[serde(default)]
    pub page_limit: Option<u32>,
    pub data: serde_json::Value,
    pub expires_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CacheRow {
    pub const CONFLICT_KEY: [&'static str; 5] =
        ["subject", "data_type", "database_region", "page", "page_limit"];
}
