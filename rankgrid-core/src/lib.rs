//! rankgrid Core - Domain Types
//!
//! Pure data structures shared by every other rankgrid crate: metric records
//! produced by the response transformers, the error taxonomy, configuration,
//! pagination and the injectable clock. No I/O lives here.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod clock;
pub mod config;
pub mod domain;
pub mod enums;
pub mod error;
pub mod pagination;
pub mod records;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{
    PageMode, ProviderConfig, QuotaMode, RankgridConfig, RetryConfig, TtlPolicy,
    DEFAULT_BASE_URL,
};
pub use domain::{hostname_from_url, normalize_domain, normalize_subject};
pub use enums::{
    CompetitionLevel, DataType, EndpointCategory, ProspectSource, ProspectStatus, ProspectValue,
    Region, UsageStatus,
};
pub use error::{
    ConfigError, ErrorClass, ProviderError, QuotaDenial, QuotaError, RankgridError,
    RankgridResult, StorageError, ValidationError,
};
pub use pagination::{Page, Pagination, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use records::{
    BacklinkOverview, BacklinkRecord, CompetitorOverlap, DomainOverview, KeywordMetrics,
    Prospect, ReferringDomain, RelatedKeyword, SiteAudit,
};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Identifier of the billing/usage principal whose quota is tracked.
pub type TenantId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;
