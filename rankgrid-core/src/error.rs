//! Error types for rankgrid operations

use crate::EndpointCategory;
use std::time::Duration;
use thiserror::Error;

/// Remote provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Request for {report} failed (status {status:?}): {message}")]
    Remote {
        report: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Rate limited on {report}, retry after {retry_after_secs}s")]
    RateLimited { report: String, retry_after_secs: u64 },

    #[error("Request for {report} timed out after {after:?}")]
    Timeout { report: String, after: Duration },

    #[error("Malformed {report} response: {reason}")]
    MalformedResponse { report: String, reason: String },
}

impl ProviderError {
    /// HTTP status carried by a remote failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => *status,
            Self::RateLimited { .. } => Some(429),
            Self::Timeout { .. } | Self::MalformedResponse { .. } => None,
        }
    }
}

/// Why a quota gate denied a call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuotaDenial {
    #[error("endpoint limit reached, used {used}/{limit}")]
    EndpointLimit { used: i64, limit: i64 },

    #[error("total credit limit reached, used {used}/{limit}")]
    TotalLimit { used: i64, limit: i64 },

    #[error("tenant not found")]
    UnknownTenant,

    #[error("tier limits not found for {tier}")]
    UnknownTier { tier: String },

    #[error("tier has no limit for this endpoint")]
    NoLimitForCategory,

    #[error("quota lookup failed: {reason}")]
    LookupFailed { reason: String },

    #[error("provider balance exhausted")]
    ProviderBalance,
}

/// Quota errors, raised locally by the ledger or remotely by the provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("{category} quota exceeded: {reason}")]
    Exceeded {
        category: EndpointCategory,
        reason: QuotaDenial,
    },
}

impl QuotaError {
    pub fn exceeded(category: EndpointCategory, reason: QuotaDenial) -> Self {
        Self::Exceeded { category, reason }
    }

    pub fn category(&self) -> EndpointCategory {
        match self {
            Self::Exceeded { category, .. } => *category,
        }
    }

    pub fn reason(&self) -> &QuotaDenial {
        match self {
            Self::Exceeded { reason, .. } => reason,
        }
    }
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Store backend failed on {table}: {reason}")]
    Backend { table: String, reason: String },

    #[error("Row in {table} could not be (de)serialized: {reason}")]
    Serialization { table: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all rankgrid errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RankgridError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Quota error: {0}")]
    Quota(#[from] QuotaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// What a caller should tell the end user about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Rate limited or timed out; the same request may succeed later.
    TryLater,
    /// Local tier limit or provider balance exhausted.
    Billing,
    /// The provider failed or answered with something unparseable.
    Upstream,
    /// The request itself was invalid.
    InvalidRequest,
    /// Local infrastructure failure.
    Internal,
}

impl RankgridError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Provider(ProviderError::RateLimited { .. })
            | Self::Provider(ProviderError::Timeout { .. }) => ErrorClass::TryLater,
            Self::Provider(_) => ErrorClass::Upstream,
            Self::Quota(_) => ErrorClass::Billing,
            Self::Validation(_) => ErrorClass::InvalidRequest,
            Self::Storage(_) | Self::Config(_) => ErrorClass::Internal,
        }
    }

    /// Suggested wait before retrying, for rate-limit failures.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Provider(ProviderError::RateLimited {
                retry_after_secs, ..
            }) => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::Quota(_))
    }

    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::RequiredFieldMissing {
            field: field.into(),
        }
        .into()
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
        .into()
    }
}

/// Result type alias for rankgrid operations.
pub type RankgridResult<T> = Result<T, RankgridError>;

// =============================================================================
// TESTS
// =============================================================================
