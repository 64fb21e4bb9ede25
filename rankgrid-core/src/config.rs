//! Runtime configuration.
//!
//! Loaded from `RANKGRID_*` environment variables with defaults for
//! everything except the provider API key.

use crate::{ConfigError, DataType};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.semrush.com";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// PROVIDER
// ============================================================================

/// Connection settings for the remote metrics provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    /// Default deadline for a single remote call.
    pub request_timeout: Duration,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

// ============================================================================
// RETRY
// ============================================================================

/// Retry layer settings. `max_retries == 0` disables retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
        }
    }
}

// ============================================================================
// CACHE / QUOTA MODES
// ============================================================================

/// How usage is gated against tier limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuotaMode {
    /// Atomically reserve credits before the call; refund on failure.
    #[default]
    Reserve,
    /// Read-only check before the call, charge after success.
    CheckThenCharge,
}

impl QuotaMode {
    fn parse(field: &str, value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reserve" => Ok(Self::Reserve),
            "check" | "check-then-charge" => Ok(Self::CheckThenCharge),
            _ => Err(invalid(field, value, "expected reserve or check")),
        }
    }
}

/// Layout of cached paginated metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageMode {
    /// One cache row per page.
    #[default]
    PerPageKey,
    /// One cache row holding every fetched page, merged on write.
    Merged,
}

impl PageMode {
    fn parse(field: &str, value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "per-page" | "per_page" => Ok(Self::PerPageKey),
            "merged" => Ok(Self::Merged),
            _ => Err(invalid(field, value, "expected per-page or merged")),
        }
    }
}

// ============================================================================
// TTL POLICY
// ============================================================================

/// Time-to-live per cached data type, in hours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    hours: HashMap<DataType, u32>,
}

impl TtlPolicy {
    pub fn hours(&self, data_type: DataType) -> u32 {
        self.hours
            .get(&data_type)
            .copied()
            .unwrap_or_else(|| Self::default_hours(data_type))
    }

    pub fn with_hours(mut self, data_type: DataType, hours: u32) -> Self {
        self.hours.insert(data_type, hours);
        self
    }

    fn default_hours(data_type: DataType) -> u32 {
        match data_type {
            DataType::Keyword | DataType::RelatedKeywords => 36,
            DataType::DomainOverview | DataType::BacklinkOverview | DataType::SiteAudit => 24,
            DataType::CompetitorOverlap => 6,
            DataType::Backlinks | DataType::ReferringDomains => 12,
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            hours: DataType::ALL
                .iter()
                .map(|dt| (*dt, Self::default_hours(*dt)))
                .collect(),
        }
    }
}

// ============================================================================
// TOP-LEVEL CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankgridConfig {
    pub provider: ProviderConfig,
    pub retry: RetryConfig,
    pub quota_mode: QuotaMode,
    pub page_mode: PageMode,
    pub ttl: TtlPolicy,
}

impl RankgridConfig {
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            retry: RetryConfig::default(),
            quota_mode: QuotaMode::default(),
            page_mode: PageMode::default(),
            ttl: TtlPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_quota_mode(mut self, mode: QuotaMode) -> Self {
        self.quota_mode = mode;
        self
    }

    pub fn with_page_mode(mut self, mode: PageMode) -> Self {
        self.page_mode = mode;
        self
    }

    pub fn with_ttl(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }

    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - `RANKGRID_API_KEY`: provider API key (required)
    /// - `RANKGRID_BASE_URL`: provider endpoint (default: `https://api.semrush.com`)
    /// - `RANKGRID_REQUEST_TIMEOUT_SECS`: per-call deadline (default: 30)
    /// - `RANKGRID_RETRY_MAX`: retry attempts, 0 disables (default: 0)
    /// - `RANKGRID_RETRY_INITIAL_BACKOFF_MS`: first backoff (default: 500)
    /// - `RANKGRID_RETRY_MAX_BACKOFF_MS`: backoff cap (default: 60000)
    /// - `RANKGRID_QUOTA_MODE`: `reserve` or `check` (default: reserve)
    /// - `RANKGRID_CACHE_PAGE_MODE`: `per-page` or `merged` (default: per-page)
    /// - `RANKGRID_TTL_<DATA_TYPE>_HOURS`: e.g. `RANKGRID_TTL_KEYWORD_HOURS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RankgridConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("RANKGRID_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "RANKGRID_API_KEY".to_string(),
            })?;

        let mut provider = ProviderConfig::new(api_key);
        if let Some(base_url) = lookup("RANKGRID_BASE_URL").filter(|u| !u.trim().is_empty()) {
            provider.base_url = base_url.trim().trim_end_matches('/').to_string();
        }
        if let Some(secs) = parse_number::<u64>(&lookup, "RANKGRID_REQUEST_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(invalid(
                    "RANKGRID_REQUEST_TIMEOUT_SECS",
                    "0",
                    "timeout must be positive",
                ));
            }
            provider.request_timeout = Duration::from_secs(secs);
        }

        let mut retry = RetryConfig::default();
        if let Some(max) = parse_number::<u32>(&lookup, "RANKGRID_RETRY_MAX")? {
            retry.max_retries = max;
        }
        if let Some(ms) = parse_number::<u64>(&lookup, "RANKGRID_RETRY_INITIAL_BACKOFF_MS")? {
            retry.initial_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_number::<u64>(&lookup, "RANKGRID_RETRY_MAX_BACKOFF_MS")? {
            retry.max_backoff = Duration::from_millis(ms);
        }

        let quota_mode = match lookup("RANKGRID_QUOTA_MODE") {
            Some(v) => QuotaMode::parse("RANKGRID_QUOTA_MODE", &v)?,
            None => QuotaMode::default(),
        };
        let page_mode = match lookup("RANKGRID_CACHE_PAGE_MODE") {
            Some(v) => PageMode::parse("RANKGRID_CACHE_PAGE_MODE", &v)?,
            None => PageMode::default(),
        };

        let mut ttl = TtlPolicy::default();
        for data_type in DataType::ALL {
            let key = format!(
                "RANKGRID_TTL_{}_HOURS",
                data_type.as_db_str().to_ascii_uppercase()
            );
            if let Some(hours) = parse_number::<u32>(&lookup, &key)? {
                ttl = ttl.with_hours(data_type, hours);
            }
        }

        Ok(Self {
            provider,
            retry,
            quota_mode,
            page_mode,
            ttl,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    field: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(field) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(field, &raw, "expected a non-negative integer")),
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_only_api_key() {
        let config = RankgridConfig::from_lookup(lookup_from(&[("RANKGRID_API_KEY", "k")])).unwrap();
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.provider.request_timeout, Duration::from_secs(30));
        assert!(!config.retry.is_enabled());
        assert_eq!(config.quota_mode, QuotaMode::Reserve);
        assert_eq!(config.page_mode, PageMode::PerPageKey);
        assert_eq!(config.ttl.hours(DataType::Keyword), 36);
        assert_eq!(config.ttl.hours(DataType::CompetitorOverlap), 6);
        assert_eq!(config.ttl.hours(DataType::ReferringDomains), 12);
        assert_eq!(config.ttl.hours(DataType::BacklinkOverview), 24);
    }

    #[test]
    fn test_missing_api_key() {
        let err = RankgridConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingRequired {
                field: "RANKGRID_API_KEY".to_string()
            }
        );
        assert!(RankgridConfig::from_lookup(lookup_from(&[("RANKGRID_API_KEY", "  ")])).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = RankgridConfig::from_lookup(lookup_from(&[
            ("RANKGRID_API_KEY", "k"),
            ("RANKGRID_BASE_URL", "http://localhost:9000/"),
            ("RANKGRID_REQUEST_TIMEOUT_SECS", "5"),
            ("RANKGRID_RETRY_MAX", "3"),
            ("RANKGRID_RETRY_INITIAL_BACKOFF_MS", "100"),
            ("RANKGRID_QUOTA_MODE", "check"),
            ("RANKGRID_CACHE_PAGE_MODE", "merged"),
            ("RANKGRID_TTL_COMPETITOR_OVERLAP_HOURS", "2"),
        ]))
        .unwrap();
        assert_eq!(config.provider.base_url, "http://localhost:9000");
        assert_eq!(config.provider.request_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_backoff, Duration::from_millis(100));
        assert_eq!(config.quota_mode, QuotaMode::CheckThenCharge);
        assert_eq!(config.page_mode, PageMode::Merged);
        assert_eq!(config.ttl.hours(DataType::CompetitorOverlap), 2);
    }

    #[test]
    fn test_invalid_values() {
        let err = RankgridConfig::from_lookup(lookup_from(&[
            ("RANKGRID_API_KEY", "k"),
            ("RANKGRID_QUOTA_MODE", "lenient"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "RANKGRID_QUOTA_MODE"));

        let err = RankgridConfig::from_lookup(lookup_from(&[
            ("RANKGRID_API_KEY", "k"),
            ("RANKGRID_RETRY_MAX", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "RANKGRID_RETRY_MAX"));

        assert!(RankgridConfig::from_lookup(lookup_from(&[
            ("RANKGRID_API_KEY", "k"),
            ("RANKGRID_REQUEST_TIMEOUT_SECS", "0"),
        ]))
        .is_err());
    }

    #[test]
    fn test_provider_debug_redacts_key() {
        let provider = ProviderConfig::new("super-secret");
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
