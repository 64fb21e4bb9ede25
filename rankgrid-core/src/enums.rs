//! Enum types for rankgrid records and accounting

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// METRIC ENUMS
// ============================================================================

/// Bucketed competition level shared by every transformer that reports a
/// competition or authority score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionLevel {
    Low,
    Medium,
    High,
}

impl CompetitionLevel {
    /// Bucket a competition value in `[0, 1]`.
    ///
    /// Boundaries belong to the lower bucket: `0.66` is medium, `0.33` is low.
    pub fn from_competition(competition: f64) -> Self {
        if competition > 0.66 {
            Self::High
        } else if competition > 0.33 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for CompetitionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value class of a link-building prospect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProspectValue {
    Low,
    Medium,
    High,
}

impl ProspectValue {
    /// `high` above 70, `medium` above 50, `low` otherwise.
    pub fn from_authority(domain_authority: i64) -> Self {
        if domain_authority > 70 {
            Self::High
        } else if domain_authority > 50 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProspectSource {
    Competitors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProspectStatus {
    New,
}

// ============================================================================
// ACCOUNTING ENUMS
// ============================================================================

/// Coarse billing bucket, distinct from the literal remote report name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointCategory {
    KeywordResearch,
    WebsiteAudit,
    BacklinkAnalysis,
    CompetitorAnalysis,
    RankTracking,
}

impl EndpointCategory {
    pub const ALL: [EndpointCategory; 5] = [
        Self::KeywordResearch,
        Self::WebsiteAudit,
        Self::BacklinkAnalysis,
        Self::CompetitorAnalysis,
        Self::RankTracking,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::KeywordResearch => "keyword_research",
            Self::WebsiteAudit => "website_audit",
            Self::BacklinkAnalysis => "backlink_analysis",
            Self::CompetitorAnalysis => "competitor_analysis",
            Self::RankTracking => "rank_tracking",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s {
            "keyword_research" => Ok(Self::KeywordResearch),
            "website_audit" => Ok(Self::WebsiteAudit),
            "backlink_analysis" => Ok(Self::BacklinkAnalysis),
            "competitor_analysis" => Ok(Self::CompetitorAnalysis),
            "rank_tracking" => Ok(Self::RankTracking),
            other => Err(EnumParseError::new("endpoint category", other)),
        }
    }
}

impl fmt::Display for EndpointCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for EndpointCategory {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Outcome of a remote-call attempt as written to the usage log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    Success,
    Failed,
    RateLimited,
    QuotaExceeded,
}

impl UsageStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::RateLimited => "rate_limited",
            Self::QuotaExceeded => "quota_exceeded",
        }
    }
}

impl fmt::Display for UsageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

// ============================================================================
// CACHE ENUMS
// ============================================================================

/// Kind of payload held in a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Keyword,
    RelatedKeywords,
    DomainOverview,
    BacklinkOverview,
    Backlinks,
    ReferringDomains,
    CompetitorOverlap,
    SiteAudit,
}

impl DataType {
    pub const ALL: [DataType; 8] = [
        Self::Keyword,
        Self::RelatedKeywords,
        Self::DomainOverview,
        Self::BacklinkOverview,
        Self::Backlinks,
        Self::ReferringDomains,
        Self::CompetitorOverlap,
        Self::SiteAudit,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::RelatedKeywords => "related_keywords",
            Self::DomainOverview => "domain_overview",
            Self::BacklinkOverview => "backlink_overview",
            Self::Backlinks => "backlinks",
            Self::ReferringDomains => "referring_domains",
            Self::CompetitorOverlap => "competitor_overlap",
            Self::SiteAudit => "site_audit",
        }
    }

    /// Whether the metric is fetched in `(limit, offset)` pages.
    pub fn is_paginated(&self) -> bool {
        matches!(
            self,
            Self::RelatedKeywords
                | Self::Backlinks
                | Self::ReferringDomains
                | Self::CompetitorOverlap
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Market segmentation of keyword/domain data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Region {
    /// All databases; the `database` parameter is omitted.
    #[default]
    Global,
    /// A single provider database code such as `us` or `uk`.
    Database(String),
}

impl Region {
    /// Parse an optional region code. Empty and `global` map to [`Region::Global`].
    pub fn parse(code: Option<&str>) -> Self {
        match code.map(|c| c.trim().to_ascii_lowercase()) {
            None => Self::Global,
            Some(c) if c.is_empty() || c == "global" => Self::Global,
            Some(c) => Self::Database(c),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Global => "global",
            Self::Database(code) => code,
        }
    }

    /// Value for the provider `database` parameter, if any.
    pub fn database_param(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Database(code) => Some(code),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Region {
    fn from(value: String) -> Self {
        Self::parse(Some(&value))
    }
}

impl From<Region> for String {
    fn from(value: Region) -> Self {
        value.as_str().to_string()
    }
}

/// Error when parsing an invalid enum string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

impl EnumParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for EnumParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_competition_level_boundaries() {
        assert_eq!(CompetitionLevel::from_competition(0.0), CompetitionLevel::Low);
        assert_eq!(CompetitionLevel::from_competition(0.33), CompetitionLevel::Low);
        assert_eq!(CompetitionLevel::from_competition(0.34), CompetitionLevel::Medium);
        assert_eq!(CompetitionLevel::from_competition(0.66), CompetitionLevel::Medium);
        assert_eq!(CompetitionLevel::from_competition(0.67), CompetitionLevel::High);
        assert_eq!(CompetitionLevel::from_competition(1.0), CompetitionLevel::High);
    }

    #[test]
    fn test_prospect_value_boundaries() {
        assert_eq!(ProspectValue::from_authority(71), ProspectValue::High);
        assert_eq!(ProspectValue::from_authority(70), ProspectValue::Medium);
        assert_eq!(ProspectValue::from_authority(51), ProspectValue::Medium);
        assert_eq!(ProspectValue::from_authority(50), ProspectValue::Low);
        assert_eq!(ProspectValue::from_authority(0), ProspectValue::Low);
    }

    #[test]
    fn test_endpoint_category_roundtrip() {
        for category in EndpointCategory::ALL {
            let parsed: EndpointCategory = category.as_db_str().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert!("billing".parse::<EndpointCategory>().is_err());
    }

    #[test]
    fn test_region_parse() {
        assert_eq!(Region::parse(None), Region::Global);
        assert_eq!(Region::parse(Some("")), Region::Global);
        assert_eq!(Region::parse(Some("GLOBAL")), Region::Global);
        assert_eq!(Region::parse(Some(" US ")), Region::Database("us".to_string()));
        assert_eq!(Region::Global.database_param(), None);
        assert_eq!(Region::parse(Some("uk")).database_param(), Some("uk"));
    }

    #[test]
    fn test_serde_shapes() {
        assert_eq!(
            serde_json::to_string(&CompetitionLevel::Medium).unwrap(),
            "\"medium\""
        );
        assert_eq!(
            serde_json::to_string(&UsageStatus::RateLimited).unwrap(),
            "\"rate_limited\""
        );
        assert_eq!(
            serde_json::to_string(&Region::parse(Some("de"))).unwrap(),
            "\"de\""
        );
        let region: Region = serde_json::from_str("\"global\"").unwrap();
        assert!(region.is_global());
    }
}
