//! Metric records produced by the response transformers.
//!
//! These are request-scoped values. They are only ever persisted embedded in
//! a cache payload, so every record serializes with camelCase field names.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CompetitionLevel, ProspectSource, ProspectStatus, ProspectValue};

/// Organic overview of a single domain (`domain_rank`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainOverview {
    pub domain: String,
    pub organic_keywords: i64,
    pub organic_traffic: i64,
    pub organic_cost: f64,
    /// Provider rank, reported as the authority score.
    pub authority_score: i64,
    /// Not returned by this report; always 0.
    pub backlinks: i64,
}

/// Metrics for a keyword in one region, or aggregated over all regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordMetrics {
    pub keyword: String,
    pub search_volume: i64,
    pub keyword_difficulty: i64,
    pub cpc: f64,
    pub competition: f64,
    pub competition_level: CompetitionLevel,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedKeyword {
    pub keyword: String,
    pub search_volume: i64,
    pub keyword_difficulty: i64,
    pub cpc: f64,
    pub competition: f64,
    pub competition_level: CompetitionLevel,
    pub relevance: f64,
    pub database: String,
}

/// Backlink profile summary of a single domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklinkOverview {
    pub domain: String,
    pub authority_score: i64,
    pub total_backlinks: i64,
    pub referring_domains: i64,
    pub referring_urls: i64,
    pub referring_ips: i64,
    pub follow_links: i64,
    pub nofollow_links: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklinkRecord {
    pub source_url: String,
    /// Bare hostname of `source_url`, empty when the URL is malformed.
    pub source_domain: String,
    pub source_title: String,
    pub target_url: String,
    pub anchor: String,
    pub page_authority: i64,
    pub nofollow: bool,
    pub first_seen: i64,
    pub last_seen: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferringDomain {
    pub domain: String,
    pub domain_authority: Option<i64>,
    pub backlinks: i64,
    pub ip: String,
    pub country: String,
    pub first_seen: i64,
    pub last_seen: i64,
}

/// A domain whose backlink profile overlaps the subject's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorOverlap {
    pub domain: String,
    pub authority_score: i64,
    /// Similarity percentage, 0-100.
    pub similarity: f64,
    pub common_referring_domains: i64,
    pub referring_domains: i64,
    pub backlinks: i64,
    pub competition_level: CompetitionLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteAudit {
    pub domain: String,
    pub pages_crawled: i64,
    pub errors: i64,
    pub warnings: i64,
    pub notices: i64,
    pub health_score: f64,
}

/// Link-building prospect synthesized by the backlink gap analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prospect {
    pub id: Uuid,
    pub domain: String,
    pub url: String,
    pub domain_authority: i64,
    pub relevance_score: i64,
    pub value: ProspectValue,
    pub source: ProspectSource,
    pub status: ProspectStatus,
}

impl Prospect {
    /// Relevance used when the provider reports no authority for a domain.
    pub const DEFAULT_RELEVANCE: i64 = 50;

    /// Classify a gap domain.
    ///
    /// The id is a UUIDv5 of the domain, so the same domain yields the same
    /// prospect id across queries.
    pub fn from_referring_domain(referring: &ReferringDomain) -> Self {
        let authority = referring.domain_authority.unwrap_or(Self::DEFAULT_RELEVANCE);
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_DNS, referring.domain.as_bytes()),
            domain: referring.domain.clone(),
            url: format!("https://{}", referring.domain),
            domain_authority: authority,
            relevance_score: authority,
            value: ProspectValue::from_authority(authority),
            source: ProspectSource::Competitors,
            status: ProspectStatus::New,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn referring(domain: &str, authority: Option<i64>) -> ReferringDomain {
        ReferringDomain {
            domain: domain.to_string(),
            domain_authority: authority,
            backlinks: 3,
            ip: String::new(),
            country: "us".to_string(),
            first_seen: 0,
            last_seen: 0,
        }
    }

    #[test]
    fn test_prospect_from_referring_domain() {
        let prospect = Prospect::from_referring_domain(&referring("news.example", Some(82)));
        assert_eq!(prospect.domain, "news.example");
        assert_eq!(prospect.url, "https://news.example");
        assert_eq!(prospect.domain_authority, 82);
        assert_eq!(prospect.relevance_score, 82);
        assert_eq!(prospect.value, ProspectValue::High);
        assert_eq!(prospect.source, ProspectSource::Competitors);
        assert_eq!(prospect.status, ProspectStatus::New);
    }

    #[test]
    fn test_prospect_relevance_fallback() {
        let prospect = Prospect::from_referring_domain(&referring("blog.example", None));
        assert_eq!(prospect.relevance_score, Prospect::DEFAULT_RELEVANCE);
        assert_eq!(prospect.value, ProspectValue::Low);
    }

    #[test]
    fn test_prospect_id_is_stable() {
        let a = Prospect::from_referring_domain(&referring("a.example", Some(10)));
        let b = Prospect::from_referring_domain(&referring("a.example", Some(90)));
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_keyword_metrics_serializes_camel_case() {
        let metrics = KeywordMetrics {
            keyword: "widgets".to_string(),
            search_volume: 1000,
            keyword_difficulty: 40,
            cpc: 2.5,
            competition: 0.5,
            competition_level: CompetitionLevel::Medium,
            database: "us".to_string(),
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["searchVolume"], 1000);
        assert_eq!(json["competitionLevel"], "medium");
        assert_eq!(json["keywordDifficulty"], 40);
    }
}
