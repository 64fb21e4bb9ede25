//! Provider report catalogue: wire names, column schemas, billing category
//! and credit cost of every report rankgrid requests.

use rankgrid_core::EndpointCategory;
use std::fmt;

/// How a cell is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Decimal,
    Flag,
}

/// One exported column: its request code and the header the provider
/// answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub code: &'static str,
    pub header: &'static str,
    pub kind: ColumnKind,
}

const fn col(code: &'static str, header: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec { code, header, kind }
}

/// Whether a report answers with one row read by header name, or many rows
/// read by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    SingleRow,
    /// Rows with fewer than `min_columns` cells are skipped.
    Tabular { min_columns: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSchema {
    pub columns: &'static [ColumnSpec],
    pub layout: Layout,
}

impl ReportSchema {
    /// Comma-joined column codes for the `export_columns` parameter.
    pub fn export_columns(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.code)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn column(&self, code: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.code == code)
    }

    /// Position of a column in tabular rows.
    pub fn index_of(&self, code: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.code == code)
    }
}

use ColumnKind::{Decimal, Flag, Integer, Text};

const DOMAIN_RANK: &[ColumnSpec] = &[
    col("Dn", "Domain", Text),
    col("Rk", "Rank", Integer),
    col("Or", "Organic Keywords", Integer),
    col("Ot", "Organic Traffic", Integer),
    col("Oc", "Organic Cost", Decimal),
    col("Ad", "Adwords Keywords", Integer),
    col("At", "Adwords Traffic", Integer),
    col("Ac", "Adwords Cost", Decimal),
];

const PHRASE_THIS: &[ColumnSpec] = &[
    col("Ph", "Keyword", Text),
    col("Nq", "Search Volume", Integer),
    col("Cp", "CPC", Decimal),
    col("Co", "Competition", Decimal),
    col("Kd", "Keyword Difficulty Index", Integer),
];

const PHRASE_ALL: &[ColumnSpec] = &[
    col("Db", "Database", Text),
    col("Ph", "Keyword", Text),
    col("Nq", "Search Volume", Integer),
    col("Cp", "CPC", Decimal),
    col("Co", "Competition", Decimal),
    col("Kd", "Keyword Difficulty Index", Integer),
];

const PHRASE_RELATED: &[ColumnSpec] = &[
    col("Ph", "Keyword", Text),
    col("Nq", "Search Volume", Integer),
    col("Cp", "CPC", Decimal),
    col("Co", "Competition", Decimal),
    col("Kd", "Keyword Difficulty Index", Integer),
    col("Rr", "Related Relevance", Decimal),
];

const BACKLINKS_OVERVIEW: &[ColumnSpec] = &[
    col("ascore", "ascore", Integer),
    col("total", "total", Integer),
    col("domains_num", "domains_num", Integer),
    col("urls_num", "urls_num", Integer),
    col("ips_num", "ips_num", Integer),
    col("follows_num", "follows_num", Integer),
    col("nofollows_num", "nofollows_num", Integer),
];

const BACKLINKS: &[ColumnSpec] = &[
    col("page_ascore", "page_ascore", Integer),
    col("source_title", "source_title", Text),
    col("source_url", "source_url", Text),
    col("target_url", "target_url", Text),
    col("anchor", "anchor", Text),
    col("nofollow", "nofollow", Flag),
    col("first_seen", "first_seen", Integer),
    col("last_seen", "last_seen", Integer),
];

const BACKLINKS_REFDOMAINS: &[ColumnSpec] = &[
    col("domain_ascore", "domain_ascore", Integer),
    col("domain", "domain", Text),
    col("backlinks_num", "backlinks_num", Integer),
    col("ip", "ip", Text),
    col("country", "country", Text),
    col("first_seen", "first_seen", Integer),
    col("last_seen", "last_seen", Integer),
];

const BACKLINKS_COMPETITORS: &[ColumnSpec] = &[
    col("ascore", "ascore", Integer),
    col("neighbour", "neighbour", Text),
    col("similarity", "similarity", Decimal),
    col("common_refdomains", "common_refdomains", Integer),
    col("domains_num", "domains_num", Integer),
    col("backlinks_num", "backlinks_num", Integer),
];

const SITE_AUDIT: &[ColumnSpec] = &[
    col("domain", "domain", Text),
    col("pages_crawled", "pages_crawled", Integer),
    col("errors", "errors", Integer),
    col("warnings", "warnings", Integer),
    col("notices", "notices", Integer),
    col("health_score", "health_score", Decimal),
];

/// Reports rankgrid knows how to request and parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportType {
    DomainRank,
    PhraseThis,
    PhraseAll,
    PhraseRelated,
    BacklinksOverview,
    Backlinks,
    BacklinksRefdomains,
    BacklinksCompetitors,
    SiteAudit,
}

impl ReportType {
    pub const ALL: [ReportType; 9] = [
        Self::DomainRank,
        Self::PhraseThis,
        Self::PhraseAll,
        Self::PhraseRelated,
        Self::BacklinksOverview,
        Self::Backlinks,
        Self::BacklinksRefdomains,
        Self::BacklinksCompetitors,
        Self::SiteAudit,
    ];

    /// Value of the `type` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomainRank => "domain_rank",
            Self::PhraseThis => "phrase_this",
            Self::PhraseAll => "phrase_all",
            Self::PhraseRelated => "phrase_related",
            Self::BacklinksOverview => "backlinks_overview",
            Self::Backlinks => "backlinks",
            Self::BacklinksRefdomains => "backlinks_refdomains",
            Self::BacklinksCompetitors => "backlinks_competitors",
            Self::SiteAudit => "site_audit",
        }
    }

    /// Request type written to the usage log.
    pub fn request_type(&self) -> &'static str {
        match self {
            Self::DomainRank => "domain_overview",
            Self::PhraseThis => "keyword_overview",
            Self::PhraseAll => "keyword_research",
            Self::PhraseRelated => "related_keywords",
            Self::BacklinksOverview => "backlink_overview",
            Self::Backlinks => "backlinks",
            Self::BacklinksRefdomains => "referring_domains",
            Self::BacklinksCompetitors => "backlink_competitors",
            Self::SiteAudit => "site_audit",
        }
    }

    pub fn category(&self) -> EndpointCategory {
        match self {
            Self::PhraseThis | Self::PhraseAll | Self::PhraseRelated => {
                EndpointCategory::KeywordResearch
            }
            Self::BacklinksOverview | Self::Backlinks | Self::BacklinksRefdomains => {
                EndpointCategory::BacklinkAnalysis
            }
            Self::DomainRank | Self::BacklinksCompetitors => EndpointCategory::CompetitorAnalysis,
            Self::SiteAudit => EndpointCategory::WebsiteAudit,
        }
    }

    /// Credits charged for one successful call.
    pub fn credits(&self) -> i64 {
        match self {
            Self::DomainRank | Self::BacklinksCompetitors => 2,
            Self::SiteAudit => 5,
            _ => 1,
        }
    }

    pub fn schema(&self) -> ReportSchema {
        match self {
            Self::DomainRank => single(DOMAIN_RANK),
            Self::PhraseThis => single(PHRASE_THIS),
            Self::PhraseAll => tabular(PHRASE_ALL),
            Self::PhraseRelated => tabular(PHRASE_RELATED),
            Self::BacklinksOverview => single(BACKLINKS_OVERVIEW),
            Self::Backlinks => tabular(BACKLINKS),
            Self::BacklinksRefdomains => tabular(BACKLINKS_REFDOMAINS),
            Self::BacklinksCompetitors => tabular(BACKLINKS_COMPETITORS),
            Self::SiteAudit => single(SITE_AUDIT),
        }
    }

    /// Whether the report accepts `display_limit` / `display_offset`.
    pub fn is_paginated(&self) -> bool {
        matches!(
            self,
            Self::PhraseRelated
                | Self::Backlinks
                | Self::BacklinksRefdomains
                | Self::BacklinksCompetitors
        )
    }
}

fn single(columns: &'static [ColumnSpec]) -> ReportSchema {
    ReportSchema {
        columns,
        layout: Layout::SingleRow,
    }
}

fn tabular(columns: &'static [ColumnSpec]) -> ReportSchema {
    ReportSchema {
        columns,
        layout: Layout::Tabular {
            min_columns: columns.len(),
        },
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
