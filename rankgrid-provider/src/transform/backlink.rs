use super::min_columns;
use crate::csv::CsvTable;
use crate::report::ReportType;
use rankgrid_core::{
    hostname_from_url, BacklinkOverview, BacklinkRecord, CompetitionLevel, CompetitorOverlap,
    ProviderError, ReferringDomain,
};

/// `backlinks_overview` → [`BacklinkOverview`]. The provider does not echo the
/// target, so the queried domain is passed in.
pub fn backlink_overview(raw: &str, domain: &str) -> Result<BacklinkOverview, ProviderError> {
    let table = CsvTable::parse(ReportType::BacklinksOverview, raw)?;
    let row = table.first_named();
    Ok(BacklinkOverview {
        domain: domain.to_string(),
        authority_score: row.integer("ascore")?,
        total_backlinks: row.integer("total")?,
        referring_domains: row.integer("domains_num")?,
        referring_urls: row.integer("urls_num")?,
        referring_ips: row.integer("ips_num")?,
        follow_links: row.integer("follows_num")?,
        nofollow_links: row.integer("nofollows_num")?,
    })
}

pub fn backlinks(raw: &str) -> Result<Vec<BacklinkRecord>, ProviderError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let report = ReportType::Backlinks;
    let table = CsvTable::parse(report, raw)?;

    table
        .valid_rows(min_columns(report))
        .map(|row| {
            let source_url = row.text("source_url")?;
            Ok(BacklinkRecord {
                source_domain: hostname_from_url(&source_url),
                source_url,
                source_title: row.text("source_title")?,
                target_url: row.text("target_url")?,
                anchor: row.text("anchor")?,
                page_authority: row.integer("page_ascore")?,
                nofollow: row.flag("nofollow")?,
                first_seen: row.integer("first_seen")?,
                last_seen: row.integer("last_seen")?,
            })
        })
        .collect()
}

/// `backlinks_refdomains` → referring domains. A blank authority cell is kept
/// as `None` rather than read as zero.
pub fn referring_domains(raw: &str) -> Result<Vec<ReferringDomain>, ProviderError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let report = ReportType::BacklinksRefdomains;
    let table = CsvTable::parse(report, raw)?;

    table
        .valid_rows(min_columns(report))
        .map(|row| {
            Ok(ReferringDomain {
                domain: row.text("domain")?,
                domain_authority: row.optional_integer("domain_ascore")?,
                backlinks: row.integer("backlinks_num")?,
                ip: row.text("ip")?,
                country: row.text("country")?,
                first_seen: row.integer("first_seen")?,
                last_seen: row.integer("last_seen")?,
            })
        })
        .collect()
}

/// `backlinks_competitors` → competitor overlap rows. Similarity is a 0-100
/// score; its level is bucketed on the `[0, 1]` scale.
pub fn competitor_overlap(raw: &str) -> Result<Vec<CompetitorOverlap>, ProviderError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let report = ReportType::BacklinksCompetitors;
    let table = CsvTable::parse(report, raw)?;

    table
        .valid_rows(min_columns(report))
        .map(|row| {
            let similarity = row.decimal("similarity")?;
            Ok(CompetitorOverlap {
                domain: row.text("neighbour")?,
                authority_score: row.integer("ascore")?,
                similarity,
                common_referring_domains: row.integer("common_refdomains")?,
                referring_domains: row.integer("domains_num")?,
                backlinks: row.integer("backlinks_num")?,
                competition_level: CompetitionLevel::from_competition(similarity / 100.0),
            })
        })
        .collect()
}
