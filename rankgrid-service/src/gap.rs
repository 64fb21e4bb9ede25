//! Backlink gap analysis: referring domains that link to competitors but not
//! to the target.
//!
//! Everything here is pure; the fetching lives in
//! [`AggregationService::backlink_gap`](crate::AggregationService::backlink_gap).

use rankgrid_core::{normalize_domain, Pagination, Prospect, ReferringDomain, DEFAULT_PAGE_LIMIT};
use std::collections::HashSet;

/// Split a caller's competitor list. Each entry may itself be a
/// comma-separated list.
pub fn parse_competitors<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .flat_map(|entry| entry.as_ref().split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize competitor domains, keeping first occurrences and dropping
/// blanks and the target itself.
pub fn normalize_competitors<S: AsRef<str>>(target: &str, competitors: &[S]) -> Vec<String> {
    let target = normalize_domain(target);
    let mut seen = HashSet::new();
    competitors
        .iter()
        .map(|c| normalize_domain(c.as_ref()))
        .filter(|c| !c.is_empty() && *c != target)
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// `ceil(limit / competitor_count)`, at least 1.
pub fn per_competitor_limit(limit: u32, competitor_count: usize) -> u32 {
    let count = competitor_count.max(1) as u32;
    limit.div_ceil(count).max(1)
}

/// The window fetched from each competitor: the same page index as the
/// target's window, sized by [`per_competitor_limit`].
pub fn competitor_window(pagination: Pagination, competitor_count: usize) -> Pagination {
    let per_limit = per_competitor_limit(pagination.limit(), competitor_count);
    let page_index = pagination.page_number() - 1;
    Pagination::new(
        Some(i64::from(per_limit)),
        Some(i64::from(page_index) * i64::from(per_limit)),
        DEFAULT_PAGE_LIMIT,
    )
}

/// Union the competitors' referring domains (first occurrence wins), remove
/// every domain that already links to the target, and classify the rest.
///
/// At most `limit` prospects are returned.
pub fn gap_prospects(
    target: &str,
    target_referring: &[ReferringDomain],
    competitor_referring: &[Vec<ReferringDomain>],
    limit: usize,
) -> Vec<Prospect> {
    let mut excluded: HashSet<String> = target_referring
        .iter()
        .map(|r| normalize_domain(&r.domain))
        .collect();
    excluded.insert(normalize_domain(target));

    let mut seen = HashSet::new();
    competitor_referring
        .iter()
        .flatten()
        .filter(|r| {
            let name = normalize_domain(&r.domain);
            !name.is_empty() && !excluded.contains(&name) && seen.insert(name)
        })
        .take(limit)
        .map(Prospect::from_referring_domain)
        .collect()
}
