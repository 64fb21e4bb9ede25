use crate::csv::CsvTable;
use crate::report::ReportType;
use rankgrid_core::{DomainOverview, ProviderError};

/// `domain_rank` → [`DomainOverview`]. The provider rank is reported as the
/// authority score; this report carries no backlink count.
pub fn domain_overview(raw: &str) -> Result<DomainOverview, ProviderError> {
    let table = CsvTable::parse(ReportType::DomainRank, raw)?;
    let row = table.first_named();
    Ok(DomainOverview {
        domain: row.text("Dn")?,
        organic_keywords: row.integer("Or")?,
        organic_traffic: row.integer("Ot")?,
        organic_cost: row.decimal("Oc")?,
        authority_score: row.integer("Rk")?,
        backlinks: 0,
    })
}
