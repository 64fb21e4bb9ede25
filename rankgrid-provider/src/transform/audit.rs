use crate::csv::CsvTable;
use crate::report::ReportType;
use rankgrid_core::{ProviderError, SiteAudit};

/// `site_audit` → [`SiteAudit`], a single summary row.
pub fn site_audit(raw: &str) -> Result<SiteAudit, ProviderError> {
    let table = CsvTable::parse(ReportType::SiteAudit, raw)?;
    let row = table.first_named();
    Ok(SiteAudit {
        domain: row.text("domain")?,
        pages_crawled: row.integer("pages_crawled")?,
        errors: row.integer("errors")?,
        warnings: row.integer("warnings")?,
        notices: row.integer("notices")?,
        health_score: row.decimal("health_score")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_audit() {
        let raw = "domain;pages_crawled;errors;warnings;notices;health_score\nexample.com;250;4;31;112;87.5";
        let audit = site_audit(raw).unwrap();
        assert_eq!(audit.domain, "example.com");
        assert_eq!(audit.pages_crawled, 250);
        assert_eq!(audit.errors, 4);
        assert_eq!(audit.warnings, 31);
        assert_eq!(audit.notices, 112);
        assert_eq!(audit.health_score, 87.5);
    }

    #[test]
    fn test_site_audit_missing_column() {
        let raw = "domain;pages_crawled;errors;warnings;notices\nexample.com;250;4;31;112";
        let err = site_audit(raw).unwrap_err();
        assert!(format!("{}", err).contains("health_score"));
    }
}
