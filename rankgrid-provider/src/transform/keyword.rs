use super::{min_columns, round2};
use crate::csv::CsvTable;
use crate::report::ReportType;
use rankgrid_core::{CompetitionLevel, KeywordMetrics, ProviderError, Region, RelatedKeyword};

/// `phrase_this` → [`KeywordMetrics`] for one region.
pub fn keyword_metrics(raw: &str, region: &Region) -> Result<KeywordMetrics, ProviderError> {
    let table = CsvTable::parse(ReportType::PhraseThis, raw)?;
    let row = table.first_named();
    let competition = row.decimal("Co")?;
    Ok(KeywordMetrics {
        keyword: row.text("Ph")?,
        search_volume: row.integer("Nq")?,
        keyword_difficulty: row.integer("Kd")?,
        cpc: row.decimal("Cp")?,
        competition,
        competition_level: CompetitionLevel::from_competition(competition),
        database: region.as_str().to_string(),
    })
}

/// `phrase_all` → one [`KeywordMetrics`] aggregated over every database row.
///
/// Volume is summed. CPC and competition are averaged over valid rows and
/// rounded to 2 decimals; difficulty is averaged and rounded to an integer.
pub fn global_keyword_metrics(raw: &str) -> Result<KeywordMetrics, ProviderError> {
    let report = ReportType::PhraseAll;
    let table = CsvTable::parse(report, raw)?;

    let mut volume = 0i64;
    let mut cpc = 0.0;
    let mut competition = 0.0;
    let mut difficulty = 0.0;
    let mut valid = 0usize;

    for row in table.valid_rows(min_columns(report)) {
        volume += row.integer("Nq")?;
        cpc += row.decimal("Cp")?;
        competition += row.decimal("Co")?;
        difficulty += row.integer("Kd")? as f64;
        valid += 1;
    }

    if valid > 0 {
        let n = valid as f64;
        cpc /= n;
        competition /= n;
        difficulty /= n;
    }

    Ok(KeywordMetrics {
        keyword: table.first_cell("Ph").to_string(),
        search_volume: volume,
        keyword_difficulty: difficulty.round() as i64,
        cpc: round2(cpc),
        competition: round2(competition),
        competition_level: CompetitionLevel::from_competition(competition),
        database: Region::Global.as_str().to_string(),
    })
}

/// `phrase_related` → related keywords, in provider order.
pub fn related_keywords(raw: &str, region: &Region) -> Result<Vec<RelatedKeyword>, ProviderError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let report = ReportType::PhraseRelated;
    let table = CsvTable::parse(report, raw)?;

    table
        .valid_rows(min_columns(report))
        .map(|row| {
            let competition = row.decimal("Co")?;
            Ok(RelatedKeyword {
                keyword: row.text("Ph")?,
                search_volume: row.integer("Nq")?,
                keyword_difficulty: row.integer("Kd")?,
                cpc: row.decimal("Cp")?,
                competition,
                competition_level: CompetitionLevel::from_competition(competition),
                relevance: row.decimal("Rr")?,
                database: region.as_str().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_THIS: &str = "Keyword;Search Volume;CPC;Competition;Keyword Difficulty Index";

    #[test]
    fn test_keyword_metrics_widgets() {
        let raw = format!("{}\nwidgets;1000;2.5;0.5;40\n", HEADER_THIS);
        let region = Region::parse(Some("us"));
        let metrics = keyword_metrics(&raw, &region).unwrap();
        assert_eq!(metrics.keyword, "widgets");
        assert_eq!(metrics.search_volume, 1000);
        assert_eq!(metrics.cpc, 2.5);
        assert_eq!(metrics.competition, 0.5);
        assert_eq!(metrics.competition_level, CompetitionLevel::Medium);
        assert_eq!(metrics.keyword_difficulty, 40);
        assert_eq!(metrics.database, "us");
    }

    #[test]
    fn test_keyword_metrics_global_label() {
        let raw = format!("{}\nwidgets;10;0.1;0.9;5", HEADER_THIS);
        let metrics = keyword_metrics(&raw, &Region::Global).unwrap();
        assert_eq!(metrics.database, "global");
        assert_eq!(metrics.competition_level, CompetitionLevel::High);
    }

    #[test]
    fn test_global_keyword_aggregation() {
        let raw = "Database;Keyword;Search Volume;CPC;Competition;Keyword Difficulty Index\n\
                   us;widgets;1000;2.5;0.5;40\n\
                   uk;widgets;300;1.0;0.2;31\n\
                   de;widgets\n\
                   fr;widgets;200;1.2;0.9;50\n";
        let metrics = global_keyword_metrics(raw).unwrap();
        assert_eq!(metrics.keyword, "widgets");
        assert_eq!(metrics.search_volume, 1500);
        // (2.5 + 1.0 + 1.2) / 3 = 1.5666..
        assert_eq!(metrics.cpc, 1.57);
        // (0.5 + 0.2 + 0.9) / 3 = 0.5333..
        assert_eq!(metrics.competition, 0.53);
        assert_eq!(metrics.competition_level, CompetitionLevel::Medium);
        // (40 + 31 + 50) / 3 = 40.33..
        assert_eq!(metrics.keyword_difficulty, 40);
        assert_eq!(metrics.database, "global");
    }

    #[test]
    fn test_global_keyword_no_valid_rows() {
        let raw = "Database;Keyword;Search Volume\nus;widgets;1000";
        let metrics = global_keyword_metrics(raw).unwrap();
        assert_eq!(metrics.keyword, "widgets");
        assert_eq!(metrics.search_volume, 0);
        assert_eq!(metrics.cpc, 0.0);
        assert_eq!(metrics.competition_level, CompetitionLevel::Low);
    }

    #[test]
    fn test_related_keywords() {
        let raw = "Keyword;Search Volume;CPC;Competition;Keyword Difficulty Index;Related Relevance\n\
                   blue widgets;880;1.9;0.7;35;0.85\n\
                   short;row\n\
                   cheap widgets;320;0.4;0.2;12;0.6\n";
        let related = related_keywords(raw, &Region::parse(Some("uk"))).unwrap();
        assert_eq!(related.len(), 2);
        assert_eq!(related[0].keyword, "blue widgets");
        assert_eq!(related[0].competition_level, CompetitionLevel::High);
        assert_eq!(related[0].relevance, 0.85);
        assert_eq!(related[1].keyword_difficulty, 12);
        assert_eq!(related[1].database, "uk");
    }

    #[test]
    fn test_related_keywords_empty_body() {
        assert!(related_keywords("", &Region::Global).unwrap().is_empty());
        assert!(related_keywords("Keyword;Search Volume\n", &Region::Global).is_err());
    }
}
