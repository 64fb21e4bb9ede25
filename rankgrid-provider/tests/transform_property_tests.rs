//! Property tests for the response transformers.

use proptest::prelude::*;
use rankgrid_core::{CompetitionLevel, Region};
use rankgrid_provider::transform::{competitor_overlap, global_keyword_metrics, keyword_metrics};

fn bucket(c: f64) -> CompetitionLevel {
    CompetitionLevel::from_competition(c)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Single-row keyword parse reports exactly what the row carries.
    #[test]
    fn prop_keyword_row_roundtrips(
        volume in 0i64..10_000_000,
        cpc_cents in 0u32..10_000,
        competition_pct in 0u32..=100,
        difficulty in 0i64..=100,
    ) {
        let cpc = cpc_cents as f64 / 100.0;
        let competition = competition_pct as f64 / 100.0;
        let raw = format!(
            "Keyword;Search Volume;CPC;Competition;Keyword Difficulty Index\nkw;{};{};{};{}",
            volume, cpc, competition, difficulty
        );
        let metrics = keyword_metrics(&raw, &Region::Global).unwrap();
        prop_assert_eq!(metrics.search_volume, volume);
        prop_assert_eq!(metrics.cpc, cpc);
        prop_assert_eq!(metrics.keyword_difficulty, difficulty);
        prop_assert_eq!(metrics.competition_level, bucket(competition));
    }

    /// Global volume is the sum over valid rows; short rows never count.
    #[test]
    fn prop_global_volume_sums_valid_rows(
        rows in prop::collection::vec((0i64..100_000, any::<bool>()), 1..20),
    ) {
        let mut raw = String::from("Database;Keyword;Search Volume;CPC;Competition;Keyword Difficulty Index\n");
        let mut expected = 0;
        for (i, (volume, valid)) in rows.iter().enumerate() {
            if *valid {
                raw.push_str(&format!("db{};kw;{};1.0;0.5;10\n", i, volume));
                expected += volume;
            } else {
                raw.push_str(&format!("db{};kw;{}\n", i, volume));
            }
        }
        let metrics = global_keyword_metrics(&raw).unwrap();
        prop_assert_eq!(metrics.search_volume, expected);
        prop_assert_eq!(metrics.database, "global");
    }

    /// Similarity is bucketed on the 0-1 scale.
    #[test]
    fn prop_overlap_level_follows_similarity(similarity in 0u32..=100) {
        let raw = format!(
            "ascore;neighbour;similarity;common_refdomains;domains_num;backlinks_num\n50;rival.com;{};1;1;1",
            similarity
        );
        let rows = competitor_overlap(&raw).unwrap();
        prop_assert_eq!(rows.len(), 1);
        prop_assert_eq!(rows[0].competition_level, bucket(similarity as f64 / 100.0));
    }

    /// Arbitrary text never panics a transformer.
    #[test]
    fn prop_garbage_never_panics(raw in "[a-z0-9;\\.\\n ]{0,200}") {
        let _ = keyword_metrics(&raw, &Region::Global);
        let _ = global_keyword_metrics(&raw);
        let _ = competitor_overlap(&raw);
    }
}
