use agri_normalize::{
    cache::{DataCache, Filters},
    confidence::{Assessed, ConfidenceContext, calculate_confidence},
    data::RawRecord,
    quality::QualityReport,
};
use proptest::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

struct Scored {
    rows: usize,
    report: Option<QualityReport>,
}

impl Assessed for Scored {
    fn row_count(&self) -> usize {
        self.rows
    }

    fn quality_report(&self) -> Option<&QualityReport> {
        self.report.as_ref()
    }
}

fn scored(rows: usize, overall: Option<f64>) -> Scored {
    Scored {
        rows,
        report: overall.map(|overall_score| QualityReport {
            overall_score,
            ..QualityReport::no_data()
        }),
    }
}

fn record(pairs: &[(String, String)]) -> RawRecord {
    pairs
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect()
}

proptest! {
    #[test]
    fn cached_records_come_back_unchanged(
        resource in "[a-z0-9-]{1,36}",
        filter_pairs in prop::collection::vec(("[a-z_]{1,12}", "[A-Za-z ]{0,12}"), 0..4),
        rows in prop::collection::vec(
            prop::collection::vec(("[a-z_]{1,10}", "[A-Za-z0-9 ]{0,10}"), 1..5),
            0..6,
        ),
    ) {
        let dir = tempdir().unwrap();
        let cache = DataCache::with_ttl_hours(dir.path(), 24).unwrap();
        let filters: Filters = filter_pairs.into_iter().collect();
        let records: Vec<RawRecord> = rows.iter().map(|pairs| record(pairs)).collect();

        cache.set(&resource, &filters, &records).unwrap();
        prop_assert_eq!(cache.get(&resource, &filters), Some(records));
        prop_assert_eq!(cache.stats().unwrap().file_count, 1);
    }

    #[test]
    fn cache_key_ignores_filter_insertion_order(
        resource in "[a-z0-9-]{1,36}",
        pairs in prop::collection::btree_map("[a-z_]{1,12}", "[A-Za-z0-9]{0,8}", 0..6),
    ) {
        let forward: Filters = pairs.clone().into_iter().collect();
        let backward: Filters = pairs.into_iter().rev().collect();
        let key = DataCache::key(&resource, &forward);
        prop_assert_eq!(&key, &DataCache::key(&resource, &backward));
        prop_assert_eq!(key.len(), 64);
        prop_assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn confidence_stays_in_unit_interval(
        tables in prop::collection::vec(
            (0usize..500, prop::option::of(0.0f64..=1.0)),
            0..5,
        ),
        year_end in prop::option::of(1950i32..2030),
    ) {
        let owned: Vec<Scored> = tables
            .into_iter()
            .map(|(rows, overall)| scored(rows, overall))
            .collect();
        let refs: Vec<&dyn Assessed> = owned.iter().map(|table| table as &dyn Assessed).collect();
        let context = ConfidenceContext { year_end, reference_year: 2026 };
        let confidence = calculate_confidence(&refs, &context);

        prop_assert!((0.0..=1.0).contains(&confidence));
        let total: usize = owned.iter().map(|table| table.rows).sum();
        if total == 0 {
            prop_assert_eq!(confidence, 0.0);
        } else {
            prop_assert!(confidence >= 0.3);
        }
    }
}
