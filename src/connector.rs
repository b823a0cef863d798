//! Fetch → cache → normalize wiring for the two open-data resources.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use encoding_rs::UTF_8;
use log::{debug, info, warn};

use crate::{
    cache::{DataCache, Filters},
    canonical::{ProductionTable, RainfallTable, StateRainfallTable},
    data::{RawRecord, coerce_text},
    io_utils::{self, InputFormat},
    mappings::EntityTables,
    normalize::{ProductionNormalizer, RainfallNormalizer, aggregate_rainfall_to_state},
    rules::RuleSet,
};

/// District-wise, season-wise crop production statistics.
pub const PRODUCTION_RESOURCE_ID: &str = "35be999b-0208-4354-b557-f6ca9a5355de";
/// Sub-division-wise monthly rainfall.
pub const RAINFALL_RESOURCE_ID: &str = "8e0bd482-4aba-4d99-9cb9-ff124f6f1c2f";

/// Supplier of raw records. Implementations resolve pagination themselves
/// and return the full result set.
pub trait RecordSource {
    fn fetch(&self, resource_id: &str, filters: &Filters) -> Result<Vec<RawRecord>>;
}

/// Serves `<root>/<resource_id>.json` and applies `filters[field]=value`
/// equality filters locally.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resource_path(&self, resource_id: &str) -> PathBuf {
        self.root.join(format!("{resource_id}.json"))
    }
}

/// `filters[state_name]` → `state_name`; bare keys pass through.
fn filter_field(key: &str) -> &str {
    key.strip_prefix("filters[")
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(key)
}

fn matches_filters(record: &RawRecord, filters: &Filters) -> bool {
    filters
        .iter()
        .all(|(key, wanted)| coerce_text(record.get(filter_field(key))) == wanted.trim())
}

impl RecordSource for DirectorySource {
    fn fetch(&self, resource_id: &str, filters: &Filters) -> Result<Vec<RawRecord>> {
        let path = self.resource_path(resource_id);
        let records = io_utils::read_raw_records(&path, InputFormat::Json, None, UTF_8)
            .with_context(|| format!("Loading resource {resource_id}"))?;
        let total = records.len();
        let matched: Vec<RawRecord> = records
            .into_iter()
            .filter(|record| matches_filters(record, filters))
            .collect();
        debug!(
            "Resource {resource_id}: {} of {total} record(s) match {filters:?}",
            matched.len()
        );
        Ok(matched)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductionQuery {
    pub state: Option<String>,
    pub district: Option<String>,
    pub year: Option<i64>,
    pub crop: Option<String>,
    pub season: Option<String>,
}

impl ProductionQuery {
    pub fn filters(&self) -> Filters {
        let mut filters = Filters::new();
        let mut put = |field: &str, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                filters.insert(format!("filters[{field}]"), value);
            }
        };
        put("state_name", self.state.clone());
        put("district_name", self.district.clone());
        put("crop_year", self.year.map(|year| year.to_string()));
        put("crop", self.crop.clone());
        put("season", self.season.clone());
        filters
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RainfallQuery {
    pub year_start: Option<i64>,
    pub year_end: Option<i64>,
    pub subdivision: Option<String>,
}

impl RainfallQuery {
    pub fn between(year_start: Option<i64>, year_end: Option<i64>) -> Self {
        Self {
            year_start,
            year_end,
            subdivision: None,
        }
    }

    /// Source-side filters. The year window is applied after normalization.
    pub fn filters(&self) -> Filters {
        let mut filters = Filters::new();
        if let Some(subdivision) = self.subdivision.as_ref().filter(|s| !s.trim().is_empty()) {
            filters.insert("filters[subdivision]".to_string(), subdivision.clone());
        }
        filters
    }

    pub fn contains_year(&self, year: i64) -> bool {
        self.year_start.is_none_or(|start| year >= start)
            && self.year_end.is_none_or(|end| year <= end)
    }
}

pub struct Connector<S: RecordSource> {
    source: S,
    cache: Option<DataCache>,
    production: ProductionNormalizer,
    rainfall: RainfallNormalizer,
    entities: EntityTables,
}

impl<S: RecordSource> Connector<S> {
    pub fn new(
        source: S,
        cache: Option<DataCache>,
        rules: &RuleSet,
        entities: EntityTables,
    ) -> Self {
        Self {
            source,
            cache,
            production: ProductionNormalizer::new(rules, entities.clone()),
            rainfall: RainfallNormalizer::new(rules),
            entities,
        }
    }

    pub fn cache(&self) -> Option<&DataCache> {
        self.cache.as_ref()
    }

    /// Cached records when fresh, otherwise the source's records, which are
    /// then cached. A failed cache write is logged and does not fail the
    /// fetch.
    pub fn fetch_raw(&self, resource_id: &str, filters: &Filters) -> Result<Vec<RawRecord>> {
        if let Some(cached) = self
            .cache
            .as_ref()
            .and_then(|cache| cache.get(resource_id, filters))
        {
            info!("Using {} cached record(s) for {resource_id}", cached.len());
            return Ok(cached);
        }
        let records = self
            .source
            .fetch(resource_id, filters)
            .with_context(|| format!("Fetching {resource_id} with {filters:?}"))?;
        info!("Fetched {} record(s) for {resource_id}", records.len());
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.set(resource_id, filters, &records) {
                warn!("Failed to cache {resource_id}: {err:#}");
            }
        }
        Ok(records)
    }

    pub fn fetch_production(&mut self, query: &ProductionQuery) -> Result<ProductionTable> {
        let records = self.fetch_raw(PRODUCTION_RESOURCE_ID, &query.filters())?;
        Ok(self.production.normalize(&records))
    }

    pub fn fetch_rainfall(&mut self, query: &RainfallQuery) -> Result<RainfallTable> {
        let records = self.fetch_raw(RAINFALL_RESOURCE_ID, &query.filters())?;
        let table = self.rainfall.normalize(&records);
        Ok(table.filter(|row| query.contains_year(row.year)))
    }

    /// Sub-division rainfall for the window, averaged up to `state`.
    pub fn fetch_rainfall_by_state(
        &mut self,
        state: &str,
        year_start: Option<i64>,
        year_end: Option<i64>,
    ) -> Result<StateRainfallTable> {
        let subdivisions = self.fetch_rainfall(&RainfallQuery::between(year_start, year_end))?;
        let state = self.entities.states.canonical(state).to_string();
        let aggregated = aggregate_rainfall_to_state(&subdivisions, &self.entities.subdivisions);
        Ok(aggregated.filter(|row| row.state_name == state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use serde_json::{Value, json};
    use tempfile::tempdir;

    struct CountingSource {
        records: Vec<RawRecord>,
        calls: Cell<usize>,
    }

    impl RecordSource for CountingSource {
        fn fetch(&self, _resource_id: &str, filters: &Filters) -> Result<Vec<RawRecord>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self
                .records
                .iter()
                .filter(|record| matches_filters(record, filters))
                .cloned()
                .collect())
        }
    }

    fn as_records(value: Value) -> Vec<RawRecord> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item.as_object().unwrap().clone())
            .collect()
    }

    fn rainfall_records() -> Vec<RawRecord> {
        as_records(json!([
            {"subdivision": "Vidarbha", "year": 2000, "annual": 900},
            {"subdivision": "Marathwada", "year": 2000, "annual": 700},
            {"subdivision": "Vidarbha", "year": 2001, "annual": 1100},
            {"subdivision": "Kerala", "year": 2001, "annual": 3000},
            {"subdivision": "Kerala", "year": 1995, "annual": 2800}
        ]))
    }

    #[test]
    fn filter_keys_unwrap_the_api_syntax() {
        assert_eq!(filter_field("filters[state_name]"), "state_name");
        assert_eq!(filter_field("crop"), "crop");
    }

    #[test]
    fn production_query_builds_api_filters() {
        let query = ProductionQuery {
            state: Some("Punjab".into()),
            year: Some(2001),
            crop: Some("  ".into()),
            ..ProductionQuery::default()
        };
        let filters = query.filters();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters["filters[state_name]"], "Punjab");
        assert_eq!(filters["filters[crop_year]"], "2001");
    }

    #[test]
    fn second_fetch_is_served_from_cache() {
        let dir = tempdir().unwrap();
        let cache = DataCache::with_ttl_hours(dir.path(), 24).unwrap();
        let source = CountingSource {
            records: rainfall_records(),
            calls: Cell::new(0),
        };
        let connector = Connector::new(
            source,
            Some(cache),
            &RuleSet::default(),
            EntityTables::builtin(),
        );
        let filters = Filters::new();
        let first = connector.fetch_raw(RAINFALL_RESOURCE_ID, &filters).unwrap();
        let second = connector.fetch_raw(RAINFALL_RESOURCE_ID, &filters).unwrap();
        assert_eq!(first, second);
        assert_eq!(connector.source.calls.get(), 1);
    }

    #[test]
    fn without_cache_every_fetch_hits_the_source() {
        let source = CountingSource {
            records: rainfall_records(),
            calls: Cell::new(0),
        };
        let connector = Connector::new(source, None, &RuleSet::default(), EntityTables::builtin());
        connector.fetch_raw(RAINFALL_RESOURCE_ID, &Filters::new()).unwrap();
        connector.fetch_raw(RAINFALL_RESOURCE_ID, &Filters::new()).unwrap();
        assert_eq!(connector.source.calls.get(), 2);
    }

    #[test]
    fn rainfall_year_window_applies_after_normalization() {
        let source = CountingSource {
            records: rainfall_records(),
            calls: Cell::new(0),
        };
        let mut connector =
            Connector::new(source, None, &RuleSet::default(), EntityTables::builtin());
        let table = connector
            .fetch_rainfall(&RainfallQuery::between(Some(2000), Some(2000)))
            .unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.quality_report().is_some());
    }

    #[test]
    fn rainfall_by_state_averages_subdivisions() {
        let source = CountingSource {
            records: rainfall_records(),
            calls: Cell::new(0),
        };
        let mut connector =
            Connector::new(source, None, &RuleSet::default(), EntityTables::builtin());
        let table = connector
            .fetch_rainfall_by_state("Maharashtra", Some(2000), None)
            .unwrap();
        let rows = table.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].year, 2000);
        assert_eq!(rows[0].rainfall_mm, 800.0);
        assert_eq!(rows[1].rainfall_mm, 1100.0);
    }

    #[test]
    fn directory_source_reads_and_filters_resource_files() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(format!("{PRODUCTION_RESOURCE_ID}.json")),
            r#"{"records": [
                {"state_name": "Punjab", "crop_year": 2001, "crop": "Rice", "production_": 10},
                {"state_name": "Kerala", "crop_year": 2001, "crop": "Rice", "production_": 20}
            ]}"#,
        )
        .unwrap();
        let source = DirectorySource::new(dir.path());
        let mut filters = Filters::new();
        filters.insert("filters[state_name]".into(), "Kerala".into());
        filters.insert("filters[crop_year]".into(), "2001".into());
        let records = source.fetch(PRODUCTION_RESOURCE_ID, &filters).unwrap();
        assert_eq!(records.len(), 1);
        assert!(source.fetch(RAINFALL_RESOURCE_ID, &Filters::new()).is_err());
    }
}
