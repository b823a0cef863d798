//! Raw records → canonical tables.
//!
//! Both normalizers share one shape: resolve field names with a
//! [`FieldMapper`], coerce each row into a typed canonical record, drop rows
//! that violate the table invariants, then optionally score the result and
//! strip hard-rule failures when the score is poor. Malformed input never
//! raises; the worst case is an empty table.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::{
    canonical::{
        CanonicalRecord, CanonicalTable, ProductionRecord, ProductionTable, RainfallRecord,
        RainfallTable, StateRainfallRecord, StateRainfallTable,
    },
    data::{
        RawRecord, coerce_float, coerce_integer, coerce_text, find_column_ci, observed_columns,
        parse_float,
    },
    mapper::{FieldMapper, FieldMapping, apply_mapping},
    mappings::{EntityTables, SubdivisionMap},
    quality::QualityValidator,
    rules::{DEFAULT_QUALITY_THRESHOLD, Domain, RuleSet},
    similarity::{FuzzScorer, Similarity},
};

pub const DEFAULT_MONTH_COLUMNS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
pub const DEFAULT_ANNUAL_COLUMNS: &[&str] = &["annual", "annual_rainfall"];
pub const UNKNOWN_SUBDIVISION: &str = "Unknown";

const HIGH_QUALITY: f64 = 0.9;
const ISSUES_LOGGED: usize = 3;

// Static renames used when strict mapping fails; first present column wins.
const FALLBACK_PRODUCTION_COLUMNS: &[(&str, &[&str])] = &[
    ("state", &["state_name", "state"]),
    ("district", &["district_name", "district"]),
    ("year", &["crop_year", "year"]),
    ("crop", &["crop"]),
    ("area", &["area_", "area_ha", "area"]),
    ("production", &["production_", "production_tonne", "production"]),
    ("season", &["season"]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    /// Score the table and filter hard-rule failures when the score is low.
    pub validate: bool,
    /// Collapse state and crop spellings through the entity tables.
    pub canonicalize_names: bool,
    /// Fail mapping on an unresolved field and fall back to static renames.
    pub strict_mapping: bool,
    pub quality_threshold: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            validate: true,
            canonicalize_names: true,
            strict_mapping: false,
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
        }
    }
}

impl NormalizeOptions {
    pub fn from_rules(rules: &RuleSet) -> Self {
        Self {
            quality_threshold: rules.quality_threshold,
            ..Self::default()
        }
    }
}

/// Fallback mapping for production records built from fixed column names.
pub fn fallback_production_mapping(observed: &[String]) -> FieldMapping {
    let mut mapping = FieldMapping::default();
    for (canonical, candidates) in FALLBACK_PRODUCTION_COLUMNS {
        if let Some(actual) = candidates
            .iter()
            .find(|candidate| observed.iter().any(|column| column == *candidate))
        {
            mapping.insert(canonical, actual);
        }
    }
    mapping
}

fn report_drift<S: Similarity>(mapper: &FieldMapper<S>, observed: &[String], domain: Domain) {
    let drift = mapper.detect_schema_drift(observed, &domain.canonical_fields());
    if !drift.renamed.is_empty() {
        info!("Detected {domain} field renames: {:?}", drift.renamed);
    }
    if !drift.missing.is_empty() {
        warn!("Missing expected {domain} fields: {:?}", drift.missing);
    }
}

/// Scores `table`, filters it when the score is below the threshold, and
/// attaches the report either way.
fn assess<R: CanonicalRecord>(
    table: CanonicalTable<R>,
    validator: &QualityValidator,
    options: &NormalizeOptions,
) -> CanonicalTable<R> {
    if !options.validate {
        return table;
    }
    let domain = R::DOMAIN;
    let report = validator.validate(&table, domain);

    if !report.issues.is_empty() {
        warn!(
            "{domain} data quality issues detected ({}):",
            report.issues.len()
        );
        for issue in report.issues.iter().take(ISSUES_LOGGED) {
            warn!("  - {issue}");
        }
        if report.issues.len() > ISSUES_LOGGED {
            warn!("  ... and {} more", report.issues.len() - ISSUES_LOGGED);
        }
    }
    let percent = report.overall_score * 100.0;
    if report.overall_score < options.quality_threshold {
        warn!("Low {domain} quality score: {percent:.2}%");
    } else if report.overall_score < HIGH_QUALITY {
        info!("{domain} quality score: {percent:.2}%");
    } else {
        info!("High {domain} quality score: {percent:.2}%");
    }

    let table = if report.is_acceptable(options.quality_threshold) {
        table
    } else {
        let filtered = validator.filter_invalid_records(table, domain);
        info!(
            "Filtered invalid {domain} records: kept {}/{}",
            filtered.len(),
            report.record_count
        );
        filtered
    };
    table.with_quality_report(report)
}

pub struct ProductionNormalizer<S = FuzzScorer> {
    mapper: FieldMapper<S>,
    validator: QualityValidator,
    entities: EntityTables,
    options: NormalizeOptions,
}

impl ProductionNormalizer<FuzzScorer> {
    pub fn new(rules: &RuleSet, entities: EntityTables) -> Self {
        Self::with_mapper(
            FieldMapper::for_domain(Domain::Production, rules),
            QualityValidator::new(rules.domain.clone()),
            entities,
            NormalizeOptions::from_rules(rules),
        )
    }
}

impl<S: Similarity> ProductionNormalizer<S> {
    pub fn with_mapper(
        mapper: FieldMapper<S>,
        validator: QualityValidator,
        entities: EntityTables,
        options: NormalizeOptions,
    ) -> Self {
        Self {
            mapper,
            validator,
            entities,
            options,
        }
    }

    pub fn with_options(mut self, options: NormalizeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    pub fn mapper(&self) -> &FieldMapper<S> {
        &self.mapper
    }

    fn resolve_mapping(&mut self, observed: &[String]) -> FieldMapping {
        let fields = Domain::Production.canonical_fields();
        match self
            .mapper
            .map_fields(observed, &fields, self.options.strict_mapping)
        {
            Ok(mapping) => {
                report_drift(&self.mapper, observed, Domain::Production);
                mapping
            }
            Err(err) => {
                warn!("Field mapping failed ({err}), falling back to static renames");
                fallback_production_mapping(observed)
            }
        }
    }

    pub fn normalize(&mut self, records: &[RawRecord]) -> ProductionTable {
        if records.is_empty() {
            return ProductionTable::empty();
        }
        let observed = observed_columns(records);
        let mapping = self.resolve_mapping(&observed);
        debug!("Production mapping: {mapping:?}");
        let mapped = apply_mapping(records, &mapping);

        let mut dropped = 0usize;
        let mut rows = Vec::with_capacity(mapped.len());
        for record in mapped.rows() {
            match self.build_row(record) {
                Some(row) => rows.push(row),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!("Dropped {dropped} production row(s) without a year or positive production");
        }
        assess(ProductionTable::new(rows), &self.validator, &self.options)
    }

    fn build_row(&self, record: &RawRecord) -> Option<ProductionRecord> {
        let year = coerce_integer(record.get("year"))?;
        let production_tonne = coerce_float(record.get("production")).filter(|value| *value > 0.0)?;
        let mut state_name = coerce_text(record.get("state"));
        let mut crop = coerce_text(record.get("crop"));
        if self.options.canonicalize_names {
            state_name = self.entities.states.canonical(&state_name).to_string();
            crop = self.entities.crops.canonical(&crop).to_string();
        }
        Some(ProductionRecord {
            state_name,
            district_name: coerce_text(record.get("district")),
            year,
            season: coerce_text(record.get("season")),
            crop,
            area_ha: coerce_float(record.get("area")),
            production_tonne,
        })
    }
}

pub struct RainfallNormalizer<S = FuzzScorer> {
    mapper: FieldMapper<S>,
    validator: QualityValidator,
    options: NormalizeOptions,
    month_columns: Vec<String>,
    annual_columns: Vec<String>,
}

impl RainfallNormalizer<FuzzScorer> {
    pub fn new(rules: &RuleSet) -> Self {
        Self::with_mapper(
            FieldMapper::for_domain(Domain::Rainfall, rules),
            QualityValidator::new(rules.domain.clone()),
            NormalizeOptions::from_rules(rules),
        )
    }
}

impl<S: Similarity> RainfallNormalizer<S> {
    pub fn with_mapper(
        mapper: FieldMapper<S>,
        validator: QualityValidator,
        options: NormalizeOptions,
    ) -> Self {
        Self {
            mapper,
            validator,
            options,
            month_columns: to_owned(DEFAULT_MONTH_COLUMNS),
            annual_columns: to_owned(DEFAULT_ANNUAL_COLUMNS),
        }
    }

    pub fn with_options(mut self, options: NormalizeOptions) -> Self {
        self.options = options;
        self
    }

    /// Month columns to sum, matched case-insensitively.
    pub fn with_month_columns(mut self, months: Vec<String>) -> Self {
        self.month_columns = months;
        self
    }

    pub fn with_annual_columns(mut self, annual: Vec<String>) -> Self {
        self.annual_columns = annual;
        self
    }

    pub fn normalize(&mut self, records: &[RawRecord]) -> RainfallTable {
        if records.is_empty() {
            return RainfallTable::empty();
        }
        let observed = observed_columns(records);
        let fields = Domain::Rainfall.canonical_fields();
        let mapping = match self.mapper.map_fields(&observed, &fields, false) {
            Ok(mapping) => mapping,
            Err(err) => {
                warn!("Rainfall field mapping failed ({err})");
                FieldMapping::default()
            }
        };
        report_drift(&self.mapper, &observed, Domain::Rainfall);

        let Some(year_column) = mapping.get("year") else {
            warn!("No year column among {observed:?}; returning empty rainfall table");
            return RainfallTable::empty();
        };
        let months: Vec<&str> = self
            .month_columns
            .iter()
            .filter_map(|month| find_column_ci(&observed, month))
            .collect();
        let source = if !months.is_empty() {
            debug!("Summing {} month column(s) into rainfall_mm", months.len());
            RainfallSource::Months(months)
        } else if let Some(column) = self
            .annual_columns
            .iter()
            .find_map(|annual| find_column_ci(&observed, annual))
            .or_else(|| mapping.get("rainfall"))
        {
            debug!("Using '{column}' as annual rainfall");
            RainfallSource::Annual(column)
        } else {
            warn!("No monthly or annual rainfall column among {observed:?}");
            return RainfallTable::empty();
        };
        let subdivision_column = mapping.get("subdivision");

        let rows = records
            .iter()
            .filter_map(|record| {
                let year = coerce_integer(record.get(year_column))?;
                let rainfall_mm = source.total(record).filter(|value| *value > 0.0)?;
                let subdivision_name = match subdivision_column {
                    Some(column) => coerce_text(record.get(column)),
                    None => UNKNOWN_SUBDIVISION.to_string(),
                };
                Some(RainfallRecord {
                    subdivision_name,
                    year,
                    rainfall_mm,
                })
            })
            .collect();
        assess(RainfallTable::new(rows), &self.validator, &self.options)
    }
}

enum RainfallSource<'a> {
    Months(Vec<&'a str>),
    Annual(&'a str),
}

impl RainfallSource<'_> {
    /// Unparseable months count as zero; an unparseable annual value is
    /// missing.
    fn total(&self, record: &RawRecord) -> Option<f64> {
        match self {
            RainfallSource::Months(columns) => Some(
                columns
                    .iter()
                    .filter_map(|column| record.get(*column).and_then(parse_float))
                    .sum(),
            ),
            RainfallSource::Annual(column) => coerce_float(record.get(*column)),
        }
    }
}

fn to_owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// Averages sub-division rainfall per `(state, year)`. Sub-divisions with no
/// state assignment are dropped. The mean is unweighted; sub-division area
/// is not taken into account.
pub fn aggregate_rainfall_to_state(
    table: &RainfallTable,
    subdivisions: &SubdivisionMap,
) -> StateRainfallTable {
    let mut groups: BTreeMap<(String, i64), (f64, usize)> = BTreeMap::new();
    let mut unmapped = 0usize;
    for row in table.rows() {
        let Some(state) = subdivisions.state_for(&row.subdivision_name) else {
            unmapped += 1;
            continue;
        };
        let entry = groups.entry((state.to_string(), row.year)).or_insert((0.0, 0));
        entry.0 += row.rainfall_mm;
        entry.1 += 1;
    }
    if unmapped > 0 {
        debug!("Dropped {unmapped} rainfall row(s) with unmapped sub-divisions");
    }
    let rows = groups
        .into_iter()
        .map(|((state_name, year), (total, count))| StateRainfallRecord {
            state_name,
            year,
            rainfall_mm: total / count as f64,
        })
        .collect();
    StateRainfallTable::new(rows)
}

/// Non-empty production table. Canonical columns are fixed by the row type.
pub fn is_valid_production(table: &ProductionTable) -> bool {
    table.is_usable()
}

pub fn is_valid_rainfall(table: &RainfallTable) -> bool {
    table.is_usable()
}
