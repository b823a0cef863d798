//! Quality scoring for canonical tables.
//!
//! A table is scored on three dimensions, each in `[0, 1]`:
//!
//! - **completeness**: share of non-null cells across the domain's required
//!   fields; zero when a required field is not a column at all
//! - **consistency**: share of applicable logical rules (plausible yield,
//!   year bounds, non-negative quantities) that found no violation
//! - **accuracy**: one minus the share of rows whose values fall outside the
//!   domain range (penalty capped at one half); statistical outliers found
//!   with a 3×IQR fence only produce warnings
//!
//! The overall score weights them 0.35 / 0.35 / 0.30.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    canonical::{CanonicalRecord, CanonicalTable, ColumnSpec, Tabular},
    rules::{Domain, DomainRules, Metric, RangeRule},
};

const COMPLETENESS_WEIGHT: f64 = 0.35;
const CONSISTENCY_WEIGHT: f64 = 0.35;
const ACCURACY_WEIGHT: f64 = 0.30;
const LOW_COMPLETENESS: f64 = 0.8;
const MIN_VALUES_FOR_ACCURACY: usize = 4;
const IQR_FENCE: f64 = 3.0;
const OUTLIER_WARNING_PERCENT: f64 = 5.0;
const MAX_ACCURACY_PENALTY: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub overall_score: f64,
    pub completeness_score: f64,
    pub consistency_score: f64,
    pub accuracy_score: f64,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub record_count: usize,
    pub valid_record_count: usize,
}

impl QualityReport {
    /// Report for a table with no rows.
    pub fn no_data() -> Self {
        Self {
            overall_score: 0.0,
            completeness_score: 0.0,
            consistency_score: 0.0,
            accuracy_score: 0.0,
            issues: vec!["No data returned".to_string()],
            warnings: Vec::new(),
            record_count: 0,
            valid_record_count: 0,
        }
    }

    pub fn is_acceptable(&self, threshold: f64) -> bool {
        self.overall_score >= threshold
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "overall {:.2} (completeness {:.2}, consistency {:.2}, accuracy {:.2}); {}/{} valid",
            self.overall_score,
            self.completeness_score,
            self.consistency_score,
            self.accuracy_score,
            self.valid_record_count,
            self.record_count
        )
    }
}

struct AccuracyOutcome {
    score: f64,
    warnings: Vec<String>,
    surviving_rows: usize,
}

#[derive(Debug, Clone, Default)]
pub struct QualityValidator {
    rules: DomainRules,
}

impl QualityValidator {
    pub fn new(rules: DomainRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &DomainRules {
        &self.rules
    }

    pub fn validate<T: Tabular>(&self, table: &T, domain: Domain) -> QualityReport {
        let record_count = table.row_count();
        if record_count == 0 {
            return QualityReport::no_data();
        }

        let mut issues = Vec::new();
        let completeness_score = self.check_completeness(table, domain, &mut issues);
        let consistency_score = self.check_consistency(table, &mut issues);
        let accuracy = self.check_accuracy(table, domain);

        let overall_score = COMPLETENESS_WEIGHT * completeness_score
            + CONSISTENCY_WEIGHT * consistency_score
            + ACCURACY_WEIGHT * accuracy.score;

        QualityReport {
            overall_score,
            completeness_score,
            consistency_score,
            accuracy_score: accuracy.score,
            issues,
            warnings: accuracy.warnings,
            record_count,
            valid_record_count: accuracy.surviving_rows,
        }
    }

    fn check_completeness<T: Tabular>(
        &self,
        table: &T,
        domain: Domain,
        issues: &mut Vec<String>,
    ) -> f64 {
        let required = self.rules.required_fields(domain);
        let missing: Vec<&str> = required
            .iter()
            .map(String::as_str)
            .filter(|field| !table.has_column(field))
            .collect();
        if !missing.is_empty() {
            issues.push(format!("Missing required fields: {missing:?}"));
            return 0.0;
        }

        let rows = table.row_count();
        let total_cells = required.len() * rows;
        if total_cells == 0 {
            return 1.0;
        }
        let null_cells: usize = required
            .iter()
            .map(|field| {
                (0..rows)
                    .filter(|&row| table.cell(row, field).is_null())
                    .count()
            })
            .sum();

        let completeness = 1.0 - null_cells as f64 / total_cells as f64;
        if completeness < LOW_COMPLETENESS {
            issues.push(format!(
                "Low completeness: {:.1}% of required fields are non-null",
                completeness * 100.0
            ));
        }
        completeness
    }

    fn check_consistency<T: Tabular>(&self, table: &T, issues: &mut Vec<String>) -> f64 {
        let columns = numeric_columns(table);
        let column_for = |metric: Metric| {
            columns
                .iter()
                .find(|spec| Metric::of_column(spec.name) == Some(metric))
                .map(|spec| spec.name)
        };
        let rows = table.row_count();
        let mut checks = 0usize;
        let mut inconsistencies = 0usize;

        if let (Some(production), Some(area)) =
            (column_for(Metric::Production), column_for(Metric::Area))
        {
            checks += 1;
            let max_yield = self.rules.max_yield_per_hectare;
            let implausible = (0..rows)
                .filter(|&row| {
                    match (
                        table.cell(row, production).as_number(),
                        table.cell(row, area).as_number(),
                    ) {
                        (Some(tonnes), Some(hectares)) => tonnes > hectares * max_yield,
                        _ => false,
                    }
                })
                .count();
            if implausible > 0 {
                inconsistencies += 1;
                issues.push(format!(
                    "Found {implausible} records where production exceeds reasonable yield"
                ));
            }
        }

        if let Some(year) = column_for(Metric::Year) {
            checks += 1;
            let bounds = self.rules.year;
            let invalid = (0..rows)
                .filter_map(|row| table.cell(row, year).as_number())
                .filter(|value| !bounds.contains(*value))
                .count();
            if invalid > 0 {
                inconsistencies += 1;
                issues.push(format!("Found {invalid} records with invalid years"));
            }
        }

        for spec in &columns {
            let is_quantity = Metric::of_column(spec.name).is_some_and(|m| m.is_quantity());
            if !is_quantity {
                continue;
            }
            checks += 1;
            let negative = (0..rows)
                .filter_map(|row| table.cell(row, spec.name).as_number())
                .filter(|value| *value < 0.0)
                .count();
            if negative > 0 {
                inconsistencies += 1;
                issues.push(format!("Found {negative} negative values in {}", spec.name));
            }
        }

        if checks == 0 {
            return 1.0;
        }
        1.0 - inconsistencies as f64 / checks as f64
    }

    fn check_accuracy<T: Tabular>(&self, table: &T, domain: Domain) -> AccuracyOutcome {
        let rows = table.row_count();
        let mut alive = vec![true; rows];
        let mut warnings = Vec::new();
        let mut removed = 0usize;
        let mut checked = 0usize;

        for spec in numeric_columns(table) {
            let column = spec.name;
            let non_null = (0..rows)
                .filter(|&row| table.cell(row, column).as_number().is_some())
                .count();
            if non_null < MIN_VALUES_FOR_ACCURACY {
                continue;
            }
            checked += 1;

            if let Some(range) = self.rules.range_for_column(column, domain) {
                let mut out_of_range = 0usize;
                for (row, kept) in alive.iter_mut().enumerate() {
                    if !*kept {
                        continue;
                    }
                    let outside = table
                        .cell(row, column)
                        .as_number()
                        .is_some_and(|value| !range.contains(value));
                    if outside {
                        *kept = false;
                        out_of_range += 1;
                    }
                }
                if out_of_range > 0 {
                    removed += out_of_range;
                    warnings.push(format!(
                        "Removed {out_of_range} out-of-range values from {column} (valid range: {})",
                        describe_range(&range)
                    ));
                }
            }

            let values: Vec<f64> = (0..rows)
                .filter(|&row| alive[row])
                .filter_map(|row| table.cell(row, column).as_number())
                .collect();
            let Some((lower, upper)) = iqr_fences(&values) else {
                continue;
            };
            let outliers = values
                .iter()
                .filter(|value| **value < lower || **value > upper)
                .count();
            let current_rows = alive.iter().filter(|kept| **kept).count();
            if outliers > 0 && current_rows > 0 {
                let percent = outliers as f64 / current_rows as f64 * 100.0;
                if percent > OUTLIER_WARNING_PERCENT {
                    warnings.push(format!(
                        "Found {outliers} statistical outliers in {column} ({percent:.1}%)"
                    ));
                }
            }
        }

        let score = if checked == 0 {
            1.0
        } else {
            1.0 - (removed as f64 / rows as f64).min(MAX_ACCURACY_PENALTY)
        };
        AccuracyOutcome {
            score,
            warnings,
            surviving_rows: alive.iter().filter(|kept| **kept).count(),
        }
    }

    /// Per-row keep flags under the hard domain rules: required fields
    /// present, the domain's metric column within range, and no negative
    /// quantities. Nulls in non-required columns are not violations.
    pub fn valid_rows<T: Tabular>(&self, table: &T, domain: Domain) -> Vec<bool> {
        let rows = table.row_count();
        let required: Vec<&str> = self
            .rules
            .required_fields(domain)
            .iter()
            .map(String::as_str)
            .filter(|field| table.has_column(field))
            .collect();
        let columns = numeric_columns(table);
        let metric_range = self.rules.metric_rule(domain).map(|rule| rule.range());
        let metric_column = columns
            .iter()
            .find(|spec| spec.name.to_ascii_lowercase().contains(domain.as_str()))
            .map(|spec| spec.name);
        let quantity_columns: Vec<&str> = columns
            .iter()
            .filter(|spec| Metric::of_column(spec.name).is_some_and(|m| m.is_quantity()))
            .map(|spec| spec.name)
            .collect();

        (0..rows)
            .map(|row| {
                let complete = required
                    .iter()
                    .all(|field| !table.cell(row, field).is_null());
                let in_range = match (metric_column, metric_range) {
                    (Some(column), Some(range)) => table
                        .cell(row, column)
                        .as_number()
                        .is_none_or(|value| range.contains(value)),
                    _ => true,
                };
                let non_negative = quantity_columns.iter().all(|column| {
                    table
                        .cell(row, column)
                        .as_number()
                        .is_none_or(|value| value >= 0.0)
                });
                complete && in_range && non_negative
            })
            .collect()
    }

    /// Drops rows that fail the hard domain rules. Applying it to its own
    /// output changes nothing.
    pub fn filter_invalid_records<R: CanonicalRecord>(
        &self,
        table: CanonicalTable<R>,
        domain: Domain,
    ) -> CanonicalTable<R> {
        if table.is_empty() {
            return table;
        }
        let keep = self.valid_rows(&table, domain);
        table.retain_flagged(&keep)
    }
}

fn numeric_columns<T: Tabular>(table: &T) -> Vec<ColumnSpec<'_>> {
    table
        .columns()
        .into_iter()
        .filter(|spec| spec.kind.is_numeric())
        .collect()
}

/// `Q1 - 3*IQR` and `Q3 + 3*IQR`, with linearly interpolated quartiles.
fn iqr_fences(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    Some((q1 - IQR_FENCE * iqr, q3 + IQR_FENCE * iqr))
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

fn describe_range(range: &RangeRule) -> String {
    format!("{}-{}", format_bound(range.min), format_bound(range.max))
}

fn format_bound(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
