//! Single trust score for an answer built from one or more tables.

use chrono::{Datelike, Local};
use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::{
    canonical::{CanonicalRecord, CanonicalTable},
    quality::QualityReport,
};

const QUALITY_WEIGHT: f64 = 0.5;
const SAMPLE_WEIGHT: f64 = 0.3;
const RECENCY_WEIGHT: f64 = 0.2;
const DEFAULT_QUALITY: f64 = 0.9;

/// A table that contributes rows and, optionally, a quality score.
pub trait Assessed {
    fn row_count(&self) -> usize;
    fn quality_report(&self) -> Option<&QualityReport>;
}

impl<R: CanonicalRecord> Assessed for CanonicalTable<R> {
    fn row_count(&self) -> usize {
        self.len()
    }

    fn quality_report(&self) -> Option<&QualityReport> {
        CanonicalTable::quality_report(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceContext {
    /// Last year covered by the answer, when known.
    pub year_end: Option<i32>,
    /// Year that recency is measured from.
    pub reference_year: i32,
}

impl Default for ConfidenceContext {
    fn default() -> Self {
        Self {
            year_end: None,
            reference_year: Local::now().year(),
        }
    }
}

impl ConfidenceContext {
    pub fn ending(year_end: i32) -> Self {
        Self {
            year_end: Some(year_end),
            ..Self::default()
        }
    }
}

pub fn sample_size_factor(rows: usize) -> f64 {
    match rows {
        100.. => 1.0,
        50.. => 0.95,
        20.. => 0.85,
        10.. => 0.75,
        _ => 0.6,
    }
}

pub fn recency_factor(context: &ConfidenceContext) -> f64 {
    let Some(year_end) = context.year_end else {
        return 1.0;
    };
    match context.reference_year - year_end {
        10.. => 0.7,
        5.. => 0.85,
        2.. => 0.95,
        _ => 1.0,
    }
}

/// Weighted blend of mean quality, sample size and recency, rounded to two
/// places. Zero when every table is empty.
pub fn calculate_confidence(tables: &[&dyn Assessed], context: &ConfidenceContext) -> f64 {
    let total_rows: usize = tables.iter().map(|table| table.row_count()).sum();
    if total_rows == 0 {
        return 0.0;
    }
    let scores: Vec<f64> = tables
        .iter()
        .filter_map(|table| table.quality_report())
        .map(|report| report.overall_score)
        .collect();
    let average_quality = if scores.is_empty() {
        DEFAULT_QUALITY
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };

    let blended = QUALITY_WEIGHT * average_quality
        + SAMPLE_WEIGHT * sample_size_factor(total_rows)
        + RECENCY_WEIGHT * recency_factor(context);
    round2(blended).clamp(0.0, 1.0)
}

fn round2(value: f64) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|decimal| decimal.round_dp(2))
        .and_then(|decimal| decimal.to_f64())
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{RainfallRecord, RainfallTable};

    fn table(rows: usize, score: Option<f64>) -> RainfallTable {
        let rows = (0..rows)
            .map(|i| RainfallRecord {
                subdivision_name: "Kerala".to_string(),
                year: 2000 + i as i64,
                rainfall_mm: 100.0,
            })
            .collect();
        let table = RainfallTable::new(rows);
        match score {
            Some(score) => {
                let mut report = QualityReport::no_data();
                report.overall_score = score;
                table.with_quality_report(report)
            }
            None => table,
        }
    }

    #[test]
    fn no_tables_means_no_confidence() {
        assert_eq!(calculate_confidence(&[], &ConfidenceContext::default()), 0.0);
        let empty = table(0, Some(1.0));
        assert_eq!(
            calculate_confidence(&[&empty], &ConfidenceContext::default()),
            0.0
        );
    }

    #[test]
    fn two_scored_tables_with_current_data() {
        let a = table(60, Some(0.8));
        let b = table(60, Some(0.8));
        let context = ConfidenceContext {
            year_end: Some(2024),
            reference_year: 2024,
        };
        assert_eq!(calculate_confidence(&[&a, &b], &context), 0.9);
    }

    #[test]
    fn unscored_tables_default_quality() {
        let a = table(5, None);
        let context = ConfidenceContext {
            year_end: Some(2010),
            reference_year: 2024,
        };
        // 0.45 + 0.18 + 0.14
        assert_eq!(calculate_confidence(&[&a], &context), 0.77);
    }

    #[test]
    fn factors_follow_their_bands() {
        assert_eq!(sample_size_factor(100), 1.0);
        assert_eq!(sample_size_factor(99), 0.95);
        assert_eq!(sample_size_factor(20), 0.85);
        assert_eq!(sample_size_factor(10), 0.75);
        assert_eq!(sample_size_factor(9), 0.6);

        let at = |year_end| ConfidenceContext {
            year_end: Some(year_end),
            reference_year: 2024,
        };
        assert_eq!(recency_factor(&at(2014)), 0.7);
        assert_eq!(recency_factor(&at(2019)), 0.85);
        assert_eq!(recency_factor(&at(2022)), 0.95);
        assert_eq!(recency_factor(&at(2023)), 1.0);
        assert_eq!(recency_factor(&ConfidenceContext::default()), 1.0);
    }
}
