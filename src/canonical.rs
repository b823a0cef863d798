//! Canonical output tables.
//!
//! Rows are strongly typed; column names and order are fixed per domain and
//! are what downstream consumers read. A table carries the quality report
//! produced for it, if validation ran.

use std::io::Write;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{quality::QualityReport, rules::Domain};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
}

impl ColumnKind {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ColumnKind::Text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec<'a> {
    pub name: &'a str,
    pub kind: ColumnKind,
}

const fn spec(name: &'static str, kind: ColumnKind) -> ColumnSpec<'static> {
    ColumnSpec { name, kind }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    Null,
}

impl Cell<'_> {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

/// Column-oriented read access used by the quality validator. A column the
/// table does not define reads as [`Cell::Null`].
pub trait Tabular {
    fn columns(&self) -> Vec<ColumnSpec<'_>>;
    fn row_count(&self) -> usize;
    fn cell(&self, row: usize, column: &str) -> Cell<'_>;

    fn has_column(&self, column: &str) -> bool {
        self.columns().iter().any(|spec| spec.name == column)
    }
}

pub trait CanonicalRecord: Clone + Serialize {
    const DOMAIN: Domain;
    const COLUMNS: &'static [ColumnSpec<'static>];

    fn cell(&self, column: &str) -> Cell<'_>;

    fn column_names() -> Vec<&'static str> {
        Self::COLUMNS.iter().map(|spec| spec.name).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub state_name: String,
    pub district_name: String,
    pub year: i64,
    pub season: String,
    pub crop: String,
    pub area_ha: Option<f64>,
    pub production_tonne: f64,
}

impl CanonicalRecord for ProductionRecord {
    const DOMAIN: Domain = Domain::Production;
    const COLUMNS: &'static [ColumnSpec<'static>] = &[
        spec("state_name", ColumnKind::Text),
        spec("district_name", ColumnKind::Text),
        spec("year", ColumnKind::Integer),
        spec("season", ColumnKind::Text),
        spec("crop", ColumnKind::Text),
        spec("area_ha", ColumnKind::Float),
        spec("production_tonne", ColumnKind::Float),
    ];

    fn cell(&self, column: &str) -> Cell<'_> {
        match column {
            "state_name" => Cell::Text(&self.state_name),
            "district_name" => Cell::Text(&self.district_name),
            "year" => Cell::Number(self.year as f64),
            "season" => Cell::Text(&self.season),
            "crop" => Cell::Text(&self.crop),
            "area_ha" => self.area_ha.map_or(Cell::Null, Cell::Number),
            "production_tonne" => Cell::Number(self.production_tonne),
            _ => Cell::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainfallRecord {
    pub subdivision_name: String,
    pub year: i64,
    pub rainfall_mm: f64,
}

impl CanonicalRecord for RainfallRecord {
    const DOMAIN: Domain = Domain::Rainfall;
    const COLUMNS: &'static [ColumnSpec<'static>] = &[
        spec("subdivision_name", ColumnKind::Text),
        spec("year", ColumnKind::Integer),
        spec("rainfall_mm", ColumnKind::Float),
    ];

    fn cell(&self, column: &str) -> Cell<'_> {
        match column {
            "subdivision_name" => Cell::Text(&self.subdivision_name),
            "year" => Cell::Number(self.year as f64),
            "rainfall_mm" => Cell::Number(self.rainfall_mm),
            _ => Cell::Null,
        }
    }
}

/// Sub-division rainfall averaged up to a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRainfallRecord {
    pub state_name: String,
    pub year: i64,
    pub rainfall_mm: f64,
}

impl CanonicalRecord for StateRainfallRecord {
    const DOMAIN: Domain = Domain::Rainfall;
    const COLUMNS: &'static [ColumnSpec<'static>] = &[
        spec("state_name", ColumnKind::Text),
        spec("year", ColumnKind::Integer),
        spec("rainfall_mm", ColumnKind::Float),
    ];

    fn cell(&self, column: &str) -> Cell<'_> {
        match column {
            "state_name" => Cell::Text(&self.state_name),
            "year" => Cell::Number(self.year as f64),
            "rainfall_mm" => Cell::Number(self.rainfall_mm),
            _ => Cell::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable<R> {
    rows: Vec<R>,
    quality: Option<QualityReport>,
}

pub type ProductionTable = CanonicalTable<ProductionRecord>;
pub type RainfallTable = CanonicalTable<RainfallRecord>;
pub type StateRainfallTable = CanonicalTable<StateRainfallRecord>;

impl<R: CanonicalRecord> Default for CanonicalTable<R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<R: CanonicalRecord> CanonicalTable<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self {
            rows,
            quality: None,
        }
    }

    /// A table with no rows; its columns are still the full canonical set.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        R::column_names()
    }

    pub fn domain(&self) -> Domain {
        R::DOMAIN
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when the table holds data a consumer can analyse. Canonical
    /// columns are always present by construction.
    pub fn is_usable(&self) -> bool {
        !self.rows.is_empty()
    }

    pub fn quality_report(&self) -> Option<&QualityReport> {
        self.quality.as_ref()
    }

    pub fn with_quality_report(mut self, report: QualityReport) -> Self {
        self.quality = Some(report);
        self
    }

    /// Keeps rows whose flag in `keep` is set. The quality report is dropped
    /// since it described the unfiltered rows.
    pub fn retain_flagged(self, keep: &[bool]) -> Self {
        let rows = self
            .rows
            .into_iter()
            .zip(keep.iter().copied().chain(std::iter::repeat(false)))
            .filter_map(|(row, kept)| kept.then_some(row))
            .collect();
        Self::new(rows)
    }

    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: FnMut(&R) -> bool,
    {
        let quality = self.quality;
        let rows = self.rows.into_iter().filter(predicate).collect();
        Self { rows, quality }
    }

    /// Writes the header and every row. The writer must not emit headers
    /// on its own.
    pub fn write_csv<W: Write>(&self, writer: &mut csv::Writer<W>) -> Result<()> {
        writer
            .write_record(R::column_names())
            .context("Writing canonical header")?;
        for (idx, row) in self.rows.iter().enumerate() {
            writer
                .serialize(row)
                .with_context(|| format!("Writing canonical row {}", idx + 1))?;
        }
        writer.flush().context("Flushing canonical output")?;
        Ok(())
    }

    /// Rows rendered as display strings in column order.
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                R::COLUMNS
                    .iter()
                    .map(|spec| match row.cell(spec.name) {
                        Cell::Text(text) => text.to_string(),
                        Cell::Number(value) => format_number(value),
                        Cell::Null => String::new(),
                    })
                    .collect()
            })
            .collect()
    }
}

impl<R: CanonicalRecord> Tabular for CanonicalTable<R> {
    fn columns(&self) -> Vec<ColumnSpec<'_>> {
        R::COLUMNS.to_vec()
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cell(&self, row: usize, column: &str) -> Cell<'_> {
        self.rows
            .get(row)
            .map_or(Cell::Null, |record| record.cell(column))
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
