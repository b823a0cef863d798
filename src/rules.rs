//! Static rule tables: field aliases, domain value ranges and thresholds.
//!
//! A [`RuleSet`] is built once (from the built-in defaults or a YAML file)
//! and handed to the mapper, normalizers and validator. Nothing here is
//! mutated after construction.
//!
//! A YAML override only needs the keys it changes:
//!
//! ```yaml
//! fuzzy_threshold: 85
//! domain:
//!   rainfall:
//!     max: 15000
//! ```
//!
//! Keys left out of a rule, here the rainfall `min` and `required_fields`,
//! keep their built-in values.

use std::{collections::BTreeMap, fmt, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use chrono::{Datelike, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FUZZY_THRESHOLD: u8 = 80;
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MAX_YIELD_PER_HECTARE: f64 = 20.0;
pub const EARLIEST_RECORD_YEAR: f64 = 1901.0;

pub const PRODUCTION_FIELDS: &[&str] = &[
    "state",
    "district",
    "year",
    "crop",
    "area",
    "production",
    "season",
];
pub const RAINFALL_FIELDS: &[&str] = &["subdivision", "year", "rainfall"];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Production,
    Rainfall,
    General,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Production => "production",
            Domain::Rainfall => "rainfall",
            Domain::General => "general",
        }
    }

    /// Canonical field vocabulary the mapper resolves for this domain.
    pub fn canonical_fields(&self) -> Vec<&'static str> {
        match self {
            Domain::Production => PRODUCTION_FIELDS.to_vec(),
            Domain::Rainfall => RAINFALL_FIELDS.to_vec(),
            Domain::General => {
                let mut fields = PRODUCTION_FIELDS.to_vec();
                fields.extend(
                    RAINFALL_FIELDS
                        .iter()
                        .filter(|field| !PRODUCTION_FIELDS.contains(field)),
                );
                fields
            }
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known historical and variant spellings per canonical field, in the order
/// they should be tried.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, canonical: &str, aliases: &[&str]) -> Self {
        self.entries.insert(
            canonical.to_string(),
            aliases.iter().map(|alias| alias.to_string()).collect(),
        );
        self
    }

    pub fn aliases(&self, canonical: &str) -> &[String] {
        self.entries
            .get(canonical)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn production() -> Self {
        Self::new()
            .with(
                "state",
                &["state_name", "state", "State", "STATE_NAME", "statename", "State Name"],
            )
            .with(
                "district",
                &["district_name", "district", "District", "DISTRICT_NAME", "districtname"],
            )
            .with(
                "year",
                &["year", "crop_year", "Year", "YEAR", "cropYear", "Crop_Year"],
            )
            .with(
                "crop",
                &["crop", "Crop", "CROP", "crop_name", "commodity", "Commodity"],
            )
            .with(
                "area",
                &["area_", "area", "Area", "area_hectare", "area_ha", "Area_"],
            )
            .with(
                "production",
                &["production_", "production", "Production", "PRODUCTION", "Production_"],
            )
            .with("season", &["season", "Season", "SEASON"])
    }

    pub fn rainfall() -> Self {
        Self::new()
            .with(
                "subdivision",
                &[
                    "subdivision",
                    "Subdivision",
                    "SUBDIVISION",
                    "sub_division",
                    "subdivision_name",
                ],
            )
            .with(
                "year",
                &["year", "Year", "YEAR", "crop_year", "Crop_Year"],
            )
            .with(
                "rainfall",
                &["rainfall_mm", "rainfall", "Rainfall", "RAINFALL", "precipitation"],
            )
    }

    pub fn builtin(domain: Domain) -> Self {
        match domain {
            Domain::Production => Self::production(),
            Domain::Rainfall => Self::rainfall(),
            Domain::General => {
                let mut merged = Self::production();
                for (canonical, aliases) in Self::rainfall().entries {
                    merged.entries.entry(canonical).or_insert(aliases);
                }
                merged
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeRule {
    pub min: f64,
    pub max: f64,
}

impl RangeRule {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRule {
    pub min: f64,
    pub max: f64,
    pub required_fields: Vec<String>,
}

impl MetricRule {
    pub fn range(&self) -> RangeRule {
        RangeRule {
            min: self.min,
            max: self.max,
        }
    }
}

/// Which domain rule a canonical column falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Production,
    Area,
    Rainfall,
    Year,
}

impl Metric {
    pub fn of_column(column: &str) -> Option<Metric> {
        let lowered = column.to_ascii_lowercase();
        if lowered == "year" || lowered.starts_with("year_") || lowered.ends_with("_year") {
            Some(Metric::Year)
        } else if lowered.contains("production") {
            Some(Metric::Production)
        } else if lowered.contains("area") {
            Some(Metric::Area)
        } else if lowered.contains("rainfall") {
            Some(Metric::Rainfall)
        } else {
            None
        }
    }

    /// Metrics that can never legitimately be negative.
    pub fn is_quantity(&self) -> bool {
        !matches!(self, Metric::Year)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DomainRulesOverride")]
pub struct DomainRules {
    pub production: MetricRule,
    pub area: MetricRule,
    pub rainfall: MetricRule,
    pub year: RangeRule,
    pub max_yield_per_hectare: f64,
}

impl Default for DomainRules {
    fn default() -> Self {
        let crop_required = vec![
            "state_name".to_string(),
            "crop".to_string(),
            "year".to_string(),
        ];
        Self {
            production: MetricRule {
                min: 0.0,
                max: 100_000_000.0,
                required_fields: crop_required.clone(),
            },
            area: MetricRule {
                min: 0.0,
                max: 10_000_000.0,
                required_fields: crop_required,
            },
            rainfall: MetricRule {
                min: 0.0,
                max: 12_000.0,
                required_fields: vec!["subdivision_name".to_string(), "year".to_string()],
            },
            year: RangeRule {
                min: EARLIEST_RECORD_YEAR,
                max: f64::from(Local::now().year() + 1),
            },
            max_yield_per_hectare: DEFAULT_MAX_YIELD_PER_HECTARE,
        }
    }
}

/// Keys given in a rules file for one range; absent keys keep the default.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RangeOverride {
    min: Option<f64>,
    max: Option<f64>,
}

impl RangeOverride {
    fn apply(self, base: RangeRule) -> RangeRule {
        RangeRule {
            min: self.min.unwrap_or(base.min),
            max: self.max.unwrap_or(base.max),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetricOverride {
    min: Option<f64>,
    max: Option<f64>,
    required_fields: Option<Vec<String>>,
}

impl MetricOverride {
    fn apply(self, base: MetricRule) -> MetricRule {
        MetricRule {
            min: self.min.unwrap_or(base.min),
            max: self.max.unwrap_or(base.max),
            required_fields: self.required_fields.unwrap_or(base.required_fields),
        }
    }
}

/// Partial `domain:` section, merged key by key over [`DomainRules::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DomainRulesOverride {
    production: MetricOverride,
    area: MetricOverride,
    rainfall: MetricOverride,
    year: RangeOverride,
    max_yield_per_hectare: Option<f64>,
}

impl From<DomainRulesOverride> for DomainRules {
    fn from(overrides: DomainRulesOverride) -> Self {
        let base = DomainRules::default();
        Self {
            production: overrides.production.apply(base.production),
            area: overrides.area.apply(base.area),
            rainfall: overrides.rainfall.apply(base.rainfall),
            year: overrides.year.apply(base.year),
            max_yield_per_hectare: overrides
                .max_yield_per_hectare
                .unwrap_or(base.max_yield_per_hectare),
        }
    }
}

impl DomainRules {
    pub fn metric_rule(&self, domain: Domain) -> Option<&MetricRule> {
        match domain {
            Domain::Production => Some(&self.production),
            Domain::Rainfall => Some(&self.rainfall),
            Domain::General => None,
        }
    }

    pub fn required_fields(&self, domain: Domain) -> &[String] {
        self.metric_rule(domain)
            .map(|rule| rule.required_fields.as_slice())
            .unwrap_or_default()
    }

    /// Valid range for a column: its own metric rule when the name
    /// identifies one, otherwise the domain's primary metric rule.
    pub fn range_for_column(&self, column: &str, domain: Domain) -> Option<RangeRule> {
        match Metric::of_column(column) {
            Some(Metric::Year) => Some(self.year),
            Some(Metric::Production) => Some(self.production.range()),
            Some(Metric::Area) => Some(self.area.range()),
            Some(Metric::Rainfall) => Some(self.rainfall.range()),
            None => self.metric_rule(domain).map(MetricRule::range),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub fuzzy_threshold: u8,
    pub quality_threshold: f64,
    pub aliases: BTreeMap<Domain, AliasTable>,
    pub domain: DomainRules,
}

impl Default for RuleSet {
    fn default() -> Self {
        let aliases = [Domain::Production, Domain::Rainfall]
            .into_iter()
            .map(|domain| (domain, AliasTable::builtin(domain)))
            .collect();
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            aliases,
            domain: DomainRules::default(),
        }
    }
}

impl RuleSet {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening rules file {path:?}"))?;
        let reader = BufReader::new(file);
        let rules: RuleSet = serde_yaml::from_reader(reader).context("Parsing rules YAML")?;
        Ok(rules)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn alias_table(&self, domain: Domain) -> AliasTable {
        self.aliases
            .get(&domain)
            .cloned()
            .unwrap_or_else(|| AliasTable::builtin(domain))
    }
}
