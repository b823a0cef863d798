use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    cache::DEFAULT_TTL_HOURS,
    data::RawRecord,
    io_utils::{self, InputFormat},
    rules::Domain,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Map, normalize and quality-score drifting crop and rainfall records",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Normalize raw records into a canonical CSV table
    Normalize(NormalizeArgs),
    /// Show how observed columns resolve to canonical field names
    Map(MapArgs),
    /// Compare observed columns against an expected column list
    Drift(DriftArgs),
    /// Fetch a dataset through the cache and normalize it
    Fetch(FetchArgs),
    /// Inspect or empty the response cache
    Cache(CacheArgs),
}

/// Canonical table to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Dataset {
    Production,
    Rainfall,
    /// Sub-division rainfall averaged per state and year
    StateRainfall,
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Raw records: JSON array, {"records": [...]} envelope, or CSV ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Input format (auto-detected by default)
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    pub format: InputFormat,
    /// Delimiter for CSV input (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

impl InputArgs {
    pub fn read_records(&self) -> Result<Vec<RawRecord>> {
        let encoding = io_utils::resolve_encoding(self.input_encoding.as_deref())?;
        io_utils::read_raw_records(&self.input, self.format, self.delimiter, encoding)
    }
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter for CSV output
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Write the quality report as JSON to this path
    #[arg(long = "report")]
    pub report: Option<PathBuf>,
    /// Print the first N canonical rows as a table on stderr
    #[arg(long = "preview")]
    pub preview: Option<usize>,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub output: OutputArgs,
    /// Canonical table to produce
    #[arg(short = 'd', long = "dataset", value_enum)]
    pub dataset: Dataset,
    /// YAML rules overriding aliases, thresholds and domain ranges
    #[arg(long = "rules")]
    pub rules: Option<PathBuf>,
    /// Skip quality scoring and filtering
    #[arg(long = "no-validate")]
    pub no_validate: bool,
    /// Keep state and crop names as spelled in the source
    #[arg(long = "no-canonicalize")]
    pub no_canonicalize: bool,
    /// Fail mapping on any unresolved field (production falls back to static renames)
    #[arg(long)]
    pub strict: bool,
    /// Month columns to sum for rainfall, comma separated
    #[arg(long = "months", value_delimiter = ',')]
    pub months: Vec<String>,
    /// Last year covered, for the confidence recency factor
    #[arg(long = "year-end")]
    pub year_end: Option<i32>,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Field vocabulary to resolve
    #[arg(long, value_enum, default_value_t = Domain::Production)]
    pub domain: Domain,
    /// Canonical fields to resolve instead of the domain vocabulary
    #[arg(long = "fields", value_delimiter = ',')]
    pub fields: Vec<String>,
    /// YAML rules overriding aliases and the fuzzy threshold
    #[arg(long = "rules")]
    pub rules: Option<PathBuf>,
    /// Fail when any field cannot be resolved
    #[arg(long)]
    pub strict: bool,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct DriftArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Domain whose canonical fields are expected when --expected is omitted
    #[arg(long, value_enum, default_value_t = Domain::Production)]
    pub domain: Domain,
    /// Expected column names, comma separated
    #[arg(long = "expected", value_delimiter = ',')]
    pub expected: Vec<String>,
    /// YAML rules overriding the fuzzy threshold
    #[arg(long = "rules")]
    pub rules: Option<PathBuf>,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Directory holding `<resource_id>.json` files
    #[arg(long = "source")]
    pub source: PathBuf,
    #[arg(short = 'd', long = "dataset", value_enum)]
    pub dataset: Dataset,
    #[command(flatten)]
    pub output: OutputArgs,
    #[command(flatten)]
    pub cache: CacheLocation,
    /// Bypass the cache entirely
    #[arg(long = "no-cache")]
    pub no_cache: bool,
    /// Entry lifetime in hours
    #[arg(long = "ttl-hours", default_value_t = DEFAULT_TTL_HOURS)]
    pub ttl_hours: u32,
    #[arg(long = "rules")]
    pub rules: Option<PathBuf>,
    #[arg(long)]
    pub state: Option<String>,
    #[arg(long)]
    pub district: Option<String>,
    #[arg(long)]
    pub year: Option<i64>,
    #[arg(long)]
    pub crop: Option<String>,
    #[arg(long)]
    pub season: Option<String>,
    #[arg(long)]
    pub subdivision: Option<String>,
    #[arg(long = "year-start")]
    pub year_start: Option<i64>,
    #[arg(long = "year-end")]
    pub year_end: Option<i64>,
}

#[derive(Debug, Args)]
pub struct CacheLocation {
    /// Cache directory
    #[arg(long = "cache-dir", default_value = ".cache")]
    pub cache_dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Entry count and total size
    Stats(CacheLocation),
    /// Remove every entry
    Clear(CacheLocation),
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
