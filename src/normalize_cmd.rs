use anyhow::{Context, Result, anyhow};
use log::{info, warn};

use crate::{
    cache::DataCache,
    canonical::{CanonicalRecord, CanonicalTable},
    cli::{Dataset, FetchArgs, NormalizeArgs, OutputArgs},
    confidence::{Assessed, ConfidenceContext, calculate_confidence},
    connector::{Connector, DirectorySource, ProductionQuery, RainfallQuery},
    io_utils::{self, DEFAULT_CSV_DELIMITER},
    mappings::EntityTables,
    normalize::{
        NormalizeOptions, ProductionNormalizer, RainfallNormalizer, aggregate_rainfall_to_state,
    },
    rules::RuleSet,
    table::TextTable,
};

pub fn execute(args: &NormalizeArgs) -> Result<()> {
    let rules = RuleSet::load_or_default(args.rules.as_deref())?;
    let records = args.input.read_records()?;
    info!(
        "Normalizing {} raw record(s) from {:?} as {:?}",
        records.len(),
        args.input.input,
        args.dataset
    );
    let options = NormalizeOptions {
        validate: !args.no_validate,
        canonicalize_names: !args.no_canonicalize,
        strict_mapping: args.strict,
        quality_threshold: rules.quality_threshold,
    };
    let context = match args.year_end {
        Some(year_end) => ConfidenceContext::ending(year_end),
        None => ConfidenceContext::default(),
    };
    let entities = EntityTables::builtin();

    match args.dataset {
        Dataset::Production => {
            let table = ProductionNormalizer::new(&rules, entities)
                .with_options(options)
                .normalize(&records);
            emit(&table, &args.output, &[&table], &context)
        }
        Dataset::Rainfall | Dataset::StateRainfall => {
            let mut normalizer = RainfallNormalizer::new(&rules).with_options(options);
            if !args.months.is_empty() {
                normalizer = normalizer.with_month_columns(args.months.clone());
            }
            let table = normalizer.normalize(&records);
            if args.dataset == Dataset::Rainfall {
                emit(&table, &args.output, &[&table], &context)
            } else {
                let states = aggregate_rainfall_to_state(&table, &entities.subdivisions);
                emit_unscored(&states, &table, &args.output, &context)
            }
        }
    }
}

pub fn fetch(args: &FetchArgs) -> Result<()> {
    let rules = RuleSet::load_or_default(args.rules.as_deref())?;
    let cache = if args.no_cache {
        None
    } else {
        Some(DataCache::with_ttl_hours(&args.cache.cache_dir, args.ttl_hours)?)
    };
    let source = DirectorySource::new(&args.source);
    let mut connector = Connector::new(source, cache, &rules, EntityTables::builtin());
    let year_end = args.year_end.or(args.year);
    let context = match year_end.and_then(|year| i32::try_from(year).ok()) {
        Some(year_end) => ConfidenceContext::ending(year_end),
        None => ConfidenceContext::default(),
    };

    match args.dataset {
        Dataset::Production => {
            let query = ProductionQuery {
                state: args.state.clone(),
                district: args.district.clone(),
                year: args.year,
                crop: args.crop.clone(),
                season: args.season.clone(),
            };
            let table = connector.fetch_production(&query)?;
            emit(&table, &args.output, &[&table], &context)
        }
        Dataset::Rainfall => {
            let query = RainfallQuery {
                year_start: args.year_start,
                year_end: args.year_end,
                subdivision: args.subdivision.clone(),
            };
            let table = connector.fetch_rainfall(&query)?;
            emit(&table, &args.output, &[&table], &context)
        }
        Dataset::StateRainfall => {
            let state = args
                .state
                .as_deref()
                .ok_or_else(|| anyhow!("--state is required for the state-rainfall dataset"))?;
            let table = connector.fetch_rainfall_by_state(state, args.year_start, args.year_end)?;
            emit(&table, &args.output, &[&table], &context)
        }
    }
}

/// Emits a table derived from a scored source table; the source's report is
/// the one written out.
fn emit_unscored<R, S>(
    table: &CanonicalTable<R>,
    source: &CanonicalTable<S>,
    output: &OutputArgs,
    context: &ConfidenceContext,
) -> Result<()>
where
    R: CanonicalRecord,
    S: CanonicalRecord,
{
    write_outputs(table, source, output)?;
    log_confidence(&[source], context);
    Ok(())
}

fn emit<R: CanonicalRecord>(
    table: &CanonicalTable<R>,
    output: &OutputArgs,
    assessed: &[&dyn Assessed],
    context: &ConfidenceContext,
) -> Result<()> {
    write_outputs(table, table, output)?;
    log_confidence(assessed, context);
    Ok(())
}

fn write_outputs<R, S>(
    table: &CanonicalTable<R>,
    scored: &CanonicalTable<S>,
    output: &OutputArgs,
) -> Result<()>
where
    R: CanonicalRecord,
    S: CanonicalRecord,
{
    let delimiter = output.output_delimiter.unwrap_or(DEFAULT_CSV_DELIMITER);
    let mut writer = io_utils::open_csv_writer(output.output.as_deref(), delimiter)?;
    table
        .write_csv(&mut writer)
        .with_context(|| format!("Writing {} canonical row(s)", table.len()))?;
    info!("Wrote {} {} row(s)", table.len(), table.domain());

    match (scored.quality_report(), &output.report) {
        (Some(report), Some(path)) => {
            io_utils::write_json(path, report)
                .with_context(|| format!("Writing quality report to {path:?}"))?;
            info!("Quality report written to {path:?}");
        }
        (None, Some(path)) => warn!("No quality report was produced; {path:?} not written"),
        _ => {}
    }
    if let Some(report) = scored.quality_report() {
        info!("Quality: {report}");
    }

    if let Some(limit) = output.preview {
        let rows = table.display_rows().into_iter().take(limit).collect();
        let preview = TextTable::new(table.column_names()).with_rows(rows);
        eprint!("{}", preview.render());
    }
    Ok(())
}

fn log_confidence(assessed: &[&dyn Assessed], context: &ConfidenceContext) {
    let confidence = calculate_confidence(assessed, context);
    info!("Confidence: {confidence:.2}");
}
