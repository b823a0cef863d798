use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{DriftArgs, MapArgs},
    data::observed_columns,
    mapper::FieldMapper,
    rules::RuleSet,
    table::TextTable,
};

const UNRESOLVED: &str = "(unresolved)";

pub fn map(args: &MapArgs) -> Result<()> {
    let rules = RuleSet::load_or_default(args.rules.as_deref())?;
    let records = args.input.read_records()?;
    let observed = observed_columns(&records);
    info!(
        "Resolving {} field(s) against {} observed column(s) from {:?}",
        args.domain,
        observed.len(),
        args.input.input
    );

    let fields: Vec<&str> = if args.fields.is_empty() {
        args.domain.canonical_fields()
    } else {
        args.fields.iter().map(|field| field.trim()).collect()
    };
    let mut mapper = FieldMapper::for_domain(args.domain, &rules);
    let mapping = mapper.map_fields(&observed, &fields, args.strict)?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&mapping).context("Serializing field mapping")?
        );
        return Ok(());
    }
    let mut table = TextTable::new(["canonical", "column"]);
    for field in &fields {
        table.push_row([*field, mapping.get(field).unwrap_or(UNRESOLVED)]);
    }
    table.print();
    info!("Resolved {}/{} field(s)", mapping.len(), fields.len());
    Ok(())
}

pub fn drift(args: &DriftArgs) -> Result<()> {
    let rules = RuleSet::load_or_default(args.rules.as_deref())?;
    let records = args.input.read_records()?;
    let observed = observed_columns(&records);
    let expected: Vec<&str> = if args.expected.is_empty() {
        args.domain.canonical_fields()
    } else {
        args.expected.iter().map(|column| column.trim()).collect()
    };

    let mapper = FieldMapper::for_domain(args.domain, &rules);
    let drift = mapper.detect_schema_drift(&observed, &expected);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&drift).context("Serializing drift report")?
        );
        return Ok(());
    }
    let mut table = TextTable::new(["change", "expected", "observed"]);
    for (was, now) in &drift.renamed {
        table.push_row(["renamed", was.as_str(), now.as_str()]);
    }
    for column in &drift.missing {
        table.push_row(["missing", column.as_str(), ""]);
    }
    for column in &drift.extra {
        table.push_row(["extra", "", column.as_str()]);
    }
    table.print();
    if drift.is_clean() {
        info!("No schema drift detected");
    }
    Ok(())
}
