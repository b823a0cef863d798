//! Input and output plumbing for the CLI.
//!
//! Raw records are read from a JSON array, a `{"records": [...]}` API
//! envelope, or a delimited file whose header row supplies the field names.
//! The path `-` reads standard input or writes standard output. Input is
//! decoded with `encoding_rs`, defaulting to UTF-8.

use std::{
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use clap::ValueEnum;
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;
use serde_json::Value;

use crate::data::RawRecord;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';
const RECORDS_KEY: &str = "records";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum InputFormat {
    /// Pick from the file extension, or sniff the content for stdin.
    #[default]
    Auto,
    Json,
    Csv,
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

fn read_input_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if is_dash(path) {
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading records from stdin")?;
    } else {
        File::open(path)
            .with_context(|| format!("Opening input file {path:?}"))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading input file {path:?}"))?;
    }
    Ok(bytes)
}

fn detect_format(path: &Path, text: &str) -> InputFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => InputFormat::Json,
        Some(ext) if ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("tsv") => {
            InputFormat::Csv
        }
        _ => match text.trim_start().chars().next() {
            Some('[') | Some('{') => InputFormat::Json,
            _ => InputFormat::Csv,
        },
    }
}

/// Reads every record from `path` (or stdin for `-`).
pub fn read_raw_records(
    path: &Path,
    format: InputFormat,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<Vec<RawRecord>> {
    let bytes = read_input_bytes(path)?;
    let text = decode_bytes(&bytes, encoding)
        .with_context(|| format!("Decoding {path:?} as {}", encoding.name()))?;
    let format = match format {
        InputFormat::Auto => detect_format(path, &text),
        explicit => explicit,
    };
    match format {
        InputFormat::Csv => {
            parse_csv_records(&text, resolve_input_delimiter(path, delimiter))
                .with_context(|| format!("Parsing delimited records from {path:?}"))
        }
        _ => parse_json_records(&text)
            .with_context(|| format!("Parsing JSON records from {path:?}")),
    }
}

/// Accepts a bare array of objects or an object carrying a `records` array.
pub fn parse_json_records(text: &str) -> Result<Vec<RawRecord>> {
    let value: Value = serde_json::from_str(text).context("Invalid JSON")?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut envelope) => match envelope.remove(RECORDS_KEY) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => bail!("Expected '{RECORDS_KEY}' to be an array, found {other}"),
        },
        other => bail!("Expected an array of records, found {other}"),
    };
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(record) => Ok(record),
            other => Err(anyhow!("Record {} is not an object: {other}", idx + 1)),
        })
        .collect()
}

/// Header row supplies field names; empty cells become null.
pub fn parse_csv_records(text: &str, delimiter: u8) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .context("Reading header row")?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("Reading row {}", idx + 2))?;
        let mut record = RawRecord::new();
        for (header, field) in headers.iter().zip(row.iter()) {
            let value = if field.trim().is_empty() {
                Value::Null
            } else {
                Value::String(field.to_string())
            };
            record.insert(header.clone(), value);
        }
        records.push(record);
    }
    Ok(records)
}

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    })
}

/// Writer for canonical output. Headers are written by the caller.
pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(open_output(path)?))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = open_output(Some(path))?;
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Writing JSON to {path:?}"))?;
    writeln!(writer).with_context(|| format!("Writing JSON to {path:?}"))?;
    writer.flush().with_context(|| format!("Flushing {path:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn json_array_and_envelope_are_both_accepted() {
        let bare = parse_json_records(r#"[{"a": 1}, {"a": 2}]"#).unwrap();
        assert_eq!(bare.len(), 2);
        let envelope = parse_json_records(r#"{"total": 2, "records": [{"a": 1}]}"#).unwrap();
        assert_eq!(envelope.len(), 1);
        let empty = parse_json_records(r#"{"total": 0}"#).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn non_object_records_are_rejected() {
        let err = parse_json_records("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("Record 1 is not an object"));
        assert!(parse_json_records("42").is_err());
    }

    #[test]
    fn json_key_order_is_preserved() {
        let records = parse_json_records(r#"[{"zeta": 1, "alpha": 2}]"#).unwrap();
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn csv_cells_become_strings_or_null() {
        let records =
            parse_csv_records("state_name, crop_year,area_\nPunjab,2001,\n", b',').unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["state_name"], Value::String("Punjab".into()));
        assert_eq!(records[0]["crop_year"], Value::String("2001".into()));
        assert_eq!(records[0]["area_"], Value::Null);
    }

    #[test]
    fn format_is_detected_from_extension_then_content() {
        assert_eq!(detect_format(&PathBuf::from("a.json"), "x"), InputFormat::Json);
        assert_eq!(detect_format(&PathBuf::from("a.TSV"), "["), InputFormat::Csv);
        assert_eq!(detect_format(&PathBuf::from("-"), "  [{}]"), InputFormat::Json);
        assert_eq!(detect_format(&PathBuf::from("-"), "a,b\n1,2"), InputFormat::Csv);
    }

    #[test]
    fn latin1_input_is_decoded() {
        let encoding = resolve_encoding(Some("latin1")).unwrap();
        let text = decode_bytes(&[0x4f, 0x72, 0x69, 0x73, 0x73, 0x61, 0xe9], encoding).unwrap();
        assert_eq!(text, "Orissaé");
        assert!(resolve_encoding(Some("klingon")).is_err());
    }
}
