//! Raw record boundary and scalar coercion.
//!
//! Records arrive from the fetch layer as loosely-typed JSON objects whose
//! keys drift between calls. This module is the only place that looks at
//! them as untyped values; everything downstream works on canonical rows.

use serde_json::{Map, Value};

/// One record as delivered by the data source. Key order is the order the
/// source emitted the fields in.
pub type RawRecord = Map<String, Value>;

/// Union of field names across `records`, in first-seen order.
pub fn observed_columns(records: &[RawRecord]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|existing| existing == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

pub fn parse_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Integers are accepted from integral floats (`1990.0`) and numeric strings
/// as well as JSON integers.
pub fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(integral_float)),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(integral_float))
        }
        _ => None,
    }
}

fn integral_float(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64)
        .then_some(value as i64)
}

/// Trimmed text for a string field; null and absent become the empty string.
pub fn coerce_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

pub fn coerce_float(value: Option<&Value>) -> Option<f64> {
    value.and_then(parse_float)
}

pub fn coerce_integer(value: Option<&Value>) -> Option<i64> {
    value.and_then(parse_integer)
}

/// Case-insensitive lookup of a column name in `columns`.
pub fn find_column_ci<'a>(columns: &'a [String], wanted: &str) -> Option<&'a str> {
    columns
        .iter()
        .find(|column| column.trim().eq_ignore_ascii_case(wanted))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn observed_columns_keeps_first_seen_order() {
        let records = vec![
            record(json!({"state_name": "Punjab", "crop_year": 2001})),
            record(json!({"crop_year": 2002, "district_name": "Ludhiana"})),
        ];
        assert_eq!(
            observed_columns(&records),
            vec!["state_name", "crop_year", "district_name"]
        );
    }

    #[test]
    fn parse_integer_accepts_integral_floats_and_strings() {
        assert_eq!(parse_integer(&json!(1990)), Some(1990));
        assert_eq!(parse_integer(&json!(1990.0)), Some(1990));
        assert_eq!(parse_integer(&json!(" 2004 ")), Some(2004));
        assert_eq!(parse_integer(&json!("2004.0")), Some(2004));
        assert_eq!(parse_integer(&json!(1990.5)), None);
        assert_eq!(parse_integer(&json!("1997-98")), None);
        assert_eq!(parse_integer(&Value::Null), None);
    }

    #[test]
    fn parse_float_rejects_non_numeric_and_non_finite() {
        assert_eq!(parse_float(&json!("12.5")), Some(12.5));
        assert_eq!(parse_float(&json!(3)), Some(3.0));
        assert_eq!(parse_float(&json!("NA")), None);
        assert_eq!(parse_float(&json!("inf")), None);
        assert_eq!(parse_float(&json!(true)), None);
    }

    #[test]
    fn coerce_text_trims_and_defaults_null_to_empty() {
        assert_eq!(coerce_text(Some(&json!("  Kerala "))), "Kerala");
        assert_eq!(coerce_text(Some(&Value::Null)), "");
        assert_eq!(coerce_text(None), "");
        assert_eq!(coerce_text(Some(&json!(42))), "42");
    }

    #[test]
    fn find_column_ci_matches_regardless_of_case() {
        let columns = vec!["JAN".to_string(), "Feb".to_string()];
        assert_eq!(find_column_ci(&columns, "jan"), Some("JAN"));
        assert_eq!(find_column_ci(&columns, "mar"), None);
    }
}
