//! Field-name resolution from observed source columns to canonical names.
//!
//! Each canonical field is resolved independently, first match wins:
//! memoized decision for the same observed schema, exact name, alias table
//! (in declared order), then fuzzy similarity above the threshold.
//!
//! The memo lives on the mapper instance. A mapper is not shareable across
//! threads for mutation; wrap it in a `Mutex` when one instance must serve
//! concurrent requests.

use std::collections::HashMap;

use log::debug;
use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value};

use crate::{
    data::RawRecord,
    error::MappingError,
    rules::{AliasTable, Domain, RuleSet},
    similarity::{FuzzScorer, Similarity},
};

/// Canonical name → observed column name, in resolution order. Unresolved
/// fields are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<(String, String)>,
}

impl FieldMapping {
    pub fn insert(&mut self, canonical: &str, actual: &str) {
        match self.entries.iter_mut().find(|(name, _)| name == canonical) {
            Some(entry) => entry.1 = actual.to_string(),
            None => self
                .entries
                .push((canonical.to_string(), actual.to_string())),
        }
    }

    pub fn get(&self, canonical: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == canonical)
            .map(|(_, actual)| actual.as_str())
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.get(canonical).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(canonical, actual)| (canonical.as_str(), actual.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FieldMapping {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (canonical, actual) in &self.entries {
            map.serialize_entry(canonical, actual)?;
        }
        map.end()
    }
}

/// Difference between the columns a source actually sent and the columns
/// expected of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDrift {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
    /// `(expected, observed)` pairs judged to be the same field renamed.
    pub renamed: Vec<(String, String)>,
}

impl SchemaDrift {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.renamed.is_empty()
    }
}

/// Raw rows projected onto canonical field names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedTable {
    columns: Vec<String>,
    rows: Vec<RawRecord>,
}

impl MappedTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[RawRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, canonical: &str) -> bool {
        self.columns.iter().any(|column| column == canonical)
    }

    pub fn value(&self, row: usize, canonical: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|record| record.get(canonical))
    }
}

pub struct FieldMapper<S = FuzzScorer> {
    aliases: AliasTable,
    scorer: S,
    threshold: u8,
    memo: HashMap<String, HashMap<String, String>>,
}

impl FieldMapper<FuzzScorer> {
    pub fn new(aliases: AliasTable, threshold: u8) -> Self {
        Self::with_scorer(aliases, FuzzScorer, threshold)
    }

    pub fn for_domain(domain: Domain, rules: &RuleSet) -> Self {
        Self::new(rules.alias_table(domain), rules.fuzzy_threshold)
    }
}

impl<S: Similarity> FieldMapper<S> {
    pub fn with_scorer(aliases: AliasTable, scorer: S, threshold: u8) -> Self {
        Self {
            aliases,
            scorer,
            threshold,
            memo: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Number of memoized `(schema, field)` decisions.
    pub fn memo_len(&self) -> usize {
        self.memo.values().map(HashMap::len).sum()
    }

    pub fn map_fields(
        &mut self,
        observed: &[String],
        canonical_fields: &[&str],
        strict: bool,
    ) -> Result<FieldMapping, MappingError> {
        let mut mapping = FieldMapping::default();
        if observed.is_empty() {
            return Ok(mapping);
        }
        let fingerprint = schema_fingerprint(observed);

        for &canonical in canonical_fields {
            let remembered = self
                .memo
                .get(&fingerprint)
                .and_then(|decisions| decisions.get(canonical))
                .filter(|actual| observed.contains(*actual))
                .cloned();
            if let Some(actual) = remembered {
                mapping.insert(canonical, &actual);
                continue;
            }

            let resolved = self.resolve(canonical, observed);
            match resolved {
                Some((actual, method)) => {
                    debug!("Resolved '{canonical}' to '{actual}' via {method}");
                    mapping.insert(canonical, &actual);
                    self.memo
                        .entry(fingerprint.clone())
                        .or_default()
                        .insert(canonical.to_string(), actual);
                }
                None if strict => {
                    return Err(MappingError::RequiredFieldNotFound {
                        field: canonical.to_string(),
                        available: observed.to_vec(),
                    });
                }
                None => debug!("Field '{canonical}' left unresolved"),
            }
        }
        Ok(mapping)
    }

    fn resolve(&self, canonical: &str, observed: &[String]) -> Option<(String, &'static str)> {
        if observed.iter().any(|column| column == canonical) {
            return Some((canonical.to_string(), "exact match"));
        }
        if let Some(alias) = self
            .aliases
            .aliases(canonical)
            .iter()
            .find(|alias| observed.contains(*alias))
        {
            return Some((alias.clone(), "alias"));
        }
        self.fuzzy_match(canonical, observed)
            .map(|candidate| (candidate.to_string(), "fuzzy match"))
    }

    fn fuzzy_match<'a>(&self, target: &str, candidates: &'a [String]) -> Option<&'a str> {
        let mut best_score = 0u8;
        let mut best_match = None;
        for candidate in candidates {
            let score = self.scorer.score(target, candidate);
            if score > best_score && score >= self.threshold {
                best_score = score;
                best_match = Some(candidate.as_str());
            }
        }
        best_match
    }

    /// Compares observed against expected columns and pairs up likely
    /// renames; a pair is accepted when its similarity meets the threshold.
    pub fn detect_schema_drift(&self, observed: &[String], expected: &[&str]) -> SchemaDrift {
        let mut missing: Vec<String> = Vec::new();
        for &name in expected {
            if !observed.iter().any(|column| column == name)
                && !missing.iter().any(|seen| seen == name)
            {
                missing.push(name.to_string());
            }
        }
        let mut extra: Vec<String> = Vec::new();
        for column in observed {
            if !expected.contains(&column.as_str()) && !extra.contains(column) {
                extra.push(column.clone());
            }
        }

        let mut renamed = Vec::new();
        let mut idx = 0;
        while idx < missing.len() {
            let partner = extra.iter().position(|candidate| {
                self.scorer.score(&missing[idx], candidate) >= self.threshold
            });
            match partner {
                Some(extra_idx) => {
                    let expected_name = missing.remove(idx);
                    let observed_name = extra.remove(extra_idx);
                    renamed.push((expected_name, observed_name));
                }
                None => idx += 1,
            }
        }

        SchemaDrift {
            missing,
            extra,
            renamed,
        }
    }
}

/// Projects `records` onto the canonical names present in `mapping`.
/// Unmapped source columns are dropped; a record lacking a mapped column
/// gets a null in that position.
pub fn apply_mapping(records: &[RawRecord], mapping: &FieldMapping) -> MappedTable {
    let columns: Vec<String> = mapping
        .iter()
        .map(|(canonical, _)| canonical.to_string())
        .collect();
    let rows = records
        .iter()
        .map(|record| {
            let mut projected = Map::new();
            for (canonical, actual) in mapping.iter() {
                let value = record.get(actual).cloned().unwrap_or(Value::Null);
                projected.insert(canonical.to_string(), value);
            }
            projected
        })
        .collect();
    MappedTable { columns, rows }
}

fn schema_fingerprint(observed: &[String]) -> String {
    let mut sorted: Vec<&str> = observed.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join("\u{1f}")
}
