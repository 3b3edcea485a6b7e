//! Operator layer declarations.
//!
//! Layers arrive as `;`-separated lists of `:`-separated tuples:
//! `name:weight:polarity` for attractors and `name:threshold` for constraints
//! (including the single current-development layer). Extra metadata
//! parameters use `name:value`, and the optional alias table uses
//! `declared=file_key`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{SetupError, SetupResult};
use crate::normalizer::normalize;

const ENTRY_SEPARATOR: char = ';';
const FIELD_SEPARATOR: char = ':';
const ALIAS_SEPARATOR: char = '=';

/// One declared semantic layer.
///
/// For attractors `value` is the weight and `flag` the reverse-polarity flag.
/// For constraints `value` is the threshold and `flag` the current-development
/// flag (0 for regular constraints, 1 for the current-development layer).
/// `declared` keeps the value exactly as written, for the manifests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub name: String,
    pub value: f64,
    pub declared: String,
    pub flag: u8,
}

/// `name:value` pair appended to the merged metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtraParameter {
    pub name: String,
    pub value: String,
}

/// Declared name -> alternative normalised file keys.
///
/// Keys and values are stored lower-cased so lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayerAliases {
    aliases: BTreeMap<String, Vec<String>>,
}

impl LayerAliases {
    pub fn insert(&mut self, declared: &str, file_key: &str) {
        self.aliases
            .entry(declared.to_lowercase())
            .or_default()
            .push(file_key.to_lowercase());
    }

    /// Alternative keys registered for `declared` (empty when none).
    pub fn for_name(&self, declared: &str) -> &[String] {
        self.aliases
            .get(&declared.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

fn entries(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(ENTRY_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

fn validate_name(name: &str, entry: &str) -> SetupResult<String> {
    if name.is_empty() {
        return Err(SetupError::Config(format!(
            "layer declaration '{entry}' has an empty name"
        )));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(SetupError::Config(format!(
            "layer name '{name}' may only contain letters, digits, '_' and '-'"
        )));
    }
    Ok(name.to_string())
}

fn parse_number(field: &str, what: &str, entry: &str) -> SetupResult<f64> {
    match field.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(SetupError::Config(format!(
            "{what} '{field}' in '{entry}' is not a finite number"
        ))),
    }
}

fn split_fields(entry: &str, expected: usize, shape: &str) -> SetupResult<Vec<String>> {
    let fields: Vec<String> = entry
        .split(FIELD_SEPARATOR)
        .map(|f| f.trim().to_string())
        .collect();
    if fields.len() != expected {
        return Err(SetupError::Config(format!(
            "declaration '{entry}' should have the form {shape}"
        )));
    }
    Ok(fields)
}

/// Parse `name:weight:polarity;...`. All three fields are mandatory.
pub fn parse_attractors(raw: &str) -> SetupResult<Vec<LayerSpec>> {
    entries(raw)
        .map(|entry| {
            let fields = split_fields(entry, 3, "name:weight:polarity")?;
            let name = validate_name(&fields[0], entry)?;
            let weight = parse_number(&fields[1], "weight", entry)?;
            let flag = match fields[2].as_str() {
                "0" => 0,
                "1" => 1,
                other => {
                    return Err(SetupError::Config(format!(
                        "polarity '{other}' in '{entry}' must be 0 or 1"
                    )));
                }
            };
            Ok(LayerSpec {
                name,
                value: weight,
                declared: fields[1].clone(),
                flag,
            })
        })
        .collect()
}

fn parse_constraint(entry: &str, flag: u8) -> SetupResult<LayerSpec> {
    let fields = split_fields(entry, 2, "name:threshold")?;
    let name = validate_name(&fields[0], entry)?;
    let threshold = parse_number(&fields[1], "threshold", entry)?;
    if threshold < 0.0 {
        return Err(SetupError::Config(format!(
            "threshold in '{entry}' must not be negative"
        )));
    }
    Ok(LayerSpec {
        name,
        value: threshold,
        declared: fields[1].clone(),
        flag,
    })
}

/// Parse `name:threshold;...` for the regular constraint layers.
pub fn parse_constraints(raw: &str) -> SetupResult<Vec<LayerSpec>> {
    entries(raw)
        .map(|entry| parse_constraint(entry, 0))
        .collect()
}

/// Parse the single `name:threshold` current-development declaration.
pub fn parse_current_development(raw: &str) -> SetupResult<LayerSpec> {
    let mut declared = entries(raw);
    let entry = declared.next().ok_or_else(|| {
        SetupError::Config("current development layer declaration is empty".into())
    })?;
    if declared.next().is_some() {
        return Err(SetupError::Config(format!(
            "exactly one current development layer may be declared, got '{raw}'"
        )));
    }
    parse_constraint(entry, 1)
}

/// Parse `name:value;...` extra metadata parameters.
pub fn parse_extra_parameters(raw: &str) -> SetupResult<Vec<ExtraParameter>> {
    entries(raw)
        .map(|entry| {
            let (name, value) = entry.split_once(FIELD_SEPARATOR).ok_or_else(|| {
                SetupError::Config(format!("extra parameter '{entry}' should be name:value"))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(SetupError::Config(format!(
                    "extra parameter '{entry}' has an empty name"
                )));
            }
            Ok(ExtraParameter {
                name: name.to_string(),
                value: value.trim().to_string(),
            })
        })
        .collect()
}

/// Parse `declared=file_key;...` resolver aliases. Keys go through the same
/// normalisation as discovered files, so `major_roads_clip.asc` is accepted.
pub fn parse_aliases(raw: &str) -> SetupResult<LayerAliases> {
    let mut aliases = LayerAliases::default();
    for entry in entries(raw) {
        let (declared, key) = entry.split_once(ALIAS_SEPARATOR).ok_or_else(|| {
            SetupError::Config(format!("alias '{entry}' should be declared=file_key"))
        })?;
        let declared = validate_name(declared.trim(), entry)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(SetupError::Config(format!("alias '{entry}' has an empty key")));
        }
        aliases.insert(&declared, &normalize(key));
    }
    Ok(aliases)
}
