//! Turning OCR key/value bags into canonical policy fields.

mod fields;
mod locator;
pub mod normalizer;

pub use fields::{CanonicalPolicyFields, FieldKind, PolicyField};
pub use locator::{locate, CandidateKeyTable, FreeTextField};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw strings extracted from one uploaded document, keyed by whatever name
/// the upstream producer used (`vehiculo.marca`, `vehiculoMarca`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedFieldSet {
    values: BTreeMap<String, String>,
}

impl ExtractedFieldSet {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Flatten arbitrary JSON into dotted keys: nested objects become
    /// `parent.child`, arrays `parent[0]`. Nulls are dropped.
    pub fn from_json(value: &Value) -> Self {
        let mut values = BTreeMap::new();
        flatten_into(&mut values, String::new(), value);
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExtractedFieldSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn flatten_into(values: &mut BTreeMap<String, String>, prefix: String, value: &Value) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(values, path, child);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(values, format!("{prefix}[{index}]"), child);
            }
        }
        Value::String(text) => {
            values.insert(prefix, text.clone());
        }
        Value::Bool(flag) => {
            values.insert(prefix, flag.to_string());
        }
        Value::Number(number) => {
            values.insert(prefix, number.to_string());
        }
    }
}
