//! Collection-keyed datasets for the multi-record validators, plus field
//! accessors for plain JSON records.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::predicates::parse_date;
use crate::error::CoreError;
use crate::types::Record;

/// Collection name → records, e.g. `{ "routes": [...], "sites": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    collections: BTreeMap<String, Vec<Record>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from a JSON object of arrays of objects.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let Value::Object(map) = value else {
            return Err(CoreError::Validation(
                "Dataset must be a JSON object keyed by collection name".into(),
            ));
        };
        let mut dataset = Self::new();
        for (name, records) in map {
            let Value::Array(items) = records else {
                return Err(CoreError::Validation(format!(
                    "Collection '{name}' must be an array"
                )));
            };
            let mut parsed = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                match item {
                    Value::Object(record) => parsed.push(record),
                    _ => {
                        return Err(CoreError::Validation(format!(
                            "Record {index} of '{name}' must be an object"
                        )))
                    }
                }
            }
            dataset.collections.insert(name, parsed);
        }
        Ok(dataset)
    }

    pub fn with_collection(mut self, name: impl Into<String>, records: Vec<Record>) -> Self {
        self.insert(name, records);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, records: Vec<Record>) {
        self.collections.insert(name.into(), records);
    }

    /// The named collection, `None` when the key is absent.
    pub fn collection(&self, name: &str) -> Option<&[Record]> {
        self.collections.get(name).map(Vec::as_slice)
    }

    /// The named collection, empty when the key is absent.
    pub fn records(&self, name: &str) -> &[Record] {
        self.collection(name).unwrap_or(&[])
    }

    /// Present and holding at least one record.
    pub fn has_records(&self, name: &str) -> bool {
        !self.records(name).is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Record accessors
// ---------------------------------------------------------------------------

/// Canonical string form of an id value (`5` and `"5"` are the same id).
pub fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn record_id(record: &Record) -> Option<String> {
    record.get("id").and_then(id_key)
}

/// Short label for messages: `"id 5"` or `"record #3"`.
pub fn record_label(record: &Record, index: usize) -> String {
    match record_id(record) {
        Some(id) => format!("id {id}"),
        None => format!("record #{index}"),
    }
}

pub fn str_field<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

pub fn number_field(record: &Record, key: &str) -> Option<f64> {
    record.get(key).and_then(Value::as_f64)
}

pub fn date_field(record: &Record, key: &str) -> Option<NaiveDate> {
    str_field(record, key).and_then(parse_date)
}
