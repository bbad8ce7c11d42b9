//! `key=value;` record tokenizer

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::value::CoercedValue;

/// One tokenized entity: field name to inferred value.
///
/// Field order carries no meaning; a `BTreeMap` keeps serialised output
/// stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, CoercedValue>);

impl Record {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Tokenize a line of the form `key1=value1;key2=value2;...;`
    ///
    /// Pieces without `=` or with an empty key are dropped. When a key
    /// repeats, the last occurrence wins. Never fails: garbage in yields an
    /// empty record.
    pub fn tokenize(line: &str) -> Self {
        let mut fields = BTreeMap::new();
        for piece in line.split(';') {
            let Some((key, value)) = piece.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            fields.insert(key.to_string(), CoercedValue::coerce(value));
        }
        Self(fields)
    }

    /// Look up a field. Missing fields read as `Absent`.
    pub fn get(&self, key: &str) -> &CoercedValue {
        static ABSENT: CoercedValue = CoercedValue::Absent;
        self.0.get(key).unwrap_or(&ABSENT)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, CoercedValue> {
        self.0.iter()
    }

    /// Overlay `other` onto this record; fields of `other` win.
    pub fn merge_from(&mut self, other: Record) {
        self.0.extend(other.0);
    }

    pub(crate) fn insert(&mut self, key: String, value: CoercedValue) {
        self.0.insert(key, value);
    }
}

impl FromIterator<(String, CoercedValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, CoercedValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a CoercedValue);
    type IntoIter = btree_map::Iter<'a, String, CoercedValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
