//! The neutral content model shared by host-original and patch documents.
//!
//! A [`ContentDocument`] is an ordered list of [`Entry`] values. Each entry has a
//! stable key (conversation title + entry id, object path, table field id, ...)
//! and an ordered list of named [`Field`]s holding string values. Codecs in
//! [`crate::codec`] translate host-native formats to and from this shape.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "entries": [
//!     { "key": "Intro#1", "fields": [{ "name": "Dialogue Text", "value": "Hello" }] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single named string value on an [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A keyed group of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Entry {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style helper for appending a field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field::new(name, value));
        self
    }

    /// Value of the first field called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// An ordered collection of entries.
///
/// Order is significant: some hosts display content in document order, so every
/// transformation in this crate preserves it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDocument {
    #[serde(default)]
    pub entries: Vec<Entry>,
}

impl ContentDocument {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// First entry with the given key. Linear; use [`index`](Self::index) for
    /// repeated lookups.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Build a key -> entry position lookup.
    ///
    /// On duplicate keys the last occurrence wins.
    pub fn index(&self) -> HashMap<&str, usize> {
        let mut index = HashMap::with_capacity(self.entries.len());
        for (pos, entry) in self.entries.iter().enumerate() {
            index.insert(entry.key.as_str(), pos);
        }
        index
    }

    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}
