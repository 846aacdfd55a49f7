//! Raw configuration tree
//!
//! A `RawTree` is one level of a JSON object: field names mapped to
//! fragments whose content has not been decoded yet. Nested objects are
//! only decoded when a path walks through them.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

use crate::error::{Error, Result};

/// An undecoded piece of the configuration tree
pub type RawFragment = Box<RawValue>;

/// One level of a JSON object with lazily decoded values
#[derive(Debug, Clone, Default)]
pub struct RawTree {
    fields: HashMap<String, RawFragment>,
}

impl RawTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the top level of a JSON document
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        let fields = serde_json::from_slice(bytes)?;
        Ok(Self { fields })
    }

    /// Decode a fragment as the next mapping level
    ///
    /// `path` is used for error context only.
    pub fn from_fragment(fragment: &RawValue, path: &str) -> Result<Self> {
        let fields = decode(fragment, path, "mapping")?;
        Ok(Self { fields })
    }

    /// Look up the undecoded fragment for a field
    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name).map(|fragment| fragment.as_ref())
    }

    /// Field names at this level (unordered)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields at this level
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if this level has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Decode a fragment into `T`, reporting failures as `Decode` errors
pub(crate) fn decode<T: DeserializeOwned>(
    fragment: &RawValue,
    path: &str,
    expected: &str,
) -> Result<T> {
    serde_json::from_str(fragment.get()).map_err(|e| Error::decode(path, expected, e))
}

/// Decode a fragment as a sequence and take the element at `index`
pub(crate) fn decode_element<T: DeserializeOwned>(
    fragment: &RawValue,
    index: usize,
    path: &str,
    expected: &str,
) -> Result<T> {
    let items: Vec<T> = decode(fragment, path, &format!("sequence of {}", expected))?;
    let len = items.len();
    items
        .into_iter()
        .nth(index)
        .ok_or_else(|| Error::index_out_of_range(path, index, len))
}
