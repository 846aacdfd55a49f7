//! Configuration documents and typed accessors
//!
//! A `Document` is one immutable snapshot of a configuration source. Values
//! are decoded on first access and cached under the canonical form of their
//! path, so `a . b[ 0 ]` and `a.b[0]` share one cache entry.
//!
//! The cache is keyed by path only. Reading a path as one type and later as
//! another fails with `ErrorKind::TypeMismatch`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

use crate::error::{Error, Result};
use crate::fileutil;
use crate::path::{PathExpression, PathResolver};
use crate::tree::{self, RawFragment, RawTree};

/// A decoded value as stored in a document's cache
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    String(String),
    Int(i64),
    Float(f32),
    Bool(bool),
    StringSeq(Vec<String>),
    IntSeq(Vec<i64>),
    FloatSeq(Vec<f32>),
    BoolSeq(Vec<bool>),
}

impl CachedValue {
    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            CachedValue::String(_) => String::TYPE_NAME,
            CachedValue::Int(_) => i64::TYPE_NAME,
            CachedValue::Float(_) => f32::TYPE_NAME,
            CachedValue::Bool(_) => bool::TYPE_NAME,
            CachedValue::StringSeq(_) => <Vec<String>>::TYPE_NAME,
            CachedValue::IntSeq(_) => <Vec<i64>>::TYPE_NAME,
            CachedValue::FloatSeq(_) => <Vec<f32>>::TYPE_NAME,
            CachedValue::BoolSeq(_) => <Vec<bool>>::TYPE_NAME,
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Types that can be read from a document
///
/// Implemented for `String`, `i64`, `f32`, `bool` and `Vec`s of each.
pub trait ConfigValue: DeserializeOwned + Clone + sealed::Sealed {
    /// Human-readable type name used in error messages
    const TYPE_NAME: &'static str;

    #[doc(hidden)]
    fn into_cached(self) -> CachedValue;

    #[doc(hidden)]
    fn from_cached(cached: &CachedValue) -> Option<Self>;
}

macro_rules! config_value {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl sealed::Sealed for $ty {}

        impl ConfigValue for $ty {
            const TYPE_NAME: &'static str = $name;

            fn into_cached(self) -> CachedValue {
                CachedValue::$variant(self)
            }

            fn from_cached(cached: &CachedValue) -> Option<Self> {
                match cached {
                    CachedValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

config_value!(String, String, "string");
config_value!(i64, Int, "integer");
config_value!(f32, Float, "float");
config_value!(bool, Bool, "boolean");
config_value!(Vec<String>, StringSeq, "string sequence");
config_value!(Vec<i64>, IntSeq, "integer sequence");
config_value!(Vec<f32>, FloatSeq, "float sequence");
config_value!(Vec<bool>, BoolSeq, "boolean sequence");

/// One immutable configuration snapshot plus its decode cache
#[derive(Debug)]
pub struct Document {
    /// Source file; `None` for in-memory and empty documents
    source: Option<PathBuf>,
    /// Content fingerprint of the source at load time
    fingerprint: String,
    /// Top level of the document, nested levels still undecoded
    tree: RawTree,
    /// Canonical path -> decoded value
    cache: DashMap<String, CachedValue>,
    /// Number of cache misses that walked the tree
    resolutions: AtomicU64,
}

impl Document {
    fn with_tree(source: Option<PathBuf>, fingerprint: String, tree: RawTree) -> Self {
        Self {
            source,
            fingerprint,
            tree,
            cache: DashMap::new(),
            resolutions: AtomicU64::new(0),
        }
    }

    /// A document with no fields
    pub fn empty() -> Self {
        Self::with_tree(None, String::new(), RawTree::new())
    }

    /// Load a document from a JSON file
    ///
    /// Read failures are errors. Content whose top level is not a JSON
    /// object still yields a document, with no fields, so that the source
    /// stays registered and can be fixed and reloaded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fileutil::read_all(path)?;
        let fingerprint = fileutil::digest(&bytes);

        let tree = RawTree::from_slice(&bytes).unwrap_or_else(|e| {
            log::warn!(
                "Configuration '{}' is not a JSON object, loading it empty: {}",
                path.display(),
                e
            );
            RawTree::new()
        });

        Ok(Self::with_tree(Some(path.to_path_buf()), fingerprint, tree))
    }

    /// Build a document from an in-memory JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let tree = RawTree::from_slice(json.as_bytes())
            .map_err(|e| Error::decode("<root>", "JSON object", e))?;
        Ok(Self::with_tree(None, fileutil::digest(json.as_bytes()), tree))
    }

    /// Source file this document was loaded from
    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Directory containing the source file
    pub fn dir(&self) -> Option<&Path> {
        self.source.as_deref().and_then(Path::parent)
    }

    /// File name of the source file
    pub fn file_name(&self) -> Option<&str> {
        self.source
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
    }

    /// Content fingerprint taken when the document was loaded
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Top-level fields of the document
    pub fn tree(&self) -> &RawTree {
        &self.tree
    }

    /// Number of cached paths
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Number of lookups that missed the cache and walked the tree
    pub fn resolve_count(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Get a typed value
    ///
    /// Without a trailing index the leaf is decoded as `T`; with one, the
    /// leaf is decoded as a sequence of `T` and the element is selected.
    pub fn get<T: ConfigValue>(&self, path: &str) -> Result<T> {
        let expr = PathExpression::parse(path)?;
        let key = expr.canonical();

        if let Some(cached) = self.cache.get(&key) {
            return T::from_cached(cached.value())
                .ok_or_else(|| Error::type_mismatch(&key, T::TYPE_NAME, cached.type_name()));
        }

        log::debug!("Cache miss for '{}', resolving as {}", key, T::TYPE_NAME);
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        let value: T = PathResolver::new(&self.tree).resolve(&expr, |fragment, index| {
            decode_leaf(fragment, index, &key)
        })?;

        self.cache.insert(key, value.clone().into_cached());
        Ok(value)
    }

    /// Get a typed value, falling back to `default` on any error
    pub fn get_or<T: ConfigValue>(&self, path: &str, default: T) -> T {
        self.get(path).unwrap_or(default)
    }

    /// Get the undecoded leaf fragment for custom decoding
    ///
    /// A trailing index selects that element of the leaf sequence. Raw
    /// lookups are not cached.
    pub fn get_raw(&self, path: &str) -> Result<RawFragment> {
        let expr = PathExpression::parse(path)?;
        let key = expr.canonical();
        PathResolver::new(&self.tree).resolve(&expr, |fragment, index| match index {
            Some(index) => tree::decode_element(fragment, index, &key, "fragment"),
            None => Ok(fragment.to_owned()),
        })
    }

    /// Get a string value
    pub fn get_string(&self, path: &str) -> Result<String> {
        self.get(path)
    }

    /// Get an integer value
    pub fn get_int(&self, path: &str) -> Result<i64> {
        self.get(path)
    }

    /// Get a float value
    pub fn get_float(&self, path: &str) -> Result<f32> {
        self.get(path)
    }

    /// Get a boolean value
    pub fn get_bool(&self, path: &str) -> Result<bool> {
        self.get(path)
    }

    /// Get a sequence of strings
    pub fn get_string_slice(&self, path: &str) -> Result<Vec<String>> {
        self.get(path)
    }

    /// Get a sequence of integers
    pub fn get_int_slice(&self, path: &str) -> Result<Vec<i64>> {
        self.get(path)
    }

    /// Get a sequence of floats
    pub fn get_float_slice(&self, path: &str) -> Result<Vec<f32>> {
        self.get(path)
    }

    /// Get a sequence of booleans
    pub fn get_bool_slice(&self, path: &str) -> Result<Vec<bool>> {
        self.get(path)
    }

    /// Get a string value, or `default` if the lookup fails
    pub fn get_string_with_default(&self, path: &str, default: &str) -> String {
        self.get_string(path).unwrap_or_else(|_| default.to_string())
    }

    /// Get an integer value, or `default` if the lookup fails
    pub fn get_int_with_default(&self, path: &str, default: i64) -> i64 {
        self.get_or(path, default)
    }

    /// Get a float value, or `default` if the lookup fails
    pub fn get_float_with_default(&self, path: &str, default: f32) -> f32 {
        self.get_or(path, default)
    }

    /// Get a boolean value, or `default` if the lookup fails
    pub fn get_bool_with_default(&self, path: &str, default: bool) -> bool {
        self.get_or(path, default)
    }

    /// Get a sequence of strings, or `default` if the lookup fails
    pub fn get_string_slice_with_default(&self, path: &str, default: Vec<String>) -> Vec<String> {
        self.get_or(path, default)
    }

    /// Get a sequence of integers, or `default` if the lookup fails
    pub fn get_int_slice_with_default(&self, path: &str, default: Vec<i64>) -> Vec<i64> {
        self.get_or(path, default)
    }

    /// Get a sequence of floats, or `default` if the lookup fails
    pub fn get_float_slice_with_default(&self, path: &str, default: Vec<f32>) -> Vec<f32> {
        self.get_or(path, default)
    }

    /// Get a sequence of booleans, or `default` if the lookup fails
    pub fn get_bool_slice_with_default(&self, path: &str, default: Vec<bool>) -> Vec<bool> {
        self.get_or(path, default)
    }
}

fn decode_leaf<T: ConfigValue>(fragment: &RawValue, index: Option<usize>, key: &str) -> Result<T> {
    match index {
        Some(index) => tree::decode_element(fragment, index, key, T::TYPE_NAME),
        None => tree::decode(fragment, key, T::TYPE_NAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "key1": 1,
        "key2": "value2",
        "key3": true,
        "key4": 0.1,
        "key5": {"key6": "value6"},
        "key7": ["key7_1", "key7_2", "key7_3"],
        "key8": {"key9": [1, 2, 3]},
        "key10": {"key11": [{"key12": "value12"}, {"key15": "value15"}]},
        "flags": [true, false],
        "ratios": [0.5, 1.5],
        "matrix": [[1, 2], [3, 4]]
    }"#;

    fn sample() -> Document {
        Document::from_json_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_scalar_getters() {
        let doc = sample();

        assert_eq!(doc.get_int("key1").unwrap(), 1);
        assert_eq!(doc.get_string("key2").unwrap(), "value2");
        assert!(doc.get_bool("key3").unwrap());
        assert_eq!(doc.get_float("key4").unwrap(), 0.1_f32);
        assert_eq!(doc.get_string("key5.key6").unwrap(), "value6");
    }

    #[test]
    fn test_slice_getters() {
        let doc = sample();

        assert_eq!(
            doc.get_string_slice("key7").unwrap(),
            vec!["key7_1", "key7_2", "key7_3"]
        );
        assert_eq!(doc.get_int_slice("key8.key9").unwrap(), vec![1, 2, 3]);
        assert_eq!(doc.get_bool_slice("flags").unwrap(), vec![true, false]);
        assert_eq!(doc.get_float_slice("ratios").unwrap(), vec![0.5, 1.5]);
    }

    #[test]
    fn test_indexed_scalar_getters() {
        let doc = sample();

        assert_eq!(doc.get_string("key7[1]").unwrap(), "key7_2");
        assert_eq!(doc.get_int("key8.key9[2]").unwrap(), 3);
        assert!(!doc.get_bool("flags[1]").unwrap());
        assert_eq!(doc.get_float("ratios[0]").unwrap(), 0.5);
    }

    #[test]
    fn test_indexed_slice_getter_selects_row() {
        let doc = sample();
        assert_eq!(doc.get_int_slice("matrix[1]").unwrap(), vec![3, 4]);
    }

    #[test]
    fn test_path_through_sequence() {
        let doc = sample();

        assert_eq!(doc.get_string("key10.key11[0].key12").unwrap(), "value12");
        assert_eq!(doc.get_string("key10.key11[1].key15").unwrap(), "value15");
        assert_eq!(
            doc.get_string("key10.key11[5].key12").unwrap_err().kind,
            ErrorKind::InvalidSliceIndex
        );
    }

    #[test]
    fn test_whitespace_variants_resolve_to_same_value() {
        let doc = sample();

        for path in [
            "key10.key11[0].key12",
            "key10.key11[ 0 ].key12",
            "key10 .  key11[ 0 ].key12",
        ] {
            assert_eq!(doc.get_string(path).unwrap(), "value12", "path {:?}", path);
        }
        assert_eq!(doc.cache_len(), 1);
        assert_eq!(doc.resolve_count(), 1);
    }

    #[test]
    fn test_missing_key_is_key_not_found() {
        let doc = sample();

        assert_eq!(doc.get_string("key5.key7").unwrap_err().kind, ErrorKind::KeyNotFound);
        assert_eq!(doc.get_string("key8.not").unwrap_err().kind, ErrorKind::KeyNotFound);
        assert_eq!(doc.get_int("nope").unwrap_err().kind, ErrorKind::KeyNotFound);
    }

    #[test]
    fn test_unmatched_bracket_is_invalid_key() {
        let doc = sample();
        assert_eq!(
            doc.get_string("key10.key110].key12").unwrap_err().kind,
            ErrorKind::InvalidKey
        );
    }

    #[test]
    fn test_out_of_range_leaf_index() {
        let doc = sample();
        let err = doc.get_string("key7[5]").unwrap_err();

        assert_eq!(err.kind, ErrorKind::InvalidSliceIndex);
        assert_eq!(err.path.as_deref(), Some("key7[5]"));
    }

    #[test]
    fn test_wrong_shape_is_decode_error() {
        let doc = sample();

        assert_eq!(doc.get_int("key2").unwrap_err().kind, ErrorKind::Decode);
        assert_eq!(doc.get_string_slice("key1").unwrap_err().kind, ErrorKind::Decode);
        assert_eq!(doc.get_bool("key7[0]").unwrap_err().kind, ErrorKind::Decode);
        // Failed lookups are not cached
        assert_eq!(doc.cache_len(), 0);
    }

    #[test]
    fn test_cache_pins_first_type() {
        let doc = sample();

        assert_eq!(doc.get_int("key1").unwrap(), 1);
        let err = doc.get_string("key1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        assert_eq!(err.path.as_deref(), Some("key1"));

        // Equivalent spelling hits the same entry
        assert_eq!(doc.get_bool(" key1 ").unwrap_err().kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_cached_reads_skip_resolution() {
        let doc = sample();

        let first = doc.get_string_slice("key7").unwrap();
        for _ in 0..5 {
            assert_eq!(doc.get_string_slice("key7").unwrap(), first);
        }
        assert_eq!(doc.resolve_count(), 1);
        assert_eq!(doc.cache_len(), 1);
    }

    #[test]
    fn test_with_default_absorbs_errors() {
        let doc = sample();

        assert_eq!(doc.get_string_with_default("missing", "fallback"), "fallback");
        assert_eq!(doc.get_int_with_default("key2", 7), 7);
        assert_eq!(doc.get_int_with_default("key1", 7), 1);
        assert_eq!(doc.get_float_with_default("a..b", 2.5), 2.5);
        assert!(doc.get_bool_with_default("key3", false));
        assert_eq!(
            doc.get_int_slice_with_default("key7", vec![9]),
            vec![9]
        );
        assert_eq!(
            doc.get_string_slice_with_default("key7", vec![]),
            vec!["key7_1", "key7_2", "key7_3"]
        );
        assert_eq!(doc.get_bool_slice_with_default("flags", vec![]), vec![true, false]);
        assert_eq!(doc.get_float_slice_with_default("nope", vec![1.0]), vec![1.0]);
    }

    #[test]
    fn test_get_raw() {
        let doc = sample();

        assert_eq!(doc.get_raw("key5").unwrap().get(), r#"{"key6": "value6"}"#);
        assert_eq!(doc.get_raw("key10.key11[1]").unwrap().get(), r#"{"key15": "value15"}"#);
        assert_eq!(doc.get_raw("key7[9]").unwrap_err().kind, ErrorKind::InvalidSliceIndex);
        assert_eq!(doc.cache_len(), 0);
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::empty();

        assert!(doc.tree().is_empty());
        assert!(doc.source_path().is_none());
        assert_eq!(doc.get_int("anything").unwrap_err().kind, ErrorKind::KeyNotFound);
    }

    #[test]
    fn test_from_json_str_rejects_non_objects() {
        let err = Document::from_json_str("[1, 2]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);
    }

    #[test]
    fn test_load_records_source_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("test.json");
        std::fs::write(&file, SAMPLE).unwrap();

        let doc = Document::load(&file).unwrap();

        assert_eq!(doc.source_path(), Some(file.as_path()));
        assert_eq!(doc.dir(), Some(dir.path()));
        assert_eq!(doc.file_name(), Some("test.json"));
        assert_eq!(doc.fingerprint(), fileutil::digest(SAMPLE.as_bytes()));
        assert_eq!(doc.get_int("key1").unwrap(), 1);
    }

    #[test]
    fn test_load_malformed_content_yields_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.json");
        std::fs::write(&file, "{ not json").unwrap();

        let doc = Document::load(&file).unwrap();

        assert!(doc.tree().is_empty());
        assert_eq!(doc.fingerprint(), fileutil::digest(b"{ not json"));
        assert_eq!(doc.get_int("key1").unwrap_err().kind, ErrorKind::KeyNotFound);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = Document::load("/no/such/config.json").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
    }

    #[test]
    fn test_concurrent_readers_agree() {
        let doc = std::sync::Arc::new(sample());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let doc = std::sync::Arc::clone(&doc);
                std::thread::spawn(move || doc.get_string("key10.key11[1].key15").unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "value15");
        }
        assert_eq!(doc.cache_len(), 1);
    }
}
