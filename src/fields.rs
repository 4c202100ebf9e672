//! # Structured Fields
//!
//! This module provides the thread-safe key/value payload attached to every
//! entry. A `Fields` value is a flat string→value map safe under concurrent
//! readers and a single writer, with deep-copy cloning, right-wins merging
//! and a flat-object JSON codec.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::error::{Error, Result};

/// Thread-safe structured key/value payload.
///
/// Builder operations are chainable and mutate the shared store in place;
/// `clone()` produces a deep, independent snapshot whose mutations do not
/// affect the source.
#[derive(Debug, Default)]
pub struct Fields {
    inner: Arc<RwLock<AHashMap<String, Value>>>,
}

impl Fields {
    /// Create an empty field set.
    pub fn new() -> Self {
        Fields::default()
    }

    /// Store a key, chainable.
    pub fn add(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Store a key in place.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.write().insert(key.into(), value.into());
    }

    /// Load a key, returning a copy of its value when present.
    pub fn load(&self, key: &str) -> Option<Value> {
        self.inner.read().get(key).cloned()
    }

    /// Remove keys, chainable.
    pub fn delete(self, keys: &[&str]) -> Self {
        {
            let mut guard = self.inner.write();
            for key in keys {
                guard.remove(*key);
            }
        }
        self
    }

    /// Visit every key/value pair of a consistent snapshot.
    ///
    /// The callback returns `false` to stop early. Keys added concurrently
    /// with the walk may be missed.
    pub fn walk(&self, mut f: impl FnMut(&str, &Value) -> bool) {
        let snapshot: Vec<(String, Value)> = {
            let guard = self.inner.read();
            guard.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        for (key, value) in &snapshot {
            if !f(key, value) {
                break;
            }
        }
    }

    /// Merge another field set into this one; the right-hand side wins on
    /// key conflicts. Merging an empty set is a no-op. Chainable.
    pub fn merge(self, other: &Fields) -> Self {
        let incoming = other.to_flat_map();
        if !incoming.is_empty() {
            let mut guard = self.inner.write();
            for (key, value) in incoming {
                guard.insert(key, value);
            }
        }
        self
    }

    /// Replace every value in place via a pure transform. Chainable.
    pub fn map(self, f: impl Fn(&str, Value) -> Value) -> Self {
        {
            let mut guard = self.inner.write();
            for (key, value) in guard.iter_mut() {
                let replaced = f(key, value.clone());
                *value = replaced;
            }
        }
        self
    }

    /// Snapshot the contents as a plain map.
    pub fn to_flat_map(&self) -> AHashMap<String, Value> {
        self.inner.read().clone()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Parse a flat JSON object into a new field set.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let fields = Fields::new();
        fields.merge_json(bytes)?;
        Ok(fields)
    }

    /// Merge a flat JSON object into the existing contents.
    ///
    /// Existing keys are kept unless the input overwrites them; the store is
    /// not cleared first. Fails with `MalformedJson` when the input is not a
    /// JSON object.
    pub fn merge_json(&self, bytes: &[u8]) -> Result<()> {
        let parsed: Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::MalformedJson(e.to_string()))?;
        let Value::Object(object) = parsed else {
            return Err(Error::MalformedJson("top-level value is not an object".to_string()));
        };
        let mut guard = self.inner.write();
        for (key, value) in object {
            guard.insert(key, value);
        }
        Ok(())
    }

    /// Serialize the contents as a flat JSON object with sorted keys.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::FormatFailed(e.to_string()))
    }
}

impl Clone for Fields {
    /// Deep copy: the clone owns an independent store.
    fn clone(&self) -> Self {
        Fields {
            inner: Arc::new(RwLock::new(self.inner.read().clone())),
        }
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let guard = self.inner.read();
        let mut keys: Vec<&String> = guard.keys().collect();
        keys.sort();
        let mut map = serializer.serialize_map(Some(keys.len()))?;
        for key in keys {
            map.serialize_entry(key, &guard[key])?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Fields;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a flat JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Fields, A::Error> {
                let mut store = AHashMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    store.insert(key, value);
                }
                Ok(Fields {
                    inner: Arc::new(RwLock::new(store)),
                })
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}
