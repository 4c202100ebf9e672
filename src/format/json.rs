//! JSON record serialization.

use serde_json::{Map, Value};

use crate::utils::error::{Error, Result};

/// Serialize a composed field list as one newline-terminated JSON object.
///
/// Duplicate keys keep the last value, matching merge semantics.
pub fn format_json(kv: &[(String, Value)]) -> Result<Vec<u8>> {
    let mut object = Map::with_capacity(kv.len());
    for (key, value) in kv {
        object.insert(key.clone(), value.clone());
    }
    let mut bytes = serde_json::to_vec(&Value::Object(object))
        .map_err(|e| Error::FormatFailed(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}
