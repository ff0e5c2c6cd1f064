//! # JSON Documents
//!
//! Encoding and decoding of the individual JSON members.
//!
//! Each collection document wraps its array under one key
//! (`{"locations": [...]}`). Decoding goes element by element so a single bad
//! record produces one finding instead of losing the whole document; the
//! caller decides whether findings abort.

use crate::clid::Clid;
use crate::model::record::Record;
use crate::types::CldfError;
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

// =============================================================================
// ENCODE
// =============================================================================

/// `{"<key>": [records...]}` without cloning the records.
struct Wrapped<'a, T> {
    key: &'static str,
    records: &'a [T],
}

impl<T: Serialize> Serialize for Wrapped<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key, self.records)?;
        map.end()
    }
}

/// Serialize any document, compact or indented.
pub fn encode_json<T: Serialize>(
    document: &str,
    value: &T,
    pretty: bool,
) -> Result<Vec<u8>, CldfError> {
    let encoded = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    encoded.map_err(|e| CldfError::schema(document, format!("failed to encode: {e}")))
}

/// Serialize one collection in its wrapper object.
pub fn encode_collection<T: Record>(records: &[T], pretty: bool) -> Result<Vec<u8>, CldfError> {
    let wrapped = Wrapped {
        key: T::KIND.collection_key(),
        records,
    };
    encode_json(T::KIND.document(), &wrapped, pretty)
}

// =============================================================================
// DECODE
// =============================================================================

/// Parse a single-object document such as the manifest.
pub fn decode_json<T: DeserializeOwned>(document: &str, bytes: &[u8]) -> Result<T, CldfError> {
    serde_json::from_slice(bytes).map_err(|e| CldfError::schema(document, e.to_string()))
}

/// Records that decoded, plus a finding for each that didn't.
#[derive(Debug)]
pub struct Decoded<T> {
    pub records: Vec<T>,
    pub errors: Vec<CldfError>,
    pub warnings: Vec<String>,
}

/// Parse one collection document.
///
/// Fails outright only when the document itself is unusable (not JSON, or
/// missing its wrapper key). Per-record failures are collected.
pub fn decode_collection<T: Record>(bytes: &[u8]) -> Result<Decoded<T>, CldfError> {
    let document = T::KIND.document();
    let key = T::KIND.collection_key();

    let root: Value = decode_json(document, bytes)?;
    let elements = match root.get(key) {
        Some(Value::Array(elements)) => elements,
        Some(_) => {
            return Err(CldfError::schema(document, format!("'{key}' must be an array")));
        }
        None => {
            return Err(CldfError::schema(document, format!("missing '{key}' array")));
        }
    };

    let mut decoded = Decoded {
        records: Vec::with_capacity(elements.len()),
        errors: Vec::new(),
        warnings: Vec::new(),
    };
    for (index, element) in elements.iter().enumerate() {
        match <T as Deserialize>::deserialize(element) {
            Ok(record) => {
                decoded.warnings.extend(T::coerced(element));
                decoded.records.push(record);
            }
            Err(e) => decoded.errors.push(element_error::<T>(index, element, &e)),
        }
    }

    tracing::debug!(
        document,
        records = decoded.records.len(),
        rejected = decoded.errors.len(),
        "collection decoded"
    );
    Ok(decoded)
}

/// A malformed CLID is reported as such; anything else is a schema error.
fn element_error<T: Record>(index: usize, element: &Value, err: &serde_json::Error) -> CldfError {
    if let Some(Err(clid_err)) = element.get("clid").and_then(Value::as_str).map(Clid::parse) {
        return clid_err;
    }
    let label = match element.get("id").and_then(Value::as_u64) {
        Some(id) => format!("{} {id}", T::KIND),
        None => format!("{} at index {index}", T::KIND),
    };
    CldfError::schema(T::KIND.document(), format!("{label}: {err}"))
}

// =============================================================================
// TESTS
// =============================================================================
