//! Extraction of values from JSON secret payloads by dotted path.

use serde_json::Value;

use crate::error::FragmentError;

/// Extracts a value from a JSON payload by dot-delimited path.
///
/// Path segments address object keys (`"password"`, `"db.host"`) or array
/// indices (`"items.0.name"`). String leaves are returned without quotes;
/// numbers, booleans and null as their JSON text; objects and arrays are
/// re-serialized compactly.
pub(crate) fn extract(data: &[u8], path: &str) -> Result<Vec<u8>, FragmentError> {
    let root: Value = serde_json::from_slice(data).map_err(FragmentError::InvalidJson)?;

    let mut current = &root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment).ok_or_else(|| FragmentError::NotFound {
                path: path.to_string(),
            })?,
            Value::Array(items) => {
                let index: usize =
                    segment.parse().map_err(|_| FragmentError::BadIndex {
                        path: path.to_string(),
                        segment: segment.to_string(),
                    })?;
                items.get(index).ok_or_else(|| FragmentError::IndexOutOfRange {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                })?
            }
            _ => {
                return Err(FragmentError::Scalar {
                    path: path.to_string(),
                })
            }
        };
    }

    Ok(render_leaf(current))
}

fn render_leaf(value: &Value) -> Vec<u8> {
    match value {
        Value::String(s) => s.clone().into_bytes(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string().into_bytes()
            } else if let Some(u) = n.as_u64() {
                u.to_string().into_bytes()
            } else {
                // Shortest round-trip decimal form.
                n.as_f64().unwrap_or(0.0).to_string().into_bytes()
            }
        }
        Value::Bool(b) => b.to_string().into_bytes(),
        Value::Null => b"null".to_vec(),
        // Containers are re-serialized compactly; serialization of a Value
        // tree cannot fail.
        _ => serde_json::to_vec(value).unwrap_or_default(),
    }
}
