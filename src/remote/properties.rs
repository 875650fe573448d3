//! Property read-merge-write workflow.

use serde_json::{Map, Value};

use super::client::DocumentClient;
use super::errors::ApiError;

/// Merge `updates` over `current`. Last write wins per key; a `null`
/// update removes the key.
pub fn merge_properties(
    current: &Map<String, Value>,
    updates: &Map<String, Value>,
) -> Map<String, Value> {
    let mut merged = current.clone();
    for (key, value) in updates {
        if value.is_null() {
            merged.remove(key);
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Update a document's properties: validate names against the schema,
/// read the current values, merge once, write the merged result.
///
/// The read and the write are separate, independently retryable calls;
/// the merge runs exactly once between them. A retried write re-sends
/// the same merged value, which is safe precisely because the merge is
/// never recomputed against possibly-changed base state inside a retry
/// boundary.
pub async fn update_properties(
    client: &DocumentClient,
    id: &str,
    updates: &Map<String, Value>,
) -> Result<Map<String, Value>, ApiError> {
    let schema = client.get_schema(id).await?;
    if !schema.properties.is_empty() {
        for key in updates.keys() {
            if !schema.properties.contains_key(key) {
                let known: Vec<&str> = schema.properties.keys().map(String::as_str).collect();
                return Err(ApiError::InvalidRequest {
                    message: format!(
                        "unknown property `{key}`; the schema defines: {}",
                        known.join(", ")
                    ),
                });
            }
        }
    }

    let current = client.get_properties(id).await?;
    let merged = merge_properties(&current, updates);
    client.put_properties(id, &merged).await?;
    Ok(merged)
}
