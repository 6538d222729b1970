//! Parsing of query service response bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LoadError, LoadResult};

/// JSON keys holding the values a result record needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFieldMap {
    /// Feature count key. Required in every success body.
    #[serde(default = "default_feature_count")]
    pub feature_count: String,
    /// Server query time key (integer ms), if the service reports one.
    #[serde(default)]
    pub query_time: Option<String>,
    /// Server total time key (integer ms), if the service reports one.
    #[serde(default)]
    pub server_time: Option<String>,
}

fn default_feature_count() -> String {
    "total".to_string()
}

impl Default for ResponseFieldMap {
    fn default() -> Self {
        Self {
            feature_count: default_feature_count(),
            query_time: None,
            server_time: None,
        }
    }
}

/// Values extracted from a success body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedResponse {
    pub feature_count: u64,
    pub query_time_ms: Option<u64>,
    pub server_time_ms: Option<u64>,
}

/// Extract the mapped fields from a JSON response body.
///
/// The feature count must be present and a non-negative integer. Optional
/// timings may be absent or `null`, but a present value of the wrong type
/// is an error.
pub fn parse_response(body: &str, fields: &ResponseFieldMap) -> LoadResult<ParsedResponse> {
    let json: Value = serde_json::from_str(body)?;
    let object = json
        .as_object()
        .ok_or_else(|| LoadError::ResponseParse("body is not a JSON object".to_string()))?;

    let feature_count = match object.get(&fields.feature_count) {
        Some(value) => as_count(value, &fields.feature_count)?,
        None => {
            return Err(LoadError::ResponseParse(format!(
                "missing field '{}'",
                fields.feature_count
            )))
        }
    };

    Ok(ParsedResponse {
        feature_count,
        query_time_ms: optional_field(object, fields.query_time.as_deref())?,
        server_time_ms: optional_field(object, fields.server_time.as_deref())?,
    })
}

fn optional_field(
    object: &serde_json::Map<String, Value>,
    key: Option<&str>,
) -> LoadResult<Option<u64>> {
    match key.and_then(|k| object.get(k).map(|v| (k, v))) {
        None | Some((_, Value::Null)) => Ok(None),
        Some((key, value)) => as_count(value, key).map(Some),
    }
}

fn as_count(value: &Value, key: &str) -> LoadResult<u64> {
    value.as_u64().ok_or_else(|| {
        LoadError::ResponseParse(format!(
            "field '{}' is not a non-negative integer: {}",
            key, value
        ))
    })
}
