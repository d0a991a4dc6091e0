//! Backend response envelope

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CacheError, Result};

/// `{results, message, statusCode}` wrapper used by the storefront backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    /// Payload
    pub results: T,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Status echoed by the server
    pub status_code: u16,
}

/// True when `body` has the envelope shape
pub fn is_envelope(body: &Value) -> bool {
    match body {
        Value::Object(map) => map.contains_key("results") && map.contains_key("statusCode"),
        _ => false,
    }
}

/// Strip the envelope if present
///
/// A non-2xx `statusCode` inside the envelope becomes a server error with
/// the envelope's message. Bodies without the envelope pass through.
pub fn unwrap_envelope(body: Value) -> Result<Value> {
    if !is_envelope(&body) {
        return Ok(body);
    }
    let envelope: Envelope<Value> = serde_json::from_value(body)
        .map_err(|e| CacheError::Decode(format!("malformed envelope: {e}")))?;
    if !(200..300).contains(&envelope.status_code) {
        return Err(CacheError::server(envelope.status_code, envelope.message));
    }
    Ok(envelope.results)
}

/// Server message carried by an error body, if any
pub fn error_message(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwraps_results() {
        let body = json!({"results": [1, 2, 3], "message": "ok", "statusCode": 200});
        assert_eq!(unwrap_envelope(body).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_bare_body_passes_through() {
        let body = json!({"id": 1, "results": "not an envelope"});
        assert_eq!(unwrap_envelope(body.clone()).unwrap(), body);
        assert_eq!(unwrap_envelope(json!([1])).unwrap(), json!([1]));
    }

    #[test]
    fn test_error_status_in_envelope() {
        let body = json!({"results": null, "message": "brand not found", "statusCode": 404});
        let err = unwrap_envelope(body).unwrap_err();
        assert_eq!(err, CacheError::server(404, "brand not found"));
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(&json!({"message": "nope"})),
            Some("nope".to_string())
        );
        assert_eq!(error_message(&json!("text")), None);
    }
}
