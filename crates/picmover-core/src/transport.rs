// SPDX-License-Identifier: AGPL-3.0
// PicMover Core - Response interpretation
//
// Turns what came back from the server into a JSON object or a
// classified error. Nothing in here performs I/O or retries.

use crate::types::AppError;
use serde_json::{Map, Value};

/// Decoded JSON object body of a successful response
pub type JsonObject = Map<String, Value>;

/// Status code and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// None when the server sent no body
    pub body: Option<Vec<u8>>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            status,
            body: if body.is_empty() { None } else { Some(body) },
        }
    }
}

/// Classify an exchange. Transport failures pass through untouched.
pub fn interpret_outcome(outcome: Result<RawResponse, AppError>) -> Result<JsonObject, AppError> {
    interpret(outcome?)
}

/// Classify a response: only status 200 with a JSON object body is a success.
pub fn interpret(response: RawResponse) -> Result<JsonObject, AppError> {
    if response.status != 200 {
        let mut reason = format!("Server send error, code: {}", response.status);
        if let Some(body) = &response.body {
            reason.push_str(&format!(", {}", String::from_utf8_lossy(body)));
        }
        return Err(AppError::Protocol(reason));
    }

    let Some(body) = response.body else {
        return Err(AppError::Protocol("No data from server".to_string()));
    };

    let value: Value = serde_json::from_slice(&body).map_err(|e| {
        AppError::Protocol(format!(
            "Return data is not json ({}): {}",
            e,
            String::from_utf8_lossy(&body)
        ))
    })?;

    match value {
        Value::Object(object) => Ok(object),
        other => Err(AppError::Protocol(format!(
            "Return data format error, need to be a json object: {}",
            other
        ))),
    }
}

/// Integer field, or a protocol error naming the missing key
pub fn require_i64(object: &JsonObject, key: &str) -> Result<i64, AppError> {
    object
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| missing(object, key))
}

pub fn require_bool(object: &JsonObject, key: &str) -> Result<bool, AppError> {
    object
        .get(key)
        .and_then(Value::as_bool)
        .ok_or_else(|| missing(object, key))
}

pub fn require_str<'a>(object: &'a JsonObject, key: &str) -> Result<&'a str, AppError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(object, key))
}

/// Integer array field. Non-integer elements are skipped.
pub fn optional_i64_list(object: &JsonObject, key: &str) -> Option<Vec<i64>> {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
}

fn missing(object: &JsonObject, key: &str) -> AppError {
    AppError::Protocol(format!(
        "Return json has no key '{}': {}",
        key,
        Value::Object(object.clone())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_object() {
        let object = interpret(RawResponse::new(200, r#"{"ConnectId": 7}"#)).unwrap();
        assert_eq!(require_i64(&object, "ConnectId").unwrap(), 7);
    }

    #[test]
    fn test_non_200_includes_code_and_body() {
        let err = interpret(RawResponse::new(503, "busy")).unwrap_err();
        match err {
            AppError::Protocol(reason) => {
                assert!(reason.contains("503"));
                assert!(reason.contains("busy"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_200_with_json_body_is_still_error() {
        let err = interpret(RawResponse::new(404, r#"{"ok": true}"#)).unwrap_err();
        assert!(matches!(err, AppError::Protocol(_)));
    }

    #[test]
    fn test_absent_body() {
        let err = interpret(RawResponse::new(200, Vec::new())).unwrap_err();
        assert_eq!(err, AppError::Protocol("No data from server".to_string()));
    }

    #[test]
    fn test_invalid_json() {
        let err = interpret(RawResponse::new(200, "not json")).unwrap_err();
        assert!(matches!(err, AppError::Protocol(reason) if reason.contains("not json")));
    }

    #[test]
    fn test_json_array_is_not_an_object() {
        let err = interpret(RawResponse::new(200, "[1, 2]")).unwrap_err();
        assert!(matches!(err, AppError::Protocol(reason) if reason.contains("format error")));
    }

    #[test]
    fn test_transport_error_passes_through() {
        let err = interpret_outcome(Err(AppError::Transport("refused".into()))).unwrap_err();
        assert_eq!(err, AppError::Transport("refused".into()));
    }

    #[test]
    fn test_wrong_field_type_counts_as_missing() {
        let object = interpret(RawResponse::new(200, r#"{"Approved": "yes"}"#)).unwrap();
        let err = require_bool(&object, "Approved").unwrap_err();
        assert!(matches!(err, AppError::Protocol(reason) if reason.contains("'Approved'")));
    }

    #[test]
    fn test_i64_list_skips_garbage() {
        let object = interpret(RawResponse::new(200, r#"{"Result": [0, "x", 2]}"#)).unwrap();
        assert_eq!(optional_i64_list(&object, "Result"), Some(vec![0, 2]));
        assert_eq!(optional_i64_list(&object, "Missing"), None);
    }
}
