//! The one JSON shape the proxy answers with, plus the normaliser that
//! turns whatever the upstream sends back for a list into plain records.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessEnvelope {
    pub success: bool,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    pub error: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FailedAttempt>,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>, error: Value) -> Self {
        Self {
            success: false,
            message: message.into(),
            error,
            details: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Vec<FailedAttempt>) -> Self {
        self.details = details;
        self
    }
}

/// One upstream call that did not come back with a 2xx.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAttempt {
    pub method: String,
    pub url: String,
    ///`None` when the request never got a response
    pub status: Option<u16>,
    pub body: Value,
}

/// A successful proxy answer: the status we hand back and the payload under `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyReply {
    pub status: StatusCode,
    pub data: Value,
}

impl ProxyReply {
    pub const fn ok(data: Value) -> Self {
        Self {
            status: StatusCode::OK,
            data,
        }
    }
}

impl IntoResponse for ProxyReply {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(SuccessEnvelope {
                success: true,
                data: self.data,
            }),
        )
            .into_response()
    }
}

/// Parses an upstream body leniently: empty is `{}`, JSON is kept, anything else becomes a string.
pub fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Object(Map::new());
    }

    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Pulls the record array out of a list payload.
///
/// Accepts a bare array, `{"data": [...]}` and `{"body": {"data": [...]}}` (also nested under
/// `data`). Any other shape is treated as an empty collection.
pub fn records_from_payload(payload: Value) -> Vec<Value> {
    let payload = match payload {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => data,
            _ => Value::Object(map),
        },
        other => other,
    };

    match payload {
        Value::Array(records) => records,
        Value::Object(mut map) => match map.remove("body") {
            Some(Value::Object(mut body)) => match body.remove("data") {
                Some(Value::Array(records)) => records,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
