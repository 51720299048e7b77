//! JSON-RPC protocol representations and formatting utilities
//!
//! Provides the typed request/response envelope shared by both HTTP transports.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// An inbound call. A missing `id` marks the call as a notification.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonRpcOutcome {
    Result(Value),
    Error(JsonRpcError),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub outcome: JsonRpcOutcome,
}

impl JsonRpcResponse {
    /// Serializes `result` into a success response, degrading to an internal
    /// error if the payload cannot be represented as JSON.
    pub fn result(id: Option<Value>, result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self {
                jsonrpc: default_version(),
                id,
                outcome: JsonRpcOutcome::Result(value),
            },
            Err(err) => {
                tracing::error!(error = %err, "jsonrpc result serialization failed");
                Self::error(id, JsonRpcError::new(INTERNAL_ERROR, "Internal error"))
            }
        }
    }

    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            outcome: JsonRpcOutcome::Error(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, JsonRpcOutcome::Error(_))
    }
}

/// Out-of-band message emitted while a call is still being processed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            method: method.into(),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_without_id_is_a_notification() {
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "initialize"}))
                .expect("request should parse");

        assert_eq!(request.id, None);
        assert_eq!(request.params, None);
    }

    #[test]
    fn request_requires_method() {
        let parsed = serde_json::from_value::<JsonRpcRequest>(json!({"jsonrpc": "2.0", "id": 1}));
        assert!(parsed.is_err());
    }

    #[test]
    fn result_response_has_no_error_key() {
        let response = JsonRpcResponse::result(Some(json!(7)), json!({"ok": true}));
        let value = serde_json::to_value(&response).expect("serialize");

        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 7, "result": {"ok": true}}));
    }

    #[test]
    fn error_response_omits_absent_id() {
        let response = JsonRpcResponse::error(None, JsonRpcError::method_not_found());
        let value = serde_json::to_value(&response).expect("serialize");

        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "error": {"code": -32601, "message": "Method not found"}})
        );
        assert!(response.is_error());
    }

    #[test]
    fn response_parses_back_into_outcome() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": "abc",
            "error": {"code": -32602, "message": "Unsupported tool name"}
        }))
        .expect("response should parse");

        assert_eq!(
            response.outcome,
            JsonRpcOutcome::Error(JsonRpcError::invalid_params("Unsupported tool name"))
        );
    }
}
