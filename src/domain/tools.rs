//! Interactive tools exposed via Model Context Protocol
//!
//! Provides `to-uppercase` and its progress-reporting sibling `to-uppercase-slowly`.

use std::time::Duration;

use rust_mcp_sdk::{
    macros,
    schema::{CallToolResult, ContentBlock, TextContent, Tool},
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::mcp::{
    rpc::{JsonRpcError, JsonRpcNotification, JsonRpcResponse},
    server::NotificationSink,
};

pub const PROGRESS_METHOD: &str = "notifications/progress";

#[macros::mcp_tool(
    name = "to-uppercase",
    description = "Converts the input string to uppercase."
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ToUppercaseTool {
    /// The string to be converted to uppercase.
    pub input: String,
}

#[macros::mcp_tool(
    name = "to-uppercase-slowly",
    description = "Converts the input string to uppercase. (simulates slow processing)"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ToUppercaseSlowlyTool {
    /// The string to be converted to uppercase.
    pub input: String,
}

pub fn build_tools_list() -> Vec<Tool> {
    vec![ToUppercaseTool::tool(), ToUppercaseSlowlyTool::tool()]
}

/// Cadence of the progress notifications sent by `to-uppercase-slowly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSchedule {
    pub steps: u32,
    pub interval: Duration,
}

impl ProgressSchedule {
    pub fn new(steps: u32, interval: Duration) -> Self {
        Self { steps, interval }
    }
}

impl Default for ProgressSchedule {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(300))
    }
}

#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
    #[serde(rename = "_meta", default, deserialize_with = "lenient_meta")]
    pub meta: Option<RequestMeta>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestMeta {
    #[serde(rename = "progressToken", default)]
    pub progress_token: Option<Value>,
}

/// A `_meta` that is not an object is ignored rather than failing the call.
fn lenient_meta<'de, D>(deserializer: D) -> Result<Option<RequestMeta>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

impl ToolCallParams {
    fn progress_token(&self) -> Value {
        self.meta
            .as_ref()
            .and_then(|meta| meta.progress_token.clone())
            .unwrap_or(Value::Null)
    }

    fn arguments<T: serde::de::DeserializeOwned>(&self) -> Result<T, JsonRpcError> {
        let arguments = self
            .arguments
            .clone()
            .filter(|arguments| arguments.contains_key("input"))
            .ok_or_else(|| {
                JsonRpcError::invalid_params("Invalid params: arguments.input is required")
            })?;
        serde_json::from_value(Value::Object(arguments)).map_err(|_| {
            JsonRpcError::invalid_params("Invalid params: arguments.input must be a string")
        })
    }
}

pub fn perform_to_uppercase(input: &str) -> Result<String, JsonRpcError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(JsonRpcError::invalid_params("input string cannot be empty"));
    }
    Ok(input.to_uppercase())
}

pub async fn handle_tools_call(
    progress: &ProgressSchedule,
    id: Option<Value>,
    params: Option<Map<String, Value>>,
    sink: &mut dyn NotificationSink,
) -> JsonRpcResponse {
    let Some(raw_params) = params else {
        return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Invalid params"));
    };

    let tool_call: ToolCallParams = match serde_json::from_value(Value::Object(raw_params)) {
        Ok(value) => value,
        Err(_) => {
            return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Invalid params"))
        }
    };

    let outcome = match tool_call.name.as_str() {
        "to-uppercase" => tool_call
            .arguments::<ToUppercaseTool>()
            .and_then(|args| perform_to_uppercase(&args.input)),
        "to-uppercase-slowly" => match tool_call
            .arguments::<ToUppercaseSlowlyTool>()
            .and_then(|args| perform_to_uppercase(&args.input))
        {
            Ok(upper) => {
                report_progress(progress, tool_call.progress_token(), sink).await;
                Ok(upper)
            }
            Err(err) => Err(err),
        },
        _ => Err(JsonRpcError::invalid_params("Unsupported tool name")),
    };

    match outcome {
        Ok(text) => JsonRpcResponse::result(id, text_result(text)),
        Err(err) => JsonRpcResponse::error(id, err),
    }
}

fn text_result(text: String) -> CallToolResult {
    CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(text, None, None))],
        is_error: Some(false),
        meta: None,
        structured_content: None,
    }
}

/// Emits `steps` progress notifications, pausing `interval` after each one.
/// Stops early once the sink reports that nobody is listening anymore.
async fn report_progress(
    progress: &ProgressSchedule,
    progress_token: Value,
    sink: &mut dyn NotificationSink,
) {
    for step in 1..=progress.steps {
        let percent = step * 100 / progress.steps;
        let notification = JsonRpcNotification::new(
            PROGRESS_METHOD,
            json!({
                "progress": step,
                "total": progress.steps,
                "progressToken": progress_token,
                "message": format!("Server progress {percent}%"),
            }),
        );

        if let Err(err) = sink.notify(notification).await {
            warn!(error = %err, step, "progress delivery failed, aborting");
            return;
        }
        debug!(step, total = progress.steps, "progress notification sent");

        tokio::time::sleep(progress.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uppercase_rejects_whitespace_only_input() {
        let error = perform_to_uppercase(" \t ").expect_err("expected empty input error");
        assert_eq!(error.code, crate::mcp::rpc::INVALID_PARAMS);
        assert_eq!(error.message, "input string cannot be empty");
    }

    #[test]
    fn uppercase_uses_full_unicode_mapping() {
        assert_eq!(perform_to_uppercase(" straße ").expect("valid"), "STRASSE");
    }

    #[test]
    fn progress_token_defaults_to_null() {
        let params: ToolCallParams = serde_json::from_value(json!({
            "name": "to-uppercase-slowly",
            "arguments": {"input": "a"},
            "_meta": {}
        }))
        .expect("params should parse");

        assert_eq!(params.progress_token(), Value::Null);
    }

    #[test]
    fn non_string_input_is_invalid_params() {
        let params: ToolCallParams = serde_json::from_value(json!({
            "name": "to-uppercase",
            "arguments": {"input": 42}
        }))
        .expect("params should parse");

        let error = params
            .arguments::<ToUppercaseTool>()
            .expect_err("expected invalid arguments");
        assert_eq!(error.code, crate::mcp::rpc::INVALID_PARAMS);
        assert_eq!(error.message, "Invalid params: arguments.input must be a string");
    }

    #[test]
    fn missing_input_is_reported_as_required() {
        for arguments in [json!({}), json!({"other": "x"})] {
            let params: ToolCallParams = serde_json::from_value(json!({
                "name": "to-uppercase",
                "arguments": arguments
            }))
            .expect("params should parse");

            let error = params
                .arguments::<ToUppercaseTool>()
                .expect_err("expected missing input");
            assert_eq!(error.message, "Invalid params: arguments.input is required");
        }
    }

    #[test]
    fn non_object_meta_is_ignored() {
        for meta in [json!("x"), json!(7), json!(null), json!({"progressToken": 3})] {
            let params: ToolCallParams = serde_json::from_value(json!({
                "name": "to-uppercase-slowly",
                "arguments": {"input": "a"},
                "_meta": meta.clone()
            }))
            .expect("params should parse");

            let expected = meta.get("progressToken").cloned().unwrap_or(Value::Null);
            assert_eq!(params.progress_token(), expected);
        }
    }

    #[test]
    fn default_schedule_matches_ten_steps_of_300ms() {
        let schedule = ProgressSchedule::default();
        assert_eq!(schedule.steps, 10);
        assert_eq!(schedule.interval, Duration::from_millis(300));
    }
}
