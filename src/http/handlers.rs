//! Handlers and helpers shared by both transports

use axum::body::{to_bytes, Body, Bytes};

use crate::{errors::AppError, mcp::rpc::JsonRpcRequest};

pub async fn not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

pub async fn read_body(body: Body, limit: usize) -> Result<Bytes, AppError> {
    to_bytes(body, limit).await.map_err(|err| {
        tracing::warn!(error = %err, "failed to read request body");
        AppError::internal("cannot read request body")
    })
}

pub fn parse_request(payload: &[u8]) -> Result<JsonRpcRequest, AppError> {
    serde_json::from_slice(payload).map_err(|err| {
        tracing::debug!(error = %err, "rejecting malformed json-rpc body");
        AppError::bad_request("failed to parse body")
    })
}
