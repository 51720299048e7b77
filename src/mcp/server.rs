//! The central Model Context Protocol engine
//!
//! Provides the dispatch contract both transports drive, capabilities
//! negotiation (`initialize`) and tool routing.

use async_trait::async_trait;
use rust_mcp_sdk::schema::{
    Implementation, InitializeResult, ListToolsResult, ServerCapabilities,
    ServerCapabilitiesTools,
};
use tracing::info;

use crate::domain::tools::{build_tools_list, handle_tools_call, ProgressSchedule};
use crate::errors::DeliveryError;
use crate::mcp::rpc::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

pub const SUPPORTED_PROTOCOL_VERSION: &str = "2025-03-26";

/// Destination for notifications emitted while a call is in flight.
///
/// Each transport supplies its own sink. A notification is handed to the
/// transport before `notify` returns; the dispatcher never buffers.
#[async_trait]
pub trait NotificationSink: Send {
    async fn notify(&mut self, notification: JsonRpcNotification) -> Result<(), DeliveryError>;
}

#[async_trait]
pub trait MethodDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        request: JsonRpcRequest,
        sink: &mut dyn NotificationSink,
    ) -> JsonRpcResponse;
}

#[derive(Debug, Clone, Default)]
pub struct McpServer {
    progress: ProgressSchedule,
}

impl McpServer {
    pub fn new(progress: ProgressSchedule) -> Self {
        Self { progress }
    }
}

#[async_trait]
impl MethodDispatcher for McpServer {
    async fn dispatch(
        &self,
        request: JsonRpcRequest,
        sink: &mut dyn NotificationSink,
    ) -> JsonRpcResponse {
        let JsonRpcRequest {
            method, params, id, ..
        } = request;

        let response = match method.as_str() {
            "initialize" => JsonRpcResponse::result(id, initialize_result()),
            "tools/list" => JsonRpcResponse::result(
                id,
                ListToolsResult {
                    meta: None,
                    next_cursor: None,
                    tools: build_tools_list(),
                },
            ),
            "tools/call" => handle_tools_call(&self.progress, id, params, sink).await,
            _ => JsonRpcResponse::error(id, JsonRpcError::method_not_found()),
        };

        info!(
            method = %method,
            outcome = if response.is_error() { "failure" } else { "success" },
            "mcp action audited"
        );

        response
    }
}

pub fn initialize_result() -> InitializeResult {
    InitializeResult {
        server_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            description: None,
            icons: vec![],
            website_url: None,
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools {
                list_changed: Some(true),
            }),
            ..Default::default()
        },
        protocol_version: SUPPORTED_PROTOCOL_VERSION.to_string(),
        instructions: None,
        meta: None,
    }
}
