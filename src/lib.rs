use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod session;

use config::Transport;
use http::{handlers::not_allowed, sse, streamable};
use mcp::server::MethodDispatcher;
use session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<dyn MethodDispatcher>,
    pub sessions: Arc<dyn SessionStore>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<dyn MethodDispatcher>,
        sessions: Arc<dyn SessionStore>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            dispatcher,
            sessions,
            max_body_bytes,
        }
    }
}

pub fn build_app(transport: Transport, state: AppState) -> Router {
    match transport {
        Transport::Sse => build_sse_app(state),
        Transport::Streamable => build_streamable_app(state),
    }
}

pub fn build_sse_app(state: AppState) -> Router {
    Router::new()
        .route(sse::PATH_SSE, get(sse::open_stream).fallback(not_allowed))
        .route(
            sse::PATH_MESSAGE,
            post(sse::post_message).fallback(not_allowed),
        )
        .fallback(not_allowed)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

pub fn build_streamable_app(state: AppState) -> Router {
    Router::new()
        .route(
            streamable::PATH_MCP,
            post(streamable::mcp_endpoint).fallback(not_allowed),
        )
        .fallback(not_allowed)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
