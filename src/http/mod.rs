//! HTTP Transport layer for the Model Context Protocol
//!
//! Provides the detached-channel SSE transport (`/sse` + `/message`) and the
//! single-endpoint streamable transport (`/mcp`).

use axum::response::sse::Event;
use serde::Serialize;

use crate::errors::DeliveryError;

pub mod handlers;
pub mod sse;
pub mod streamable;

pub const EVENT_ENDPOINT: &str = "endpoint";
pub const EVENT_MESSAGE: &str = "message";

/// Frames a JSON payload as an SSE `message` event.
pub fn message_event(payload: &impl Serialize) -> Result<Event, DeliveryError> {
    Event::default()
        .event(EVENT_MESSAGE)
        .json_data(payload)
        .map_err(|err| DeliveryError::Encode(err.to_string()))
}
