//! Single-endpoint streamable transport
//!
//! `POST /mcp` answers with one JSON document unless the dispatcher emits a
//! notification, in which case the same response is upgraded to an SSE stream
//! carrying every notification followed by the final JSON-RPC response. An
//! upgraded response is sent with `Connection: close`, so the connection is
//! shut down once the final frame is written.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::UnboundedReceiverStream, StreamExt as _};
use tracing::{debug, warn};

use crate::{
    errors::{AppError, DeliveryError},
    http::{
        handlers::{parse_request, read_body},
        message_event,
    },
    mcp::{
        rpc::{JsonRpcNotification, JsonRpcResponse},
        server::NotificationSink,
    },
    AppState,
};

pub const PATH_MCP: &str = "/mcp";

#[derive(Debug)]
enum StreamFrame {
    /// First notification arrived: switch to SSE before anything else is written.
    Upgrade,
    Notification(JsonRpcNotification),
    /// Final response of a call that never upgraded.
    Reply(JsonRpcResponse),
    /// Final response of an upgraded call.
    Final(JsonRpcResponse),
}

/// Per-request state bound to one response. Owned by the task running the
/// dispatch and never shared with other requests.
pub struct StreamContext {
    frames: mpsc::UnboundedSender<StreamFrame>,
    request_id: Option<Value>,
    upgraded: bool,
}

impl StreamContext {
    fn new(frames: mpsc::UnboundedSender<StreamFrame>, request_id: Option<Value>) -> Self {
        Self {
            frames,
            request_id,
            upgraded: false,
        }
    }

    pub fn is_upgraded(&self) -> bool {
        self.upgraded
    }

    fn finish(self, response: JsonRpcResponse) {
        let frame = if self.upgraded {
            StreamFrame::Final(response)
        } else {
            StreamFrame::Reply(response)
        };

        if self.frames.send(frame).is_err() {
            debug!(request_id = ?self.request_id, "client left before the response was written");
        }
    }

    fn send(&self, frame: StreamFrame) -> Result<(), DeliveryError> {
        self.frames.send(frame).map_err(|_| DeliveryError::Closed)
    }
}

#[async_trait]
impl NotificationSink for StreamContext {
    async fn notify(&mut self, notification: JsonRpcNotification) -> Result<(), DeliveryError> {
        if !self.upgraded {
            self.upgraded = true;
            debug!(request_id = ?self.request_id, "upgrading response to event stream");
            self.send(StreamFrame::Upgrade)?;
        }
        self.send(StreamFrame::Notification(notification))
    }
}

pub async fn mcp_endpoint(State(state): State<AppState>, body: Body) -> Result<Response, AppError> {
    let payload = read_body(body, state.max_body_bytes).await?;
    let request = parse_request(&payload)?;

    let (frames, mut receiver) = mpsc::unbounded_channel();
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        let mut context = StreamContext::new(frames, request.id.clone());
        let response = dispatcher.dispatch(request, &mut context).await;
        context.finish(response);
    });

    match receiver.recv().await {
        Some(StreamFrame::Reply(response)) => Ok(Json(response).into_response()),
        Some(StreamFrame::Upgrade) => Ok(upgraded_response(receiver)),
        Some(frame) => Err(AppError::internal(format!(
            "unexpected frame before upgrade: {frame:?}"
        ))),
        None => Err(AppError::internal("dispatch ended without a response")),
    }
}

fn upgraded_response(receiver: mpsc::UnboundedReceiver<StreamFrame>) -> Response {
    let events = UnboundedReceiverStream::new(receiver).filter_map(|frame| match frame {
        StreamFrame::Notification(notification) => encode(&notification),
        StreamFrame::Final(response) => encode(&response),
        StreamFrame::Upgrade | StreamFrame::Reply(_) => None,
    });

    (
        StatusCode::OK,
        [(header::CONNECTION, HeaderValue::from_static("close"))],
        Sse::new(events),
    )
        .into_response()
}

fn encode(payload: &impl Serialize) -> Option<Result<Event, Infallible>> {
    match message_event(payload) {
        Ok(event) => Some(Ok(event)),
        Err(err) => {
            warn!(error = %err, "skipping unencodable stream frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn first_notification_upgrades_exactly_once() {
        let (frames, mut receiver) = mpsc::unbounded_channel();
        let mut context = StreamContext::new(frames, Some(json!(1)));
        assert!(!context.is_upgraded());

        for step in 0..3 {
            context
                .notify(JsonRpcNotification::new("notifications/progress", json!({"progress": step})))
                .await
                .expect("receiver is alive");
        }
        assert!(context.is_upgraded());
        context.finish(JsonRpcResponse::result(Some(json!(1)), json!({})));

        assert!(matches!(receiver.recv().await, Some(StreamFrame::Upgrade)));
        for _ in 0..3 {
            assert!(matches!(
                receiver.recv().await,
                Some(StreamFrame::Notification(_))
            ));
        }
        assert!(matches!(receiver.recv().await, Some(StreamFrame::Final(_))));
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn silent_dispatch_replies_without_upgrade() {
        let (frames, mut receiver) = mpsc::unbounded_channel();
        let context = StreamContext::new(frames, None);
        context.finish(JsonRpcResponse::result(None, json!({})));

        assert!(matches!(receiver.recv().await, Some(StreamFrame::Reply(_))));
    }

    #[tokio::test]
    async fn notify_after_client_left_reports_closed() {
        let (frames, receiver) = mpsc::unbounded_channel();
        drop(receiver);
        let mut context = StreamContext::new(frames, None);

        let err = context
            .notify(JsonRpcNotification::new("notifications/progress", json!({})))
            .await
            .expect_err("expected closed stream");
        assert!(matches!(err, DeliveryError::Closed));
    }
}
