//! Detached-channel transport
//!
//! `GET /sse` opens a long-lived event stream bound to a fresh session and
//! advertises the callback URL as its first `endpoint` event. `POST /message`
//! accepts a JSON-RPC call for that session, acknowledges it with 202 and
//! delivers the response later as a `message` event on the open stream.

use std::{
    convert::Infallible,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, KeepAliveStream, Sse},
};
use axum_extra::extract::{Query, QueryRejection};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::UnboundedReceiverStream, Stream};
use tracing::{debug, info, warn};

use crate::{
    errors::{AppError, DeliveryError},
    http::{
        handlers::{parse_request, read_body},
        message_event, EVENT_ENDPOINT,
    },
    mcp::{
        rpc::{JsonRpcNotification, JsonRpcRequest},
        server::NotificationSink,
    },
    session::{Session, SessionGuard, SessionStore},
    AppState,
};

pub const PATH_SSE: &str = "/sse";
pub const PATH_MESSAGE: &str = "/message";

/// Event stream of one session. Dropping it (client disconnect, shutdown)
/// deregisters the session.
pub struct SessionStream {
    events: UnboundedReceiverStream<Event>,
    _guard: SessionGuard,
}

impl Stream for SessionStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events)
            .poll_next(cx)
            .map(|event| event.map(Ok))
    }
}

pub async fn open_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Sse<KeepAliveStream<SessionStream>> {
    let sessions = state.sessions.clone();
    let session_id = sessions.create();
    let (sender, receiver) = mpsc::unbounded_channel();
    let session = Session::new(session_id.clone(), sender);
    sessions.register(session.clone());
    let guard = SessionGuard::new(session_id.clone(), sessions);

    let endpoint = endpoint_url(&headers, &session_id);
    if let Err(err) = session.send(Event::default().event(EVENT_ENDPOINT).data(&endpoint)) {
        warn!(session_id = %session_id, error = %err, "failed to announce endpoint");
    }
    info!(session_id = %session_id, endpoint = %endpoint, "sse session opened");

    Sse::new(SessionStream {
        events: UnboundedReceiverStream::new(receiver),
        _guard: guard,
    })
    .keep_alive(KeepAlive::default())
}

/// Absolute callback URL for a session. The `Host` header is echoed verbatim;
/// without one the URL is relative.
pub fn endpoint_url(headers: &HeaderMap, session_id: &str) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());

    match host {
        Some(host) => format!(
            "{}://{host}{PATH_MESSAGE}?sessionid={session_id}",
            scheme_from_headers(headers)
        ),
        None => format!("{PATH_MESSAGE}?sessionid={session_id}"),
    }
}

fn scheme_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "http".to_string())
}

/// Repeated `sessionid` keys are tolerated; the first one wins.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    #[serde(default)]
    pub sessionid: Vec<String>,
}

impl MessageQuery {
    pub fn session_id(&self) -> Option<&str> {
        self.sessionid
            .first()
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

pub async fn post_message(
    State(state): State<AppState>,
    query: Result<Query<MessageQuery>, QueryRejection>,
    body: Body,
) -> Result<StatusCode, AppError> {
    let query = query.map(|Query(query)| query).unwrap_or_else(|err| {
        debug!(error = %err, "ignoring unparseable query string");
        MessageQuery::default()
    });
    let session_id = query
        .session_id()
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request("sessionid must be provided for POST requests"))?;

    if state.sessions.lookup(&session_id).is_none() {
        return Err(AppError::not_found(
            "session not found, establish SSE stream first",
        ));
    }

    let payload = read_body(body, state.max_body_bytes).await?;
    let request = parse_request(&payload)?;

    debug!(session_id = %session_id, method = %request.method, "accepted json-rpc call");
    tokio::spawn(respond(state, session_id, request));

    Ok(StatusCode::ACCEPTED)
}

/// Dispatches one call and writes the response down the session's stream.
/// A session that vanished meanwhile loses the response; nothing is retried.
async fn respond(state: AppState, session_id: String, request: JsonRpcRequest) {
    let mut sink = SessionSink {
        sessions: state.sessions.clone(),
        session_id: session_id.clone(),
    };
    let response = state.dispatcher.dispatch(request, &mut sink).await;

    if let Err(err) = deliver(state.sessions.as_ref(), &session_id, &response) {
        warn!(session_id = %session_id, error = %err, "dropping json-rpc response");
    }
}

fn deliver(
    sessions: &dyn SessionStore,
    session_id: &str,
    payload: &impl Serialize,
) -> Result<(), DeliveryError> {
    let session = sessions
        .lookup(session_id)
        .ok_or_else(|| DeliveryError::SessionGone(session_id.to_string()))?;
    session.send(message_event(payload)?)
}

/// Routes notifications to whichever stream currently owns the session.
pub struct SessionSink {
    sessions: Arc<dyn SessionStore>,
    session_id: String,
}

#[async_trait]
impl NotificationSink for SessionSink {
    async fn notify(&mut self, notification: JsonRpcNotification) -> Result<(), DeliveryError> {
        deliver(self.sessions.as_ref(), &self.session_id, &notification)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn endpoint_url_without_host_is_relative() {
        let url = endpoint_url(&HeaderMap::new(), "abc");
        assert_eq!(url, "/message?sessionid=abc");
    }

    #[test]
    fn endpoint_url_echoes_host_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("bad host!!"));

        let url = endpoint_url(&headers, "abc");
        assert_eq!(url, "http://bad host!!/message?sessionid=abc");
    }

    #[test]
    fn first_session_id_wins() {
        let query = MessageQuery {
            sessionid: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(query.session_id(), Some("a"));

        let empty = MessageQuery {
            sessionid: vec![String::new(), "b".to_string()],
        };
        assert_eq!(empty.session_id(), None);
    }

    #[test]
    fn scheme_prefers_forwarded_proto() {
        let mut headers = HeaderMap::new();
        assert_eq!(scheme_from_headers(&headers), "http");

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(scheme_from_headers(&headers), "https");
    }
}
