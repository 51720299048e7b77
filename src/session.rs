//! SSE session registry
//!
//! Maps opaque session identifiers to the outbound half of an open `GET /sse`
//! stream so that `POST /message` callbacks can be routed back to their client.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use axum::response::sse::Event;
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::DeliveryError;

/// Generates an unguessable 128-bit identifier, hex encoded.
pub fn new_session_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// One open SSE stream. Cloning shares the same underlying connection.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    sender: mpsc::UnboundedSender<Event>,
}

impl Session {
    pub fn new(id: impl Into<String>, sender: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            id: id.into(),
            sender,
        }
    }

    pub fn send(&self, event: Event) -> Result<(), DeliveryError> {
        self.sender.send(event).map_err(|_| DeliveryError::Closed)
    }
}

pub trait SessionStore: Send + Sync {
    fn create(&self) -> String {
        new_session_id()
    }

    fn register(&self, session: Session);

    fn lookup(&self, id: &str) -> Option<Session>;

    fn remove(&self, id: &str) -> Option<Session>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn register(&self, session: Session) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id.clone(), session);
    }

    fn lookup(&self, id: &str) -> Option<Session> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn remove(&self, id: &str) -> Option<Session> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Deregisters its session when dropped, whatever ended the stream.
pub struct SessionGuard {
    id: String,
    store: Arc<dyn SessionStore>,
}

impl SessionGuard {
    pub fn new(id: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            id: id.into(),
            store,
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.store.remove(&self.id);
        debug!(session_id = %self.id, "sse session closed");
    }
}
