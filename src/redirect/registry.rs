// src/redirect/registry.rs
//! Single-slot session registry
//!
//! At most one session exists at a time. A toggle request either creates
//! and activates a fresh session from the submitted endpoints, or, when a
//! session is live, deactivates that session and ignores the submitted
//! endpoints. Sessions that end up inactive are dropped immediately.

use crate::redirect::endpoint::EndpointInput;
use crate::redirect::session::{RedirectionSession, SessionContext, SessionStatus};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Owns the only live redirection session
pub struct SessionRegistry {
    context: SessionContext,
    slot: Mutex<Option<RedirectionSession>>,
}

impl SessionRegistry {
    pub fn new(context: SessionContext) -> Self {
        Self {
            context,
            slot: Mutex::new(None),
        }
    }

    /// Toggle redirection; returns whether a session is active afterwards
    pub async fn request_toggle(&self, original: EndpointInput, replacement: EndpointInput) -> bool {
        let mut slot = self.slot.lock().await;

        let mut session = match slot.take() {
            Some(session) => {
                debug!("Toggling live session {}; submitted endpoints ignored", session.id());
                session
            }
            None => RedirectionSession::new(self.context.clone(), original, replacement),
        };

        let active = session.toggle().await;
        if active {
            *slot = Some(session);
        } else {
            info!("Discarded session {}", session.id());
        }
        active
    }

    pub async fn is_active(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    pub async fn status(&self) -> SessionStatus {
        match self.slot.lock().await.as_ref() {
            Some(session) => session.status(),
            None => SessionStatus::inactive(),
        }
    }

    /// Deactivate the live session, if any, so no override outlives the process
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(mut session) = slot.take() {
            info!("Shutting down session {}", session.id());
            session.toggle().await;
        }
    }
}
