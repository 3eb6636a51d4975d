//! # Session Registry
//!
//! The set of live sessions, and the only state shared between session
//! tasks. Membership is guarded by an async `RwLock` that is held only long
//! enough to change the map or copy it; a broadcast writes to a snapshot
//! taken when it starts, so slow recipients never hold the lock.
//!
//! ## Guarantees
//!
//! - A session unregistered before a broadcast starts is not in its snapshot.
//! - A session registered before a broadcast starts (and still live) gets it.
//! - Each session appears once in a snapshot, so nobody is delivered twice.
//! - Each recipient gets whole frames; its own writer mutex serializes
//!   concurrent broadcasts into it.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use tokio::sync::RwLock;

use super::session::{Session, SessionId};
use crate::common::error::RelayError;
use crate::common::messages::Message;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. It is visible to every broadcast that starts afterwards.
    pub async fn register(&self, session: Arc<Session>) {
        debug!("Registering session {} ({})", session.id(), session.addr());
        self.sessions.write().await.insert(session.id(), session);
    }

    /// Remove a session if present. Safe to call more than once.
    ///
    /// # Returns
    /// `true` if the session was registered.
    pub async fn unregister(&self, session: &Session) -> bool {
        self.sessions.write().await.remove(&session.id()).is_some()
    }

    /// Deliver `message` to every registered session except `exclude`.
    ///
    /// A failed send is logged by the session and skipped; it never stops
    /// delivery to the remaining recipients.
    ///
    /// # Returns
    /// Number of sessions that received the message.
    pub async fn broadcast(&self, message: &Message, exclude: Option<SessionId>) -> usize {
        let recipients = self.snapshot(exclude).await;

        let mut delivered = 0;
        for session in recipients {
            match session.send(message).await {
                Ok(()) => delivered += 1,
                Err(RelayError::SessionClosed) => {
                    debug!("Skipping closed session {} ({})", session.id(), session.addr());
                }
                // Already logged by the session; per-recipient failures stay silent to others
                Err(_) => {}
            }
        }
        delivered
    }

    /// Number of registered sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn snapshot(&self, exclude: Option<SessionId>) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|session| Some(session.id()) != exclude)
            .cloned()
            .collect()
    }
}
