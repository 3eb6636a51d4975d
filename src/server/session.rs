//! # Connection Session
//!
//! Server-side representation of one connected client. A session owns the
//! write half of its socket behind an async mutex, so any task may call
//! [`Session::send`] while the session's own task runs the read loop in
//! [`Session::run`].
//!
//! ## Lifecycle
//!
//! ```text
//! accept -> Session::new -> reserve_welcome -> registry.register -> run()
//!   run(): welcome -> read/broadcast loop -> teardown()
//! teardown(): unregister + close the writer, at most once
//! ```
//!
//! The writer is reserved before registration, so broadcasts that reach the
//! session early queue behind the welcome instead of overtaking it.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::registry::SessionRegistry;
use crate::common::codec::{read_message, write_message};
use crate::common::error::{RelayError, Result};
use crate::common::messages::Message;

/// Boxed write half so sessions can wrap TCP sockets or in-memory pipes.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Exclusive hold on a session's writer, reserved for the welcome message.
pub struct WelcomeSlot(OwnedMutexGuard<Option<BoxedWriter>>);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct Session {
    id: SessionId,
    /// Remote address label (`ip:port`)
    addr: String,
    /// `None` once the session has been closed
    writer: Arc<Mutex<Option<BoxedWriter>>>,
    /// Cleared on teardown or after a failed write
    alive: AtomicBool,
    torn_down: AtomicBool,
}

impl Session {
    /// Create a session around the write half of a connection.
    pub fn new<W>(addr: impl Into<String>, writer: W) -> Arc<Self>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Arc::new(Self {
            id: SessionId::next(),
            addr: addr.into(),
            writer: Arc::new(Mutex::new(Some(Box::new(writer)))),
            alive: AtomicBool::new(true),
            torn_down: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Text of the welcome message sent on connect.
    pub fn welcome_message(&self) -> Message {
        Message::from_server(format!("Welcome! You are connected as {}", self.addr))
    }

    /// Lock the writer for the welcome message. Take this before
    /// registering the session and hand it to [`Session::run`].
    pub async fn reserve_welcome(&self) -> WelcomeSlot {
        WelcomeSlot(self.writer.clone().lock_owned().await)
    }

    /// Serialize and write one message to this client.
    ///
    /// # Returns
    /// - `Ok(())`: the frame was written and flushed
    /// - `Err(SessionClosed)`: the session was already torn down or marked dead
    /// - `Err(SendFailure)`: the write failed; the session is now marked dead
    ///   and its read loop will finish the teardown
    pub async fn send(&self, message: &Message) -> Result<()> {
        if !self.is_alive() {
            return Err(RelayError::SessionClosed);
        }

        let mut guard = self.writer.lock().await;
        self.write_locked(&mut guard, message).await
    }

    async fn write_locked(&self, slot: &mut Option<BoxedWriter>, message: &Message) -> Result<()> {
        let Some(writer) = slot.as_mut() else {
            return Err(RelayError::SessionClosed);
        };

        match write_message(writer, message).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.alive.store(false, Ordering::SeqCst);
                warn!("⚠️  Could not send message to {}: {}", self.addr, e);
                match e {
                    RelayError::Connection(source) => Err(RelayError::SendFailure {
                        peer: self.addr.clone(),
                        source,
                    }),
                    other => Err(other),
                }
            }
        }
    }

    /// The session's read loop. Runs until the peer disconnects or sends
    /// something undecodable, then tears the session down.
    ///
    /// The session must already be registered; every message read is
    /// broadcast to all other registered sessions. The welcome is written
    /// through `welcome` before the lock is released.
    pub async fn run<R>(
        self: Arc<Self>,
        welcome: WelcomeSlot,
        mut reader: R,
        registry: Arc<SessionRegistry>,
    ) where
        R: AsyncRead + Unpin,
    {
        let WelcomeSlot(mut guard) = welcome;
        let greeted = self.write_locked(&mut guard, &self.welcome_message()).await;
        drop(guard);

        match greeted {
            Ok(()) => info!("🔗 Client connected: {}", self.addr),
            Err(e) => {
                warn!("❌ Could not welcome {}: {}", self.addr, e);
                self.teardown(&registry).await;
                return;
            }
        }

        loop {
            match read_message(&mut reader).await {
                Ok(Some(message)) => {
                    info!("📨 Received from {}: {}", self.addr, message.content);
                    registry.broadcast(&message, Some(self.id)).await;
                }
                Ok(None) => {
                    info!("🔌 Client disconnected: {}", self.addr);
                    break;
                }
                Err(e) => {
                    warn!("🔌 Client {} dropped: {}", self.addr, e);
                    break;
                }
            }
        }

        self.teardown(&registry).await;
    }

    /// Unregister and close the session. Only the first call does anything.
    ///
    /// # Returns
    /// `true` if this call performed the teardown.
    pub async fn teardown(&self, registry: &SessionRegistry) -> bool {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.alive.store(false, Ordering::SeqCst);

        registry.unregister(self).await;
        self.close().await;

        let remaining = registry.count().await;
        info!(
            "👥 Session {} ({}) closed, active clients: {}",
            self.id, self.addr, remaining
        );
        true
    }

    async fn close(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                debug!("Error closing connection for {}: {}", self.addr, e);
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("alive", &self.is_alive())
            .finish()
    }
}
