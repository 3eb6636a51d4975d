//! # Relay Server
//!
//! Accepts TCP connections and gives each one a [`Session`] on its own task.
//! The server moves between two states:
//!
//! ```text
//! Stopped --start()--> Listening --stop()--> Stopped
//! ```
//!
//! `stop()` only closes the listener. Sessions already running keep going
//! until their peers disconnect or the process exits.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::registry::SessionRegistry;
use super::session::Session;
use crate::common::config::ServerConfig;
use crate::common::error::{RelayError, Result};

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Listening,
}

/// Live listener bookkeeping, present only while `Listening`.
struct Listening {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    accept_task: JoinHandle<()>,
}

pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    listening: Mutex<Option<Listening>>,
}

impl RelayServer {
    /// Create a stopped server.
    ///
    /// # Example
    /// ```ignore
    /// let server = RelayServer::new(ServerConfig::new("127.0.0.1", 5000));
    /// let addr = server.start().await?;
    /// ```
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: Arc::new(SessionRegistry::new()),
            listening: Mutex::new(None),
        }
    }

    /// Bind the listening socket and spawn the accept loop.
    ///
    /// # Returns
    /// - `Ok(SocketAddr)`: the bound address (useful with port 0)
    /// - `Err(Bind)`: the port is unavailable; nothing was started
    ///
    /// Calling `start` while already listening returns the current address.
    pub async fn start(&self) -> Result<SocketAddr> {
        if let Some(addr) = self.local_addr() {
            warn!("⚠️  Server already listening on {}", addr);
            return Ok(addr);
        }

        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let registry = self.registry.clone();
        let accept_task = tokio::spawn(accept_loop(listener, registry, shutdown_rx));

        let raced = {
            let mut slot = self.lock_listening();
            match slot.as_ref() {
                Some(existing) => Some((existing.local_addr, shutdown_tx, accept_task)),
                None => {
                    *slot = Some(Listening {
                        local_addr,
                        shutdown_tx,
                        accept_task,
                    });
                    None
                }
            }
        };

        // Lost a race with a concurrent start(); keep the first listener.
        if let Some((existing_addr, shutdown_tx, accept_task)) = raced {
            let _ = shutdown_tx.send(());
            let _ = accept_task.await;
            return Ok(existing_addr);
        }

        info!("📡 Server listening on {}", local_addr);
        Ok(local_addr)
    }

    /// Close the listening socket. A no-op when already stopped.
    ///
    /// Returns once the accept loop has released the listener, so the port
    /// can be bound again immediately.
    pub async fn stop(&self) {
        let Some(listening) = self.lock_listening().take() else {
            return;
        };

        let _ = listening.shutdown_tx.send(());
        if let Err(e) = listening.accept_task.await {
            error!("❌ Accept loop ended abnormally: {}", e);
        }
        info!(
            "🛑 Server stopped. {} session(s) left to drain.",
            self.registry.count().await
        );
    }

    pub fn state(&self) -> ServerState {
        if self.lock_listening().is_some() {
            ServerState::Listening
        } else {
            ServerState::Stopped
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_listening().as_ref().map(|l| l.local_addr)
    }

    pub async fn session_count(&self) -> usize {
        self.registry.count().await
    }

    fn lock_listening(&self) -> MutexGuard<'_, Option<Listening>> {
        // The guarded data stays consistent even if a holder panicked.
        self.listening
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Accept connections until told to shut down. Dropping `listener` on
/// return closes the socket.
async fn accept_loop(
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("Listener closed, leaving accept loop");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, addr)) => spawn_session(socket, addr, &registry).await,
                    Err(e) => accept_failed(e).await,
                }
            }
        }
    }
}

async fn accept_failed(e: io::Error) {
    error!("❌ Accept error: {}", e);
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

/// Register a session for the new connection and start its read loop.
async fn spawn_session(socket: TcpStream, addr: SocketAddr, registry: &Arc<SessionRegistry>) {
    debug!("🔗 Accepted connection from {}", addr);

    let (reader, writer) = socket.into_split();
    let session = Session::new(addr.to_string(), writer);
    // Uncontended: nothing else knows about the session yet.
    let welcome = session.reserve_welcome().await;
    registry.register(session.clone()).await;

    let registry = registry.clone();
    tokio::spawn(session.run(welcome, reader, registry));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> ServerConfig {
        ServerConfig::new("127.0.0.1", 0)
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let server = RelayServer::new(local_config());
        assert_eq!(server.state(), ServerState::Stopped);

        let addr = server.start().await.unwrap();
        assert_eq!(server.state(), ServerState::Listening);
        assert_eq!(server.local_addr(), Some(addr));
        assert_ne!(addr.port(), 0);

        server.stop().await;
        assert_eq!(server.state(), ServerState::Stopped);
        assert_eq!(server.local_addr(), None);
    }

    #[tokio::test]
    async fn test_start_twice_keeps_listener() {
        let server = RelayServer::new(local_config());
        let first = server.start().await.unwrap();
        let second = server.start().await.unwrap();
        assert_eq!(first, second);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let server = RelayServer::new(local_config());
        server.stop().await;
        server.stop().await;
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_accept_failure_backs_off() {
        let started = tokio::time::Instant::now();
        accept_failed(io::Error::new(io::ErrorKind::Other, "too many open files")).await;
        assert!(started.elapsed() >= ACCEPT_BACKOFF);
    }

    #[tokio::test]
    async fn test_bind_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let server = RelayServer::new(ServerConfig::new("127.0.0.1", port));
        let result = server.start().await;
        assert!(matches!(result, Err(RelayError::Bind { .. })));
        assert_eq!(server.state(), ServerState::Stopped);
    }
}
