//! # Chat Client
//!
//! Connects once to a relay server, runs a background receive loop that hands
//! every incoming [`Message`] to a callback, and sends the operator's lines
//! under a chosen display name.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut client = ChatClient::new(ClientConfig::new("localhost", 5000, "Alice"))
//!     .on_message(|msg| println!("[Received] {}", msg));
//! client.connect().await?;
//! client.send("Hello, everyone!").await?;
//! client.disconnect().await;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::common::codec::{read_message, write_message};
use crate::common::config::ClientConfig;
use crate::common::error::{RelayError, Result};
use crate::common::messages::Message;

/// Callback invoked for each received message, on the receive task.
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// Token that ends an interactive session.
pub const QUIT_COMMAND: &str = "/quit";

/// What to do with one line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Send(String),
    Skip,
    Quit,
}

impl InputAction {
    /// `/quit` matches case-insensitively with surrounding whitespace
    /// ignored. Only a line with nothing before its terminator is skipped;
    /// whitespace-only lines are sent as typed.
    pub fn parse(line: &str) -> Self {
        let text = line.trim_end_matches(['\r', '\n']);
        if text.trim().eq_ignore_ascii_case(QUIT_COMMAND) {
            InputAction::Quit
        } else if text.is_empty() {
            InputAction::Skip
        } else {
            InputAction::Send(text.to_string())
        }
    }
}

pub struct ChatClient {
    config: ClientConfig,
    handler: MessageHandler,
    writer: Mutex<Option<OwnedWriteHalf>>,
    connected: Arc<AtomicBool>,
    receive_task: Option<JoinHandle<()>>,
}

impl ChatClient {
    /// Create a disconnected client. Received messages are printed to stdout
    /// until a handler is set with [`ChatClient::on_message`].
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            handler: Arc::new(|message: Message| println!("{}", message)),
            writer: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            receive_task: None,
        }
    }

    /// Replace the handler called for every incoming message.
    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Open the connection and start the background receive loop.
    ///
    /// # Errors
    /// [`RelayError::Connection`] if the server cannot be reached.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let address = self.config.server_address();
        let stream = TcpStream::connect(&address).await?;
        let (reader, writer) = stream.into_split();

        *self.writer.lock().await = Some(writer);
        self.connected.store(true, Ordering::SeqCst);

        info!("🤝 Connected to {} as {}", address, self.config.name);

        let connected = self.connected.clone();
        let handler = self.handler.clone();
        self.receive_task = Some(tokio::spawn(receive_loop(reader, handler, connected)));
        Ok(())
    }

    /// Send `text` as a message from this client's display name.
    ///
    /// # Errors
    /// - [`RelayError::NotConnected`]: not connected, nothing was attempted
    /// - [`RelayError::Connection`]: the write failed
    pub async fn send(&self, text: &str) -> Result<()> {
        if !self.is_connected() {
            warn!("⚠️  Not connected.");
            return Err(RelayError::NotConnected);
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(RelayError::NotConnected)?;

        let message = Message::new(self.config.name.clone(), text);
        if let Err(e) = write_message(writer, &message).await {
            error!("❌ Failed to send message: {}", e);
            return Err(e);
        }
        Ok(())
    }

    /// Close both directions of the connection and stop the receive loop.
    /// Safe to call when already disconnected.
    pub async fn disconnect(&mut self) {
        let was_connected = self.connected.swap(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                warn!("⚠️  Error while disconnecting: {}", e);
            }
        }
        if let Some(task) = self.receive_task.take() {
            // The read half lives in the task; aborting it drops the socket.
            task.abort();
            let _ = task.await;
        }

        if was_connected {
            info!("👋 Disconnected.");
        }
    }
}

async fn receive_loop(
    mut reader: OwnedReadHalf,
    handler: MessageHandler,
    connected: Arc<AtomicBool>,
) {
    loop {
        match read_message(&mut reader).await {
            Ok(Some(message)) => handler(message),
            Ok(None) => {
                if connected.swap(false, Ordering::SeqCst) {
                    info!("🔌 Server closed the connection");
                }
                break;
            }
            Err(e) => {
                if connected.swap(false, Ordering::SeqCst) {
                    error!("❌ Connection lost: {}", e);
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(InputAction::parse("/quit"), InputAction::Quit);
        assert_eq!(InputAction::parse("  /QUIT \n"), InputAction::Quit);
        assert_eq!(InputAction::parse("/Quit"), InputAction::Quit);
        assert_eq!(InputAction::parse(""), InputAction::Skip);
        assert_eq!(InputAction::parse("\r\n"), InputAction::Skip);
        assert_eq!(
            InputAction::parse("   \n"),
            InputAction::Send("   ".to_string())
        );
        assert_eq!(
            InputAction::parse("hello world\n"),
            InputAction::Send("hello world".to_string())
        );
        assert_eq!(
            InputAction::parse("/quitting"),
            InputAction::Send("/quitting".to_string())
        );
    }

    #[tokio::test]
    async fn test_send_before_connect_is_rejected() {
        let client = ChatClient::new(ClientConfig::new("127.0.0.1", 1, "Alice"));
        assert!(!client.is_connected());
        let result = client.send("hi").await;
        assert!(matches!(result, Err(RelayError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client = ChatClient::new(ClientConfig::new("127.0.0.1", port, "Alice"));
        let result = client.connect().await;
        assert!(matches!(result, Err(RelayError::Connection(_))));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_without_connect() {
        let mut client = ChatClient::new(ClientConfig::default());
        client.disconnect().await;
        client.disconnect().await;
        assert!(!client.is_connected());
    }
}
