//! # Message Model
//!
//! The single value type relayed between clients. A message is stamped once
//! at creation and never mutated afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sender identity reserved for messages synthesized by the server.
pub const SERVER_SENDER: &str = "SERVER";

/// Timestamp pattern. Fixed width so timestamps compare correctly as strings.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One chat message as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Display name of the client, or [`SERVER_SENDER`]
    pub sender: String,
    /// Arbitrary text, possibly empty
    pub content: String,
    /// Creation instant formatted with [`TIMESTAMP_FORMAT`]
    pub timestamp: String,
}

impl Message {
    /// Create a message stamped with the current local time.
    ///
    /// # Example
    /// ```ignore
    /// let msg = Message::new("Alice", "hi");
    /// assert_eq!(msg.sender, "Alice");
    /// ```
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            timestamp: current_timestamp(),
        }
    }

    /// Create a message carrying the reserved server identity.
    pub fn from_server(content: impl Into<String>) -> Self {
        Self::new(SERVER_SENDER, content)
    }

    pub fn is_from_server(&self) -> bool {
        self.sender == SERVER_SENDER
    }

    /// Serialize the message body to JSON bytes (no framing).
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Deserialize a message body from JSON bytes (no framing).
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.timestamp, self.sender, self.content)
    }
}

/// Current local time formatted with [`TIMESTAMP_FORMAT`].
pub fn current_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_fixed_width() {
        let ts = current_timestamp();
        assert_eq!(ts.len(), "2024-01-01 00:00:00".len());
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn test_server_message() {
        let msg = Message::from_server("hello");
        assert_eq!(msg.sender, SERVER_SENDER);
        assert!(msg.is_from_server());
        assert!(!Message::new("Alice", "hello").is_from_server());
    }

    #[test]
    fn test_display() {
        let msg = Message {
            sender: "Bob".to_string(),
            content: "hey there".to_string(),
            timestamp: "2024-05-01 12:30:00".to_string(),
        };
        assert_eq!(msg.to_string(), "[2024-05-01 12:30:00] Bob: hey there");
    }
}
