//! # Message Codec
//!
//! Wire representation of a [`Message`]. Every record is sent with a 4-byte
//! length prefix (big-endian) followed by the JSON body:
//! ```text
//! [4 bytes: body length] [N bytes: JSON message body]
//! ```
//!
//! The prefix makes records self-delimiting, so a reader can tell a peer that
//! closed cleanly between records (`Ok(None)`) from one that vanished in the
//! middle of a record ([`RelayError::MalformedMessage`]).

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::{RelayError, Result};
use super::messages::Message;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest body accepted on the wire (16MB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Encode one message into a complete frame (prefix + body).
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    let body = message
        .to_bytes()
        .map_err(|e| RelayError::MalformedMessage(format!("failed to encode message: {}", e)))?;
    check_length(body.len())?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode exactly one complete frame.
///
/// # Errors
/// [`RelayError::MalformedMessage`] if the prefix or body is short, if bytes
/// follow the record, or if the body is not a valid message.
pub fn decode(frame: &[u8]) -> Result<Message> {
    if frame.len() < LENGTH_PREFIX_LEN {
        return Err(RelayError::MalformedMessage(format!(
            "frame holds {} of {} length bytes",
            frame.len(),
            LENGTH_PREFIX_LEN
        )));
    }

    let (prefix, body) = frame.split_at(LENGTH_PREFIX_LEN);
    let length = read_length(prefix)?;

    if body.len() < length {
        return Err(RelayError::MalformedMessage(format!(
            "truncated body: expected {} bytes, got {}",
            length,
            body.len()
        )));
    }
    if body.len() > length {
        return Err(RelayError::MalformedMessage(format!(
            "{} trailing bytes after record",
            body.len() - length
        )));
    }

    decode_body(body)
}

/// Read one message from a stream.
///
/// # Returns
/// - `Ok(Some(Message))`: a full record was read
/// - `Ok(None)`: the stream ended cleanly on a record boundary
/// - `Err(MalformedMessage)`: the stream ended mid-record or the body is invalid
/// - `Err(Connection)`: any other I/O failure
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    let mut length_buf = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;

    // read_exact cannot tell "nothing read" from "half a prefix read"
    while filled < LENGTH_PREFIX_LEN {
        let n = reader.read(&mut length_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(RelayError::MalformedMessage(format!(
                "stream ended after {} of {} length bytes",
                filled, LENGTH_PREFIX_LEN
            )));
        }
        filled += n;
    }

    let length = read_length(&length_buf)?;

    let mut data = vec![0u8; length];
    if let Err(e) = reader.read_exact(&mut data).await {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            return Err(RelayError::MalformedMessage(format!(
                "stream ended inside a {} byte record",
                length
            )));
        }
        return Err(e.into());
    }

    decode_body(&data).map(Some)
}

/// Write one message as a single frame and flush.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

fn read_length(prefix: &[u8]) -> Result<usize> {
    let mut length_buf = [0u8; LENGTH_PREFIX_LEN];
    length_buf.copy_from_slice(prefix);
    let length = u32::from_be_bytes(length_buf) as usize;
    check_length(length)?;
    Ok(length)
}

fn check_length(length: usize) -> Result<()> {
    if length > MAX_MESSAGE_SIZE {
        return Err(RelayError::MalformedMessage(format!(
            "message too large: {} bytes (max: {} bytes)",
            length, MAX_MESSAGE_SIZE
        )));
    }
    Ok(())
}

fn decode_body(body: &[u8]) -> Result<Message> {
    Message::from_bytes(body)
        .map_err(|e| RelayError::MalformedMessage(format!("invalid message body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(sender: &str, content: &str) -> Message {
        Message {
            sender: sender.to_string(),
            content: content.to_string(),
            timestamp: "2024-03-09 08:15:42".to_string(),
        }
    }

    #[test]
    fn test_roundtrip_preserves_text() {
        for (sender, content) in [
            ("Alice", "hi"),
            ("", ""),
            ("Bob", "line one\nline two"),
            ("Zoë", "emoji 🚀 and \"quotes\""),
        ] {
            let msg = sample(sender, content);
            let decoded = decode(&encode(&msg).unwrap()).unwrap();
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn test_frame_has_length_prefix() {
        let msg = sample("Alice", "hi");
        let frame = encode(&msg).unwrap();
        let body_len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(body_len, frame.len() - LENGTH_PREFIX_LEN);
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let frame = encode(&sample("Alice", "hello")).unwrap();

        assert!(matches!(
            decode(&frame[..2]),
            Err(RelayError::MalformedMessage(_))
        ));
        assert!(matches!(
            decode(&frame[..frame.len() - 1]),
            Err(RelayError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut frame = encode(&sample("Alice", "hello")).unwrap();
        frame.push(0);
        assert!(matches!(
            decode(&frame),
            Err(RelayError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_body() {
        let body = b"{\"sender\":\"x\"}";
        let mut frame = (body.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(body);
        assert!(matches!(
            decode(&frame),
            Err(RelayError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_prefix() {
        let frame = u32::MAX.to_be_bytes();
        assert!(matches!(
            decode(&frame),
            Err(RelayError::MalformedMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_reads_records_then_clean_eof() {
        let (mut writer, mut reader) = tokio::io::duplex(1024);
        let first = sample("Alice", "one");
        let second = sample("Bob", "two");

        write_message(&mut writer, &first).await.unwrap();
        write_message(&mut writer, &second).await.unwrap();
        drop(writer);

        assert_eq!(read_message(&mut reader).await.unwrap(), Some(first));
        assert_eq!(read_message(&mut reader).await.unwrap(), Some(second));
        assert_eq!(read_message(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stream_truncated_mid_body() {
        let (mut writer, mut reader) = tokio::io::duplex(1024);
        let frame = encode(&sample("Alice", "cut short")).unwrap();

        writer.write_all(&frame[..frame.len() - 3]).await.unwrap();
        drop(writer);

        let result = read_message(&mut reader).await;
        assert!(matches!(result, Err(RelayError::MalformedMessage(_))));
    }

    #[tokio::test]
    async fn test_stream_truncated_mid_prefix() {
        let (mut writer, mut reader) = tokio::io::duplex(1024);
        writer.write_all(&[0, 0]).await.unwrap();
        drop(writer);

        let result = read_message(&mut reader).await;
        assert!(matches!(result, Err(RelayError::MalformedMessage(_))));
    }
}
