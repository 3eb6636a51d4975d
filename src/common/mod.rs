//! # Common Components
//!
//! Shared utilities and data structures used by both client and server components.
//!
//! ## Modules
//!
//! - [`messages`]: The chat message value and the reserved server identity
//! - [`codec`]: Length-prefixed framing of messages over a byte stream
//! - [`error`]: The library error type
//! - [`config`]: Configuration parsing utilities
//! - [`logging`]: Logger setup shared by the binaries

pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod messages;
