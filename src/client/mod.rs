//! # Client Components
//!
//! [`ChatClient`] connects to a relay server, prints or forwards what it
//! receives, and sends operator input as chat messages.

pub mod client;

pub use client::{ChatClient, InputAction, MessageHandler, QUIT_COMMAND};
