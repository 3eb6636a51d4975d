pub mod client;
pub mod common;
pub mod server;

pub use client::ChatClient;
pub use common::error::{RelayError, Result};
pub use common::messages::{Message, SERVER_SENDER};
pub use server::RelayServer;
