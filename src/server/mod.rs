//! # Server Components
//!
//! - [`server`]: the listener and accept loop ([`RelayServer`])
//! - [`session`]: one connected client and its read loop ([`Session`])
//! - [`registry`]: the shared set of live sessions used for broadcast

pub mod registry;
pub mod server;
pub mod session;

pub use registry::SessionRegistry;
pub use server::{RelayServer, ServerState};
pub use session::{Session, SessionId};
