//! Live pub/sub engine
//!
//! Owns connected producers and subscribers for the duration of their
//! connections: the challenge handshake, per-channel sessions with
//! bounded per-subscriber buffering, fan-out, and the timeout and
//! slow-subscriber eviction policies.

pub mod directory;
pub mod error;
pub mod lifecycle;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod subscriber;

pub use directory::ChannelDirectory;
pub use error::{RelayError, Result};
pub use lifecycle::Role;
pub use registry::SessionRegistry;
pub use session::ChannelSession;
