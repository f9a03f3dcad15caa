//! Relay error types and their close-frame mapping.

use crate::protocol;
use hub_channels::{HashError, RepoError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Unknown channel id.
    #[error("no channel found matching id {0}")]
    NotFound(String),

    /// Incorrect password.
    #[error("incorrect password")]
    Unauthorised,

    /// Producer slot taken or subscriber set at capacity.
    #[error("channel is full")]
    ChannelFull,

    /// Subscriber tag collision within one session.
    #[error("subscriber tag {0} already exists")]
    DuplicateTag(String),

    /// A read/write deadline passed, or a subscriber queue overflowed.
    #[error("{0}")]
    Timeout(&'static str),

    /// Non-text data received.
    #[error("{0}")]
    PolicyViolation(&'static str),

    /// The session was shut down underneath the connection.
    #[error("{0}")]
    Shutdown(&'static str),

    /// The peer closed or the transport dropped mid-operation.
    #[error("connection closed")]
    ConnectionClosed,

    #[error("websocket transport error: {0}")]
    Transport(#[from] warp::Error),

    #[error("frame encoding failed: {0}")]
    Codec(#[from] serde_json::Error),

    #[error(transparent)]
    Store(RepoError),

    #[error(transparent)]
    Hash(#[from] HashError),

    /// Unclassified server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// The status code carried on the close frame for this error.
    pub fn close_code(&self) -> u16 {
        match self {
            RelayError::NotFound(_) => protocol::NOT_FOUND,
            RelayError::Unauthorised => protocol::UNAUTHORISED,
            RelayError::ChannelFull => protocol::CHANNEL_FULL,
            RelayError::Timeout(_) => protocol::TIMEOUT,
            RelayError::PolicyViolation(_) => protocol::POLICY_VIOLATION,
            RelayError::Shutdown(_) => protocol::GOING_AWAY,
            RelayError::DuplicateTag(_)
            | RelayError::ConnectionClosed
            | RelayError::Transport(_)
            | RelayError::Codec(_)
            | RelayError::Store(_)
            | RelayError::Hash(_)
            | RelayError::Internal(_) => protocol::INTERNAL_ERROR,
        }
    }

    /// The reason string carried alongside the status code.
    pub fn close_reason(&self) -> String {
        self.to_string()
    }
}

/// Unknown ids keep their own close status; everything else from the
/// store is an internal failure.
impl From<RepoError> for RelayError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound(id) => RelayError::NotFound(id),
            other => RelayError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
