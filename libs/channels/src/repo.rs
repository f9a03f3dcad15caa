//! Read/write port for channel metadata.

use crate::channel::Channel;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    /// No channel matched the queried id.
    #[error("no channel found matching id {0}")]
    NotFound(String),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store snapshot is malformed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound(_))
    }
}

/// Storage contract for channel metadata.
///
/// The relay consumes only the read side (`find_id`); the CRUD surface
/// uses the rest.
#[async_trait]
pub trait ChannelRepo: Send + Sync + 'static {
    /// All channels, in unspecified order.
    async fn all(&self) -> Result<Vec<Channel>, RepoError>;

    /// Store a new channel and hand it back.
    async fn insert(&self, channel: Channel) -> Result<Channel, RepoError>;

    /// Find a channel by its id.
    async fn find_id(&self, id: &str) -> Result<Channel, RepoError>;

    /// Replace a channel's name and secret, bumping its updated
    /// timestamp. Returns the updated record.
    async fn update_id(&self, id: &str, name: String, secret: String)
        -> Result<Channel, RepoError>;

    /// Remove a channel by its id, returning the removed record.
    async fn delete_id(&self, id: &str) -> Result<Channel, RepoError>;

    /// How many channels exist.
    async fn count(&self) -> Result<u64, RepoError>;
}
