//! Read-side metadata port used by the connection lifecycle.

use crate::error::Result;
use hub_channels::{hash, Channel, ChannelRepo};
use std::sync::Arc;

/// Thin adapter over the channel repository: id lookup and secret
/// verification, nothing else. The stored credential hash passes through
/// uninterpreted.
#[derive(Clone)]
pub struct ChannelDirectory {
    repo: Arc<dyn ChannelRepo>,
}

impl ChannelDirectory {
    pub fn new(repo: Arc<dyn ChannelRepo>) -> Self {
        Self { repo }
    }

    /// Look up channel metadata by id. Unknown ids surface with their
    /// own close status.
    pub async fn find_by_id(&self, id: &str) -> Result<Channel> {
        Ok(self.repo.find_id(id).await?)
    }

    /// Verify a presented secret against the channel's stored hash.
    /// Runs on the blocking pool; key derivation is CPU-bound.
    pub async fn verify_secret(&self, channel: &Channel, presented: bytes::Bytes) -> Result<bool> {
        let encoded = channel.secret.clone();
        let matched = tokio::task::spawn_blocking(move || hash::verify(&encoded, &presented))
            .await
            .map_err(|e| {
                crate::error::RelayError::Internal(format!("verification task failed: {e}"))
            })??;

        Ok(matched)
    }
}
