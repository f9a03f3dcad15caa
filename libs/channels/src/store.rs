//! Channel store with optional snapshot persistence.
//!
//! Records live in memory behind an async RwLock. With a snapshot path
//! configured, the full record set is loaded at open and rewritten as a
//! JSON file after every successful mutation, which is what makes
//! channels durable across restarts.

use crate::channel::Channel;
use crate::repo::{ChannelRepo, RepoError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub struct ChannelStore {
    channels: RwLock<HashMap<String, Channel>>,
    snapshot: Option<PathBuf>,
}

impl ChannelStore {
    /// A store that keeps channels in memory only.
    pub fn in_memory() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            snapshot: None,
        }
    }

    /// Open a store backed by a JSON snapshot file. A missing file is an
    /// empty store; the file appears on first mutation.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RepoError> {
        let path = path.into();
        let mut channels = HashMap::new();

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let records: Vec<Channel> = serde_json::from_slice(&bytes)?;
                info!(path = %path.display(), count = records.len(), "loaded channel snapshot");

                for channel in records {
                    channels.insert(channel.id.clone(), channel);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no channel snapshot yet");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            channels: RwLock::new(channels),
            snapshot: Some(path),
        })
    }

    /// Rewrite the snapshot from the given record set. Called with the
    /// write lock held so the file always reflects a consistent state.
    async fn persist(&self, channels: &HashMap<String, Channel>) -> Result<(), RepoError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        let mut records: Vec<&Channel> = channels.values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));

        let bytes = serde_json::to_vec_pretty(&records)?;
        tokio::fs::write(path, bytes).await?;

        Ok(())
    }
}

#[async_trait]
impl ChannelRepo for ChannelStore {
    async fn all(&self) -> Result<Vec<Channel>, RepoError> {
        let channels = self.channels.read().await;
        let mut records: Vec<Channel> = channels.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(records)
    }

    async fn insert(&self, channel: Channel) -> Result<Channel, RepoError> {
        let mut channels = self.channels.write().await;
        channels.insert(channel.id.clone(), channel.clone());
        self.persist(&channels).await?;

        Ok(channel)
    }

    async fn find_id(&self, id: &str) -> Result<Channel, RepoError> {
        self.channels
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(id.to_string()))
    }

    async fn update_id(
        &self,
        id: &str,
        name: String,
        secret: String,
    ) -> Result<Channel, RepoError> {
        let mut channels = self.channels.write().await;
        let channel = channels
            .get_mut(id)
            .ok_or_else(|| RepoError::NotFound(id.to_string()))?;

        channel.apply(name, secret);
        let updated = channel.clone();
        self.persist(&channels).await?;

        Ok(updated)
    }

    async fn delete_id(&self, id: &str) -> Result<Channel, RepoError> {
        let mut channels = self.channels.write().await;
        let removed = channels
            .remove(id)
            .ok_or_else(|| RepoError::NotFound(id.to_string()))?;

        self.persist(&channels).await?;

        Ok(removed)
    }

    async fn count(&self) -> Result<u64, RepoError> {
        Ok(self.channels.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_find_update_delete() {
        let store = ChannelStore::in_memory();

        let channel = store.insert(Channel::new("WRT", "hash")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let found = store.find_id(&channel.id).await.unwrap();
        assert_eq!(found.name, "WRT");

        let updated = store
            .update_id(&channel.id, "GT3".into(), "other".into())
            .await
            .unwrap();
        assert_eq!(updated.name, "GT3");
        assert_eq!(updated.id, channel.id);
        assert_eq!(updated.created_at, channel.created_at);

        let removed = store.delete_id(&channel.id).await.unwrap();
        assert_eq!(removed.name, "GT3");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_id_is_not_found() {
        let store = ChannelStore::in_memory();

        assert!(store.find_id("nope").await.unwrap_err().is_not_found());
        assert!(store
            .update_id("nope", "a".into(), "b".into())
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store.delete_id("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn all_is_ordered_by_creation() {
        let store = ChannelStore::in_memory();
        store.insert(Channel::new("first", "h")).await.unwrap();
        store.insert(Channel::new("second", "h")).await.unwrap();

        let names: Vec<String> = store
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.json");

        let store = ChannelStore::open(&path).await.unwrap();
        let channel = store.insert(Channel::new("WRT", "hash")).await.unwrap();
        drop(store);

        let reopened = ChannelStore::open(&path).await.unwrap();
        let found = reopened.find_id(&channel.id).await.unwrap();
        assert_eq!(found.name, "WRT");
        assert_eq!(found.secret, "hash");
    }

    #[tokio::test]
    async fn delete_reaches_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.json");

        let store = ChannelStore::open(&path).await.unwrap();
        let channel = store.insert(Channel::new("WRT", "hash")).await.unwrap();
        store.delete_id(&channel.id).await.unwrap();
        drop(store);

        let reopened = ChannelStore::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 0);
    }
}
