//! Channel metadata records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named, credential-protected telemetry channel.
///
/// `secret` holds the PHC-encoded credential hash produced by
/// [`crate::hash`]. It travels with the record through the store but is
/// never serialized into API responses; handlers return [`ChannelView`]
/// instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub secret: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    /// Create a channel record with a fresh id and current timestamps.
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            name: name.into(),
            secret: secret.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace name and secret, bumping the updated timestamp.
    pub fn apply(&mut self, name: impl Into<String>, secret: impl Into<String>) {
        self.name = name.into();
        self.secret = secret.into();
        self.updated_at = Utc::now();
    }

    /// The secret-free projection sent to API clients.
    pub fn view(&self) -> ChannelView {
        ChannelView {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// What API clients see: a [`Channel`] without its credential hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelView {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_channel_gets_id_and_timestamps() {
        let channel = Channel::new("WRT", "hash");
        assert!(!channel.id.is_empty());
        assert_eq!(channel.created_at, channel.updated_at);
    }

    #[test]
    fn apply_bumps_updated_at_only() {
        let mut channel = Channel::new("WRT", "hash");
        let created = channel.created_at;
        channel.apply("GT3", "other-hash");
        assert_eq!(channel.name, "GT3");
        assert_eq!(channel.secret, "other-hash");
        assert_eq!(channel.created_at, created);
        assert!(channel.updated_at >= created);
    }

    #[test]
    fn view_omits_the_secret() {
        let channel = Channel::new("WRT", "hash");
        let json = serde_json::to_value(channel.view()).unwrap();
        assert!(json.get("secret").is_none());
        assert_eq!(json["name"], "WRT");
        assert!(json.get("createdAt").is_some());
    }
}
