//! Process-wide session registry.
//!
//! Maps channel ids to live sessions. Sessions are created lazily on
//! first attach and removed once nothing is attached on either side.
//! Attach and removal both run under the map's entry lock, so exactly
//! one session exists per id at any time and a pruned session can never
//! be handed to a new connection. Lock order is always registry entry
//! first, session slot second; the broadcast path never touches the
//! registry.

use crate::error::{RelayError, Result};
use crate::session::ChannelSession;
use crate::subscriber::SubscriberSlot;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info};

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<ChannelSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a producer to the channel's session, creating the session
    /// if absent. Returns the session and the producer's eviction
    /// signal.
    pub fn attach_producer(
        &self,
        channel_id: &str,
    ) -> Result<(Arc<ChannelSession>, oneshot::Receiver<RelayError>)> {
        let entry = self
            .sessions
            .entry(channel_id.to_string())
            .or_insert_with(|| {
                debug!(channel = %channel_id, "creating session");
                Arc::new(ChannelSession::new(channel_id))
            });

        let session = Arc::clone(entry.value());
        let evicted = session.attach_producer()?;

        Ok((session, evicted))
    }

    /// Attach a subscriber to the channel's session, creating the
    /// session if absent.
    pub fn attach_subscriber(
        &self,
        channel_id: &str,
        slot: SubscriberSlot,
    ) -> Result<Arc<ChannelSession>> {
        let entry = self
            .sessions
            .entry(channel_id.to_string())
            .or_insert_with(|| {
                debug!(channel = %channel_id, "creating session");
                Arc::new(ChannelSession::new(channel_id))
            });

        let session = Arc::clone(entry.value());
        session.attach_subscriber(slot)?;

        Ok(session)
    }

    /// Vacate the producer slot on the given session and prune it from
    /// the map if idle. Operating on the session instance rather than
    /// re-resolving the id keeps a detach from ever touching a
    /// replacement session.
    pub fn detach_producer(&self, session: &ChannelSession) {
        session.detach_producer();
        self.prune(session.channel_id());
    }

    /// Remove one subscriber from the given session and prune it from
    /// the map if idle.
    pub fn detach_subscriber(&self, session: &ChannelSession, tag: &str) {
        session.detach_subscriber(tag);
        self.prune(session.channel_id());
    }

    /// Drop the session outright, closing every attached connection.
    /// Used when the channel itself is deleted.
    pub fn remove(&self, channel_id: &str, reason: &'static str) -> bool {
        match self.sessions.remove(channel_id) {
            Some((_, session)) => {
                info!(channel = %channel_id, reason, "shutting down session");
                session.shutdown(reason);

                true
            }
            None => false,
        }
    }

    pub fn contains(&self, channel_id: &str) -> bool {
        self.sessions.contains_key(channel_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove the session if nothing is attached. The idle check runs
    /// under the entry lock, so it cannot race a concurrent attach.
    fn prune(&self, channel_id: &str) {
        if self
            .sessions
            .remove_if(channel_id, |_, session| session.is_idle())
            .is_some()
        {
            debug!(channel = %channel_id, "pruned idle session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_session_per_channel() {
        let registry = SessionRegistry::new();

        let (producer_session, _evicted) = registry.attach_producer("x").unwrap();
        let (slot, _queue) = SubscriberSlot::new();
        let subscriber_session = registry.attach_subscriber("x", slot).unwrap();

        assert!(Arc::ptr_eq(&producer_session, &subscriber_session));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn second_producer_is_rejected() {
        let registry = SessionRegistry::new();

        let (_session, _evicted) = registry.attach_producer("x").unwrap();
        assert!(matches!(
            registry.attach_producer("x"),
            Err(RelayError::ChannelFull)
        ));
    }

    #[test]
    fn idle_sessions_are_pruned() {
        let registry = SessionRegistry::new();

        let (session, _evicted) = registry.attach_producer("x").unwrap();
        assert!(registry.contains("x"));

        registry.detach_producer(&session);
        assert!(!registry.contains("x"));
    }

    #[test]
    fn occupied_sessions_survive_a_detach() {
        let registry = SessionRegistry::new();

        let (slot, _queue) = SubscriberSlot::new();
        let tag = slot.tag().to_string();
        let subscriber_session = registry.attach_subscriber("x", slot).unwrap();

        let (session, _evicted) = registry.attach_producer("x").unwrap();
        registry.detach_subscriber(&subscriber_session, &tag);

        // the producer is still attached, so the session stays
        assert!(registry.contains("x"));

        registry.detach_producer(&session);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn remove_shuts_the_session_down() {
        let registry = SessionRegistry::new();

        let (_session, evicted) = registry.attach_producer("x").unwrap();
        assert!(registry.remove("x", "channel deleted"));
        assert!(!registry.contains("x"));

        let reason = evicted.await.unwrap();
        assert_eq!(reason.close_code(), crate::protocol::GOING_AWAY);

        // removing again is a no-op
        assert!(!registry.remove("x", "channel deleted"));
    }
}
