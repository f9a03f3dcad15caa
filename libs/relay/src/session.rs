//! Per-channel live session state.
//!
//! A session exists while at least one party is attached to a channel:
//! at most one producer and up to [`MAX_SUBS`] subscribers. The producer
//! slot and the subscriber map are guarded by independent locks that are
//! never nested and never held across network I/O; the broadcast path
//! touches only the subscriber lock and never awaits, so a slow
//! subscriber cannot stall the producer or its peers.

use crate::error::{RelayError, Result};
use crate::subscriber::{Offer, SubscriberSlot};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Maximum number of subscribers attached to one session.
pub const MAX_SUBS: usize = 10;

pub struct ChannelSession {
    channel_id: String,
    producer: Mutex<Option<ProducerSlot>>,
    subscribers: Mutex<HashMap<String, SubscriberSlot>>,
}

struct ProducerSlot {
    evict: oneshot::Sender<RelayError>,
}

impl ChannelSession {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            producer: Mutex::new(None),
            subscribers: Mutex::new(HashMap::with_capacity(MAX_SUBS)),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Claim the producer slot. The occupancy check and the set happen
    /// under the producer lock. Returns the eviction signal the
    /// producer's read loop must watch.
    pub fn attach_producer(&self) -> Result<oneshot::Receiver<RelayError>> {
        let mut slot = self.producer.lock();
        if slot.is_some() {
            return Err(RelayError::ChannelFull);
        }

        let (evict_tx, evict_rx) = oneshot::channel();
        *slot = Some(ProducerSlot { evict: evict_tx });

        Ok(evict_rx)
    }

    /// Vacate the producer slot. Idempotent.
    pub fn detach_producer(&self) {
        self.producer.lock().take();
    }

    /// Add a subscriber, rejecting on capacity or tag collision.
    pub fn attach_subscriber(&self, slot: SubscriberSlot) -> Result<()> {
        let mut subs = self.subscribers.lock();
        if subs.len() == MAX_SUBS {
            return Err(RelayError::ChannelFull);
        }
        if subs.contains_key(slot.tag()) {
            return Err(RelayError::DuplicateTag(slot.tag().to_string()));
        }

        subs.insert(slot.tag().to_string(), slot);

        Ok(())
    }

    /// Remove a subscriber by tag. Idempotent.
    pub fn detach_subscriber(&self, tag: &str) {
        self.subscribers.lock().remove(tag);
    }

    /// Offer one frame to every subscriber queue without blocking.
    ///
    /// A subscriber whose queue is full is removed in the same critical
    /// section and signalled to close with TIMEOUT; its connection close
    /// happens asynchronously in its own writer task. Delivery to the
    /// remaining subscribers continues. Offers preserve broadcast order
    /// per subscriber.
    pub fn broadcast(&self, frame: Bytes) {
        let mut subs = self.subscribers.lock();

        subs.retain(|tag, slot| match slot.offer(frame.clone()) {
            Offer::Queued => true,
            Offer::Full => {
                warn!(
                    channel = %self.channel_id,
                    tag = %tag,
                    "subscriber buffer full; evicting"
                );
                slot.evict(RelayError::Timeout("message buffer full"));

                false
            }
            Offer::Gone => {
                debug!(channel = %self.channel_id, tag = %tag, "subscriber already gone");

                false
            }
        });
    }

    /// Whether nothing is attached on either side. Takes the two locks
    /// in turn, never together.
    pub fn is_idle(&self) -> bool {
        let producer_vacant = self.producer.lock().is_none();

        producer_vacant && self.subscribers.lock().is_empty()
    }

    pub fn has_producer(&self) -> bool {
        self.producer.lock().is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Force every attached connection to close with `reason` and clear
    /// both slots. Used when the channel itself goes away.
    pub fn shutdown(&self, reason: &'static str) {
        if let Some(producer) = self.producer.lock().take() {
            let _ = producer.evict.send(RelayError::Shutdown(reason));
        }

        let mut subs = self.subscribers.lock();
        for (_, mut slot) in subs.drain() {
            slot.evict(RelayError::Shutdown(reason));
        }
    }
}
