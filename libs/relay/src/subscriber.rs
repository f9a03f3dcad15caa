//! Subscriber records and their backpressure boundary.
//!
//! Each subscriber owns a bounded frame queue. The session offers into
//! it without blocking; the connection's writer loop drains it at
//! whatever pace the network allows. A full queue is the signal that the
//! subscriber cannot keep up.

use crate::error::RelayError;
use bytes::Bytes;
use rand::RngCore;
use tokio::sync::{mpsc, oneshot};

/// Random tag length in bytes; hex-encoded to twice as many characters.
pub const TAG_LEN: usize = 6;

/// How many frames to queue for a subscriber before the connection is
/// dropped for being too slow.
pub const BUF_LEN: usize = 16;

/// Outcome of a non-blocking queue offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// The queue is at capacity; the subscriber must be evicted.
    Full,
    /// The writer loop is gone; the record is stale.
    Gone,
}

/// Session-side handle to one subscriber: the offer side of the queue
/// plus the eviction signal.
pub struct SubscriberSlot {
    tag: String,
    frames: mpsc::Sender<Bytes>,
    evict: Option<oneshot::Sender<RelayError>>,
}

/// Connection-side half: what the subscriber's writer loop drains.
pub struct SubscriberQueue {
    pub frames: mpsc::Receiver<Bytes>,
    pub evicted: oneshot::Receiver<RelayError>,
}

impl SubscriberSlot {
    /// Create a subscriber with a fresh random tag, returning both
    /// halves of its queue.
    pub fn new() -> (SubscriberSlot, SubscriberQueue) {
        let (frames_tx, frames_rx) = mpsc::channel(BUF_LEN);
        let (evict_tx, evict_rx) = oneshot::channel();

        let slot = SubscriberSlot {
            tag: random_tag(),
            frames: frames_tx,
            evict: Some(evict_tx),
        };
        let queue = SubscriberQueue {
            frames: frames_rx,
            evicted: evict_rx,
        };

        (slot, queue)
    }

    /// As [`SubscriberSlot::new`], but with a caller-chosen tag.
    #[cfg(test)]
    pub(crate) fn with_tag(tag: impl Into<String>) -> (SubscriberSlot, SubscriberQueue) {
        let (mut slot, queue) = SubscriberSlot::new();
        slot.tag = tag.into();

        (slot, queue)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Offer one frame without blocking.
    pub fn offer(&self, frame: Bytes) -> Offer {
        match self.frames.try_send(frame) {
            Ok(()) => Offer::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Offer::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Offer::Gone,
        }
    }

    /// Signal the writer loop to close the connection with `reason`.
    /// The close itself happens in the writer's own task.
    pub fn evict(&mut self, reason: RelayError) {
        if let Some(signal) = self.evict.take() {
            let _ = signal.send(reason);
        }
    }
}

fn random_tag() -> String {
    let mut bytes = [0u8; TAG_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);

    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_twelve_hex_characters() {
        let (slot, _queue) = SubscriberSlot::new();
        assert_eq!(slot.tag().len(), TAG_LEN * 2);
        assert!(slot.tag().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn offer_is_bounded() {
        let (slot, mut queue) = SubscriberSlot::new();

        for _ in 0..BUF_LEN {
            assert_eq!(slot.offer(Bytes::from_static(b"x")), Offer::Queued);
        }
        assert_eq!(slot.offer(Bytes::from_static(b"x")), Offer::Full);

        // draining frees a slot again
        queue.frames.recv().await.unwrap();
        assert_eq!(slot.offer(Bytes::from_static(b"x")), Offer::Queued);
    }

    #[tokio::test]
    async fn offer_after_writer_exit_reports_gone() {
        let (slot, queue) = SubscriberSlot::new();
        drop(queue);
        assert_eq!(slot.offer(Bytes::from_static(b"x")), Offer::Gone);
    }

    #[tokio::test]
    async fn eviction_reaches_the_queue_half() {
        let (mut slot, queue) = SubscriberSlot::new();
        slot.evict(RelayError::Timeout("message buffer full"));

        let reason = queue.evicted.await.unwrap();
        assert_eq!(reason.close_code(), crate::protocol::TIMEOUT);
    }
}
