//! Connection lifecycle: the password challenge and the steady-state
//! loops.
//!
//! Every upgraded connection follows the same protocol before it may
//! touch a session:
//!
//! ```text
//! S: {"status":4001}                       password challenge
//! C: <text frame, interpreted as secret>
//! S: {"status":4000}                       challenge passed
//! ```
//!
//! then diverges by role. A producer reads text frames and hands them to
//! the session for fan-out; a subscriber drains its queue onto the
//! socket and never reads. Every read and write carries its own
//! deadline. Any failure closes the connection with the status code the
//! error maps to, and always releases the attached slot first.

use crate::directory::ChannelDirectory;
use crate::error::{RelayError, Result};
use crate::protocol::ControlFrame;
use crate::registry::SessionRegistry;
use crate::session::ChannelSession;
use crate::subscriber::{SubscriberQueue, SubscriberSlot};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};
use warp::ws::{Message, WebSocket};

/// Deadline for each handshake step and each subscriber write.
pub const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a producer may stay silent before being disconnected.
pub const PRODUCER_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// The role a connection takes on for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Subscriber,
}

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// Drive one upgraded connection through the handshake and its
/// steady-state loop. Consumes the socket; every exit path closes it.
pub async fn run(
    role: Role,
    channel_id: String,
    socket: WebSocket,
    directory: ChannelDirectory,
    registry: Arc<SessionRegistry>,
) {
    debug!(?role, channel = %channel_id, "connection upgraded");

    let (mut sink, mut stream) = socket.split();
    let outcome = match role {
        Role::Producer => produce(&channel_id, &mut sink, &mut stream, &directory, &registry).await,
        Role::Subscriber => {
            subscribe(&channel_id, &mut sink, &mut stream, &directory, &registry).await
        }
    };

    match outcome {
        Ok(()) => debug!(?role, channel = %channel_id, "connection finished"),
        Err(e) => {
            info!(
                ?role,
                channel = %channel_id,
                code = e.close_code(),
                reason = %e,
                "closing connection"
            );
            close(&mut sink, &e).await;
        }
    }
}

/// The shared front half: resolve the channel, challenge for the
/// password, verify the reply. No slot is held yet on any failure path.
async fn handshake(
    channel_id: &str,
    sink: &mut WsSink,
    stream: &mut WsStream,
    directory: &ChannelDirectory,
) -> Result<hub_channels::Channel> {
    let channel = directory.find_by_id(channel_id).await?;

    send_control(sink, &ControlFrame::challenge_password()).await?;
    let presented = read_text(stream, IO_TIMEOUT).await?;

    if !directory.verify_secret(&channel, presented).await? {
        return Err(RelayError::Unauthorised);
    }

    Ok(channel)
}

async fn produce(
    channel_id: &str,
    sink: &mut WsSink,
    stream: &mut WsStream,
    directory: &ChannelDirectory,
    registry: &Arc<SessionRegistry>,
) -> Result<()> {
    let channel = handshake(channel_id, sink, stream, directory).await?;

    let (session, mut evicted) = registry.attach_producer(&channel.id)?;
    let _guard = ProducerGuard {
        registry,
        session: Arc::clone(&session),
    };

    // a failed ack must vacate the slot; the guard handles every exit
    // from here on
    send_control(sink, &ControlFrame::challenge_success()).await?;
    info!(channel = %channel.id, "producer attached");

    loop {
        let frame = tokio::select! {
            read = read_text(stream, PRODUCER_IDLE_TIMEOUT) => read?,
            reason = &mut evicted => {
                return Err(reason.unwrap_or(RelayError::ConnectionClosed));
            }
        };

        session.broadcast(frame);
    }
}

async fn subscribe(
    channel_id: &str,
    sink: &mut WsSink,
    stream: &mut WsStream,
    directory: &ChannelDirectory,
    registry: &Arc<SessionRegistry>,
) -> Result<()> {
    let channel = handshake(channel_id, sink, stream, directory).await?;

    let (slot, queue) = SubscriberSlot::new();
    let tag = slot.tag().to_string();
    let session = registry.attach_subscriber(&channel.id, slot)?;
    let _guard = SubscriberGuard {
        registry,
        session,
        tag: &tag,
    };

    send_control(sink, &ControlFrame::challenge_success()).await?;
    info!(channel = %channel.id, tag = %tag, "subscriber attached");

    // the receive half is deliberately never polled past this point;
    // a client-side close surfaces as a write failure
    let SubscriberQueue {
        mut frames,
        mut evicted,
    } = queue;

    loop {
        tokio::select! {
            biased;

            reason = &mut evicted => {
                return Err(reason.unwrap_or(RelayError::ConnectionClosed));
            }
            maybe = frames.recv() => match maybe {
                Some(frame) => write_frame(sink, frame, IO_TIMEOUT).await?,
                None => return Err(RelayError::ConnectionClosed),
            },
        }
    }
}

struct ProducerGuard<'a> {
    registry: &'a Arc<SessionRegistry>,
    session: Arc<ChannelSession>,
}

impl Drop for ProducerGuard<'_> {
    fn drop(&mut self) {
        self.registry.detach_producer(&self.session);
    }
}

struct SubscriberGuard<'a> {
    registry: &'a Arc<SessionRegistry>,
    session: Arc<ChannelSession>,
    tag: &'a str,
}

impl Drop for SubscriberGuard<'_> {
    fn drop(&mut self) {
        self.registry.detach_subscriber(&self.session, self.tag);
    }
}

/// Read one application frame, skipping transport keepalives. Only text
/// is acceptable; anything else is a policy violation.
async fn read_text(stream: &mut WsStream, deadline: Duration) -> Result<Bytes> {
    timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(msg)) => {
                    if msg.is_ping() || msg.is_pong() {
                        continue;
                    }
                    if msg.is_close() {
                        return Err(RelayError::ConnectionClosed);
                    }
                    if !msg.is_text() {
                        return Err(RelayError::PolicyViolation("binary data is not supported"));
                    }

                    return Ok(Bytes::copy_from_slice(msg.as_bytes()));
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(RelayError::ConnectionClosed),
            }
        }
    })
    .await
    .map_err(|_| RelayError::Timeout("read deadline exceeded"))?
}

async fn send_control(sink: &mut WsSink, frame: &ControlFrame) -> Result<()> {
    let text = frame.encode()?;
    write_message(sink, Message::text(text), IO_TIMEOUT).await
}

async fn write_frame(sink: &mut WsSink, frame: Bytes, deadline: Duration) -> Result<()> {
    // producer frames arrived as text, so this cannot actually lose data
    let text = String::from_utf8_lossy(&frame).into_owned();
    write_message(sink, Message::text(text), deadline).await
}

async fn write_message(sink: &mut WsSink, message: Message, deadline: Duration) -> Result<()> {
    timeout(deadline, sink.send(message))
        .await
        .map_err(|_| RelayError::Timeout("write deadline exceeded"))??;

    Ok(())
}

/// Best-effort close carrying the error's status and reason. The peer
/// may already be gone; that is not an error worth surfacing.
async fn close(sink: &mut WsSink, error: &RelayError) {
    let frame = Message::close_with(error.close_code(), error.close_reason());
    if let Ok(Err(e)) = timeout(IO_TIMEOUT, sink.send(frame)).await {
        debug!("close frame not delivered: {}", e);
    }
}
