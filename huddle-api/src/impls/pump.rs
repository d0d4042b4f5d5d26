//! The two tasks that move frames between a WebSocket and a hub session
//!
//! The inbound pump owns the read half: it keeps the read deadline, decodes
//! frames and hands them to a relay. The outbound pump owns the write half:
//! it drains the session's queue and sends keepalive pings. Only the
//! inbound pump unregisters, so teardown happens exactly once.

use axum::extract::ws::Message;
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use huddle_core::metrics::INBOUND_DECODE_ERRORS;
use huddle_hub::{InboundMessage, OutboundFrame, Relay, SessionHandle};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Why the outbound pump gave up on a connection
#[derive(Debug, Error)]
pub enum PumpError {
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("write failed: {0}")]
    Write(String),
}

/// Why the inbound pump stopped reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundExit {
    /// Close frame or end of stream
    Closed,
    ReadError,
    /// No pong arrived within the read deadline
    Deadline,
    HubClosed,
}

/// Read frames until the connection ends, then unregister `session`.
///
/// Every pong pushes the read deadline `pong_wait` into the future.
/// Frames that fail to decode are counted and skipped.
pub async fn run_inbound<S, E>(
    mut stream: S,
    session: SessionHandle,
    relay: Arc<dyn Relay>,
    pong_wait: Duration,
) -> InboundExit
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let hub = relay.hub().clone();
    let mut deadline = Instant::now() + pong_wait;

    let exit = loop {
        let Ok(next) = time::timeout_at(deadline, stream.next()).await else {
            debug!(connection_id = %session.connection_id, "Read deadline expired");
            break InboundExit::Deadline;
        };

        let text = match next {
            None | Some(Ok(Message::Close(_))) => break InboundExit::Closed,
            Some(Err(e)) => {
                debug!(connection_id = %session.connection_id, error = %e, "WebSocket read failed");
                break InboundExit::ReadError;
            }
            Some(Ok(Message::Pong(_))) => {
                deadline = Instant::now() + pong_wait;
                continue;
            }
            Some(Ok(Message::Text(text))) => text,
            // Pings are answered by the WebSocket layer
            Some(Ok(Message::Binary(_) | Message::Ping(_))) => continue,
        };

        let message = match InboundMessage::decode(text.as_str()) {
            Ok(message) => message,
            Err(e) => {
                INBOUND_DECODE_ERRORS
                    .with_label_values(&[hub.kind().as_str()])
                    .inc();
                warn!(connection_id = %session.connection_id, error = %e, "Skipping undecodable frame");
                continue;
            }
        };

        if let Err(e) = relay.handle(&session, message).await {
            warn!(connection_id = %session.connection_id, error = %e, "Hub stopped");
            break InboundExit::HubClosed;
        }
    };

    if let Err(e) = hub.unregister(&session).await {
        debug!(connection_id = %session.connection_id, error = %e, "Unregister skipped");
    }
    exit
}

/// Drain `outbound` into `sink`, pinging every `ping_interval`.
///
/// Returns once the queue closes, after a best-effort close frame, or as
/// soon as any write fails or takes longer than `write_wait`.
pub async fn run_outbound<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    ping_interval: Duration,
    write_wait: Duration,
) -> Result<(), PumpError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ticker = time::interval_at(Instant::now() + ping_interval, ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    let text = Message::Text(frame.as_str().to_owned().into());
                    write(&mut sink, text, write_wait).await?;
                }
                None => {
                    if let Err(e) = write(&mut sink, Message::Close(None), write_wait).await {
                        debug!(error = %e, "Close frame not sent");
                    }
                    return Ok(());
                }
            },
            _ = ticker.tick() => {
                write(&mut sink, Message::Ping(Bytes::new()), write_wait).await?;
            }
        }
    }
}

async fn write<S>(sink: &mut S, message: Message, write_wait: Duration) -> Result<(), PumpError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match time::timeout(write_wait, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PumpError::Write(e.to_string())),
        Err(_) => Err(PumpError::WriteTimeout(write_wait)),
    }
}
