use huddle_core::models::{ChannelId, ConnectionId, UserSummary};
use tokio::sync::mpsc::{self, error::TrySendError};

use super::events::{OutboundFrame, PeerInfo};

/// Outcome of a non-blocking enqueue on a session's outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The queue was full; the frame is dropped for this session only
    Full,
    /// The outbound pump is gone
    Closed,
}

/// The hub's view of one live connection, bound to one channel for life.
///
/// The registry keeps one clone, the inbound pump another for local error
/// replies. The outbound queue closes once both are dropped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub connection_id: ConnectionId,
    pub channel_id: ChannelId,
    pub user: UserSummary,
    outbound: mpsc::Sender<OutboundFrame>,
}

impl SessionHandle {
    /// Create a session with a bounded outbound queue; the receiver belongs
    /// to the outbound pump
    #[must_use]
    pub fn new(
        channel_id: ChannelId,
        user: UserSummary,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (outbound, rx) = mpsc::channel(capacity);
        let session = Self {
            connection_id: ConnectionId::new(),
            channel_id,
            user,
            outbound,
        };
        (session, rx)
    }

    /// Enqueue without waiting
    pub fn try_deliver(&self, frame: &OutboundFrame) -> Delivery {
        match self.outbound.try_send(frame.clone()) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    #[must_use]
    pub fn peer_info(&self) -> PeerInfo {
        PeerInfo {
            user_id: self.user.id.clone(),
            username: self.user.username.clone(),
            connection_id: self.connection_id.clone(),
        }
    }
}
