//! Channel-scoped realtime fan-out
//!
//! A [`Hub`] owns the map of live sessions per channel and serializes every
//! mutation through one coordination loop. The relays sit on top of a
//! [`HubHandle`]: [`ChatRelay`] persists and fans out chat traffic,
//! [`SignalingRelay`] routes peer-connection negotiation.

pub mod error;
pub mod hub;
pub mod relay;

pub use error::{Error, Result};
pub use hub::{
    Exclude, Hub, HubHandle, HubKind, InboundKind, InboundMessage, OutboundFrame, PeerDirectory,
    PeerInfo, ServerEvent, ServerEventKind, SessionHandle,
};
pub use relay::{ChatRelay, Relay, SignalingRelay};
