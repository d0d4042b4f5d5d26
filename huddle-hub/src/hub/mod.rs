pub mod events;
pub mod registry;
pub mod session;

pub use events::{
    Exclude, InboundKind, InboundMessage, MediaStatePayload, OutboundFrame, PeerInfo,
    ServerEvent, ServerEventKind,
};
pub use registry::{Hub, HubHandle, HubKind, PeerDirectory};
pub use session::{Delivery, SessionHandle};
