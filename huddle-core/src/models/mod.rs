pub mod channel;
pub mod id;
pub mod media_session;
pub mod message;
pub mod user;

pub use channel::{AccessType, Channel};
pub use id::{generate_id, ChannelId, ConnectionId, MediaSessionId, MessageId, UserId};
pub use media_session::{ActiveMediaSession, MediaKind, MediaSession};
pub use message::{Message, NewMessage};
pub use user::{User, UserSummary};
