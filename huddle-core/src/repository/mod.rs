pub mod channel;
pub mod media_session;
pub mod message;
pub mod user;

pub use channel::ChannelRepository;
pub use media_session::MediaSessionRepository;
pub use message::MessageRepository;
pub use user::UserRepository;
