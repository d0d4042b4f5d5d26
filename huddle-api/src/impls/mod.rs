//! Connection plumbing behind the WebSocket routes

pub mod pump;
pub mod session;
