//! HTTP and WebSocket surface of the huddle server

pub mod http;
pub mod impls;
