pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod repository;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use store::{ChatStore, MemoryStore, PgStore};
