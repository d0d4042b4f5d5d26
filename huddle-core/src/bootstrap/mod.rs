//! Bootstrap module for initializing the huddle server
//!
//! This module handles:
//! - Configuration loading
//! - Database initialization
//! - In-memory store seeding

pub mod config;
pub mod database;
pub mod store;

pub use config::load_config;
pub use database::init_database;
pub use store::init_dev_store;
