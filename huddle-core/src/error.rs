use thiserror::Error;

use crate::models::{ChannelId, UserId};

/// Failures of the store and token layers
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("Channel {0} not found")]
    ChannelNotFound(ChannelId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        let (code, constraint) = match &err {
            sqlx::Error::RowNotFound => return Self::NotFound("Row not found".to_string()),
            sqlx::Error::Database(db_err) => (
                db_err.code().map(|c| c.into_owned()).unwrap_or_default(),
                db_err.constraint().unwrap_or_default().to_string(),
            ),
            _ => return Self::Database(err),
        };

        match code.as_str() {
            // unique_violation
            "23505" if constraint.starts_with("users_username") => {
                Self::AlreadyExists("Username already taken".to_string())
            }
            "23505" => Self::AlreadyExists(format!("Duplicate row for {constraint}")),
            // foreign_key_violation
            "23503" => Self::NotFound(missing_reference(&constraint).to_string()),
            // check_violation: access_type and media_type enums
            "23514" => Self::InvalidInput(format!("Value rejected by {constraint}")),
            // not_null_violation
            "23502" => Self::InvalidInput("Required field is missing".to_string()),
            _ => Self::Database(err),
        }
    }
}

/// What a failed foreign key points at, going by Postgres' default
/// `<table>_<column>_fkey` constraint names
fn missing_reference(constraint: &str) -> &'static str {
    if constraint.ends_with("channel_id_fkey") {
        "Channel not found"
    } else if constraint.ends_with("user_id_fkey") || constraint.ends_with("admin_id_fkey") {
        "User not found"
    } else {
        "Referenced row not found"
    }
}

pub type Result<T> = std::result::Result<T, Error>;
