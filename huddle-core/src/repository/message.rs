use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{ChannelId, Message, MessageId, NewMessage, UserId},
    Result,
};

/// Chat message repository for database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a chat message, assigning its ID and timestamp
    pub async fn create(&self, message: &NewMessage) -> Result<Message> {
        let row = sqlx::query(
            r"
            INSERT INTO messages (id, channel_id, user_id, content, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, channel_id, user_id, content, is_pinned, created_at
            ",
        )
        .bind(MessageId::new().as_str())
        .bind(message.channel_id.as_str())
        .bind(message.user_id.as_str())
        .bind(&message.content)
        .fetch_one(&self.pool)
        .await?;

        self.row_to_message(row)
    }

    fn row_to_message(&self, row: PgRow) -> Result<Message> {
        Ok(Message {
            id: MessageId::from_string(row.try_get("id")?),
            channel_id: ChannelId::from_string(row.try_get("channel_id")?),
            user_id: UserId::from_string(row.try_get("user_id")?),
            content: row.try_get("content")?,
            is_pinned: row.try_get("is_pinned")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
