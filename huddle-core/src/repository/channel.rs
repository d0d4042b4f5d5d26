use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{AccessType, Channel, ChannelId, UserId},
    Error, Result,
};

/// Channel and channel membership repository
#[derive(Clone)]
pub struct ChannelRepository {
    pool: PgPool,
}

impl ChannelRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a channel and make its admin the first member
    pub async fn create(&self, channel: &Channel) -> Result<Channel> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r"
            INSERT INTO channels (id, name, admin_id, access_type, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, admin_id, access_type, created_at
            ",
        )
        .bind(channel.id.as_str())
        .bind(&channel.name)
        .bind(channel.admin_id.as_str())
        .bind(channel.access_type.as_str())
        .bind(channel.created_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO channel_members (channel_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (channel_id, user_id) DO NOTHING
            ",
        )
        .bind(channel.id.as_str())
        .bind(channel.admin_id.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.row_to_channel(row)
    }

    /// Get channel by ID
    pub async fn get_by_id(&self, channel_id: &ChannelId) -> Result<Option<Channel>> {
        let row = sqlx::query(
            r"
            SELECT id, name, admin_id, access_type, created_at
            FROM channels
            WHERE id = $1
            ",
        )
        .bind(channel_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| self.row_to_channel(row)).transpose()
    }

    /// Add a user to a channel; adding an existing member is a no-op
    pub async fn add_member(&self, channel_id: &ChannelId, user_id: &UserId) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO channel_members (channel_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (channel_id, user_id) DO NOTHING
            ",
        )
        .bind(channel_id.as_str())
        .bind(user_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Check whether a user belongs to a channel
    pub async fn is_member(&self, channel_id: &ChannelId, user_id: &UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS(
                SELECT 1 FROM channel_members
                WHERE channel_id = $1 AND user_id = $2
            )
            ",
        )
        .bind(channel_id.as_str())
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    fn row_to_channel(&self, row: PgRow) -> Result<Channel> {
        let access_type: String = row.try_get("access_type")?;
        let access_type = access_type.parse::<AccessType>().map_err(Error::Internal)?;

        Ok(Channel {
            id: ChannelId::from_string(row.try_get("id")?),
            name: row.try_get("name")?,
            admin_id: UserId::from_string(row.try_get("admin_id")?),
            access_type,
            created_at: row.try_get("created_at")?,
        })
    }
}
