use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{
        ActiveMediaSession, ChannelId, MediaKind, MediaSession, MediaSessionId, UserId,
        UserSummary,
    },
    Error, Result,
};

/// Media session repository: one row per (channel, user, media kind)
#[derive(Clone)]
pub struct MediaSessionRepository {
    pool: PgPool,
}

impl MediaSessionRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record whether a user's media of one kind is active.
    ///
    /// The first report for a (channel, user, kind) triple inserts a row,
    /// later reports only flip `is_active`.
    pub async fn upsert(
        &self,
        channel_id: &ChannelId,
        user_id: &UserId,
        media_type: MediaKind,
        is_active: bool,
    ) -> Result<MediaSession> {
        let row = sqlx::query(
            r"
            INSERT INTO media_sessions (id, channel_id, user_id, media_type, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            ON CONFLICT (channel_id, user_id, media_type) DO UPDATE
            SET is_active = EXCLUDED.is_active,
                updated_at = NOW()
            RETURNING id, channel_id, user_id, media_type, is_active, created_at, updated_at
            ",
        )
        .bind(MediaSessionId::new().as_str())
        .bind(channel_id.as_str())
        .bind(user_id.as_str())
        .bind(media_type.as_str())
        .bind(is_active)
        .fetch_one(&self.pool)
        .await?;

        self.row_to_session(row)
    }

    /// Active sessions of a channel joined with their users
    pub async fn list_active(&self, channel_id: &ChannelId) -> Result<Vec<ActiveMediaSession>> {
        let rows = sqlx::query(
            r"
            SELECT ms.id, ms.media_type, u.id AS user_id, u.username
            FROM media_sessions ms
            JOIN users u ON u.id = ms.user_id
            WHERE ms.channel_id = $1 AND ms.is_active = TRUE
            ORDER BY ms.updated_at
            ",
        )
        .bind(channel_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ActiveMediaSession {
                    id: MediaSessionId::from_string(row.try_get("id")?),
                    media_type: parse_media_kind(&row)?,
                    user: UserSummary::new(
                        UserId::from_string(row.try_get("user_id")?),
                        row.try_get::<String, _>("username")?,
                    ),
                })
            })
            .collect()
    }

    fn row_to_session(&self, row: PgRow) -> Result<MediaSession> {
        Ok(MediaSession {
            id: MediaSessionId::from_string(row.try_get("id")?),
            channel_id: ChannelId::from_string(row.try_get("channel_id")?),
            user_id: UserId::from_string(row.try_get("user_id")?),
            media_type: parse_media_kind(&row)?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn parse_media_kind(row: &PgRow) -> Result<MediaKind> {
    let raw: String = row.try_get("media_type")?;
    raw.parse().map_err(Error::Internal)
}
