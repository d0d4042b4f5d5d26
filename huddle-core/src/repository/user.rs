use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{User, UserId},
    Result,
};

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, user: &User) -> Result<User> {
        let row = sqlx::query(
            r"
            INSERT INTO users (id, username, last_online, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, last_online, created_at
            ",
        )
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(user.last_online)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await?;

        self.row_to_user(row)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, user_id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, username, last_online, created_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| self.row_to_user(row)).transpose()
    }

    /// Stamp the user's last-seen time with now
    pub async fn update_last_seen(&self, user_id: &UserId) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET last_online = $2
            WHERE id = $1
            ",
        )
        .bind(user_id.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    fn row_to_user(&self, row: PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from_string(row.try_get("id")?),
            username: row.try_get("username")?,
            last_online: row.try_get("last_online")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
