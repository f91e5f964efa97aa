use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::user::PublicUser;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Public view of a user with subscription and video counters.
    pub async fn profile(&self, user_id: Uuid) -> Result<Option<PublicUser>> {
        let row = sqlx::query(
            "SELECT u.id, u.name, u.created_at, \
                    (SELECT COUNT(*) FROM subscriptions s WHERE s.followee_id = u.id) AS subscribers_count, \
                    (SELECT COUNT(*) FROM subscriptions s WHERE s.follower_id = u.id) AS subscriptions_count, \
                    (SELECT COUNT(*) FROM videos v WHERE v.owner_id = u.id) AS videos_count \
             FROM users u \
             WHERE u.id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let profile = row.map(|row| PublicUser {
            id: row.get("id"),
            name: row.get("name"),
            created_at: row.get("created_at"),
            subscribers_count: row.get("subscribers_count"),
            subscriptions_count: row.get("subscriptions_count"),
            videos_count: row.get("videos_count"),
        });

        Ok(profile)
    }
}
