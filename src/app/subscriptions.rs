use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SubscriptionService {
    db: Db,
}

#[derive(Debug, Clone)]
pub struct SubscribedUser {
    pub user: User,
    pub subscribed_at: OffsetDateTime,
}

impl SubscriptionService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Follow `followee_id` if not already followed, unfollow otherwise.
    ///
    /// Returns the membership after the call, or `None` when the followee
    /// does not exist. Targeting yourself changes nothing.
    pub async fn toggle(&self, follower_id: Uuid, followee_id: Uuid) -> Result<Option<bool>> {
        let mut tx = self.db.pool().begin().await?;

        let followee: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
            .bind(followee_id)
            .fetch_optional(&mut *tx)
            .await?;
        if followee.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        if follower_id == followee_id {
            tx.rollback().await?;
            return Ok(Some(false));
        }

        let removed = sqlx::query(
            "DELETE FROM subscriptions WHERE follower_id = $1 AND followee_id = $2",
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *tx)
        .await?;

        let subscribed = if removed.rows_affected() > 0 {
            false
        } else {
            sqlx::query(
                "INSERT INTO subscriptions (follower_id, followee_id) \
                 SELECT $1, $2 \
                 WHERE $1 <> $2 \
                 ON CONFLICT DO NOTHING",
            )
            .bind(follower_id)
            .bind(followee_id)
            .execute(&mut *tx)
            .await?;
            true
        };

        tx.commit().await?;

        Ok(Some(subscribed))
    }

    pub async fn is_subscribed(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let subscribed: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(subscribed)
    }

    pub async fn subscriber_count(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE followee_id = $1")
                .bind(user_id)
                .fetch_one(self.db.pool())
                .await?;

        Ok(count)
    }

    pub async fn subscription_count(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE follower_id = $1")
                .bind(user_id)
                .fetch_one(self.db.pool())
                .await?;

        Ok(count)
    }

    /// Users followed by `user_id`, most recent first.
    pub async fn list_subscriptions(&self, user_id: Uuid) -> Result<Vec<SubscribedUser>> {
        let rows = sqlx::query(
            "SELECT u.id, u.email, u.name, u.created_at, s.created_at AS subscribed_at \
             FROM subscriptions s \
             JOIN users u ON u.id = s.followee_id \
             WHERE s.follower_id = $1 \
             ORDER BY s.created_at DESC, u.id DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(edge_from_row).collect())
    }

    /// Users following `user_id`, derived from the same table.
    pub async fn list_subscribers(&self, user_id: Uuid) -> Result<Vec<SubscribedUser>> {
        let rows = sqlx::query(
            "SELECT u.id, u.email, u.name, u.created_at, s.created_at AS subscribed_at \
             FROM subscriptions s \
             JOIN users u ON u.id = s.follower_id \
             WHERE s.followee_id = $1 \
             ORDER BY s.created_at DESC, u.id DESC",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(edge_from_row).collect())
    }
}

fn edge_from_row(row: sqlx::postgres::PgRow) -> SubscribedUser {
    SubscribedUser {
        user: User {
            id: row.get("id"),
            email: row.get("email"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        },
        subscribed_at: row.get("subscribed_at"),
    }
}
