use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::app::validation::{is_web_url, FieldErrors};
use crate::domain::video::{Video, VideoDraft};
use crate::infra::db::Db;

const VIDEO_COLUMNS: &str = "v.id, v.owner_id, u.name AS owner_name, v.category_id, \
     c.name AS category_name, v.title, v.description, v.thumbnail_url, v.url, v.views, v.created_at";

const VIDEO_FROM: &str = "FROM videos v \
     JOIN users u ON u.id = v.owner_id \
     LEFT JOIN categories c ON c.id = v.category_id";

/// Raw form input for creating or editing a video.
#[derive(Debug, Clone, Default)]
pub struct VideoInput {
    pub title: String,
    pub description: String,
    pub url: String,
    pub thumbnail_url: String,
    pub category_id: String,
}

impl VideoInput {
    pub fn validate(&self) -> Result<VideoDraft, FieldErrors> {
        let mut errors = FieldErrors::default();

        let title = self.title.trim();
        let title_len = title.chars().count();
        if title.is_empty() {
            errors.push("title", "Veuillez entrer un titre");
        } else if title_len < 3 {
            errors.push("title", "Le titre doit contenir au moins 3 caractères");
        } else if title_len > 255 {
            errors.push("title", "Le titre ne peut pas dépasser 255 caractères");
        }

        let url = self.url.trim();
        if url.is_empty() {
            errors.push("url", "Veuillez entrer l'URL de la vidéo");
        } else if !is_web_url(url) {
            errors.push("url", "Veuillez entrer une URL valide");
        }

        let thumbnail_url = self.thumbnail_url.trim();
        if thumbnail_url.is_empty() {
            errors.push("thumbnail_url", "Veuillez entrer l'URL de la miniature");
        } else if !is_web_url(thumbnail_url) {
            errors.push("thumbnail_url", "Veuillez entrer une URL valide");
        }

        let category_id = match self.category_id.trim() {
            "" => None,
            raw => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.push("category_id", "Catégorie invalide");
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let description = self.description.trim();
        Ok(VideoDraft {
            title: title.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            thumbnail_url: thumbnail_url.to_string(),
            url: url.to_string(),
            category_id,
        })
    }
}

impl From<&Video> for VideoInput {
    fn from(video: &Video) -> Self {
        Self {
            title: video.title.clone(),
            description: video.description.clone().unwrap_or_default(),
            url: video.url.clone(),
            thumbnail_url: video.thumbnail_url.clone(),
            category_id: video
                .category_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct VideoService {
    db: Db,
}

impl VideoService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(&self, owner_id: Uuid, draft: VideoDraft) -> Result<Video> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO videos (owner_id, category_id, title, description, thumbnail_url, url, views) \
             VALUES ($1, $2, $3, $4, $5, $6, 0) \
             RETURNING id",
        )
        .bind(owner_id)
        .bind(draft.category_id)
        .bind(draft.title)
        .bind(draft.description)
        .bind(draft.thumbnail_url)
        .bind(draft.url)
        .fetch_one(self.db.pool())
        .await?;

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("video {} vanished after insert", id))
    }

    pub async fn get(&self, video_id: Uuid) -> Result<Option<Video>> {
        let sql = format!("SELECT {} {} WHERE v.id = $1", VIDEO_COLUMNS, VIDEO_FROM);
        let row = sqlx::query(&sql)
            .bind(video_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(video_from_row))
    }

    /// Bump the view counter by one. Returns false for an unknown video.
    pub async fn record_view(&self, video_id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE videos SET views = views + 1 WHERE id = $1")
            .bind(video_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Owner-only update; `None` when the video is missing or not owned.
    pub async fn update(
        &self,
        video_id: Uuid,
        owner_id: Uuid,
        draft: VideoDraft,
    ) -> Result<Option<Video>> {
        let updated: Option<Uuid> = sqlx::query_scalar(
            "UPDATE videos \
             SET title = $3, description = $4, thumbnail_url = $5, url = $6, category_id = $7 \
             WHERE id = $1 AND owner_id = $2 \
             RETURNING id",
        )
        .bind(video_id)
        .bind(owner_id)
        .bind(draft.title)
        .bind(draft.description)
        .bind(draft.thumbnail_url)
        .bind(draft.url)
        .bind(draft.category_id)
        .fetch_optional(self.db.pool())
        .await?;

        match updated {
            Some(id) => self.get(id).await,
            None => Ok(None),
        }
    }

    /// Comments and reactions go with the video (`ON DELETE CASCADE`).
    pub async fn delete(&self, video_id: Uuid, owner_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM videos WHERE id = $1 AND owner_id = $2")
            .bind(video_id)
            .bind(owner_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Video>> {
        let sql = format!(
            "SELECT {} {} ORDER BY v.created_at DESC, v.id DESC LIMIT $1",
            VIDEO_COLUMNS, VIDEO_FROM
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(video_from_row).collect())
    }

    pub async fn list_all(&self) -> Result<Vec<Video>> {
        let sql = format!(
            "SELECT {} {} ORDER BY v.created_at DESC, v.id DESC",
            VIDEO_COLUMNS, VIDEO_FROM
        );
        let rows = sqlx::query(&sql).fetch_all(self.db.pool()).await?;

        Ok(rows.iter().map(video_from_row).collect())
    }

    pub async fn list_by_category(&self, category_id: Uuid) -> Result<Vec<Video>> {
        let sql = format!(
            "SELECT {} {} WHERE v.category_id = $1 ORDER BY v.created_at DESC, v.id DESC",
            VIDEO_COLUMNS, VIDEO_FROM
        );
        let rows = sqlx::query(&sql)
            .bind(category_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(video_from_row).collect())
    }

    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Video>> {
        let sql = format!(
            "SELECT {} {} WHERE v.owner_id = $1 ORDER BY v.created_at DESC, v.id DESC",
            VIDEO_COLUMNS, VIDEO_FROM
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(video_from_row).collect())
    }

    /// Videos published by creators that `user_id` subscribes to.
    pub async fn list_from_subscriptions(&self, user_id: Uuid) -> Result<Vec<Video>> {
        let sql = format!(
            "SELECT {} {} \
             WHERE v.owner_id IN (SELECT followee_id FROM subscriptions WHERE follower_id = $1) \
             ORDER BY v.created_at DESC, v.id DESC",
            VIDEO_COLUMNS, VIDEO_FROM
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(video_from_row).collect())
    }

    /// Case-insensitive substring match on title or description.
    pub async fn search(&self, query: &str) -> Result<Vec<Video>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = format!("%{}%", escape_like_pattern(query));
        let sql = format!(
            "SELECT {} {} \
             WHERE v.title ILIKE $1 ESCAPE '\\' OR v.description ILIKE $1 ESCAPE '\\' \
             ORDER BY v.created_at DESC, v.id DESC",
            VIDEO_COLUMNS, VIDEO_FROM
        );
        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(video_from_row).collect())
    }
}

fn escape_like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn video_from_row(row: &sqlx::postgres::PgRow) -> Video {
    Video {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        owner_name: row.get("owner_name"),
        category_id: row.get("category_id"),
        category_name: row.get("category_name"),
        title: row.get("title"),
        description: row.get("description"),
        thumbnail_url: row.get("thumbnail_url"),
        url: row.get("url"),
        views: row.get("views"),
        created_at: row.get("created_at"),
    }
}
