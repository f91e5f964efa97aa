use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: String,
    pub url: String,
    pub views: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Editable fields of a video, already validated.
#[derive(Debug, Clone)]
pub struct VideoDraft {
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: String,
    pub url: String,
    pub category_id: Option<Uuid>,
}
