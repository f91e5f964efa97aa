use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::reaction::{ReactionCounts, ReactionState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub video_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub parent_id: Option<Uuid>,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub comment: Comment,
    pub counts: ReactionCounts,
    pub viewer_state: ReactionState,
}

/// A root comment and its replies, oldest reply first.
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    pub root: CommentView,
    pub replies: Vec<CommentView>,
}
