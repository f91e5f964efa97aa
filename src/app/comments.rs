use std::collections::HashMap;

use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::app::reactions::ReactionService;
use crate::domain::comment::{Comment, CommentThread, CommentView};
use crate::domain::reaction::{ReactionState, SubjectKind};
use crate::infra::db::Db;

pub const MAX_COMMENT_LEN: usize = 2000;

/// Reasons a new comment is refused.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommentError {
    #[error("Le commentaire ne peut pas être vide")]
    Empty,
    #[error("Le commentaire ne peut pas dépasser 2000 caractères")]
    TooLong,
    #[error("Le commentaire parent est introuvable")]
    ParentNotFound,
    #[error("Le commentaire parent appartient à une autre vidéo")]
    ParentOnOtherVideo,
    #[error("Impossible de répondre à une réponse")]
    NestedReply,
}

pub fn validate_content(content: &str) -> Result<String, CommentError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CommentError::Empty);
    }
    if trimmed.chars().count() > MAX_COMMENT_LEN {
        return Err(CommentError::TooLong);
    }
    Ok(trimmed.to_string())
}

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create a root comment, or a reply when `parent_id` is set.
    ///
    /// Replies must target a root comment of the same video; anything else is
    /// refused with a [`CommentError`].
    pub async fn create(
        &self,
        video_id: Uuid,
        author_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Comment> {
        let content = validate_content(content)?;

        let mut tx = self.db.pool().begin().await?;

        if let Some(parent_id) = parent_id {
            // Held until commit so the parent cannot vanish before the insert.
            let parent = sqlx::query(
                "SELECT video_id, parent_id FROM comments WHERE id = $1 FOR KEY SHARE",
            )
            .bind(parent_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(CommentError::ParentNotFound)?;

            let parent_video: Uuid = parent.get("video_id");
            let grandparent: Option<Uuid> = parent.get("parent_id");
            if parent_video != video_id {
                return Err(CommentError::ParentOnOtherVideo.into());
            }
            if grandparent.is_some() {
                return Err(CommentError::NestedReply.into());
            }
        }

        let row = sqlx::query(
            "WITH inserted AS ( \
                INSERT INTO comments (video_id, author_id, parent_id, content) \
                VALUES ($1, $2, $3, $4) \
                RETURNING id, video_id, author_id, parent_id, content, created_at \
             ) \
             SELECT c.*, u.name AS author_name \
             FROM inserted c \
             JOIN users u ON u.id = c.author_id",
        )
        .bind(video_id)
        .bind(author_id)
        .bind(parent_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(comment_from_row(&row))
    }

    pub async fn get(&self, comment_id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "SELECT c.id, c.video_id, c.author_id, c.parent_id, c.content, c.created_at, \
                    u.name AS author_name \
             FROM comments c \
             JOIN users u ON u.id = c.author_id \
             WHERE c.id = $1",
        )
        .bind(comment_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    /// Delete a comment owned by `author_id`. Returns its video id when deleted.
    pub async fn delete(&self, comment_id: Uuid, author_id: Uuid) -> Result<Option<Uuid>> {
        let video_id: Option<Uuid> = sqlx::query_scalar(
            "DELETE FROM comments WHERE id = $1 AND author_id = $2 RETURNING video_id",
        )
        .bind(comment_id)
        .bind(author_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(video_id)
    }

    /// Root comments newest first, each followed by its replies oldest first.
    pub async fn list_threads(
        &self,
        video_id: Uuid,
        viewer_id: Option<Uuid>,
    ) -> Result<Vec<CommentThread>> {
        let root_rows = sqlx::query(
            "SELECT c.id, c.video_id, c.author_id, c.parent_id, c.content, c.created_at, \
                    u.name AS author_name \
             FROM comments c \
             JOIN users u ON u.id = c.author_id \
             WHERE c.video_id = $1 AND c.parent_id IS NULL \
             ORDER BY c.created_at DESC, c.id DESC",
        )
        .bind(video_id)
        .fetch_all(self.db.pool())
        .await?;

        let roots: Vec<Comment> = root_rows.iter().map(comment_from_row).collect();
        if roots.is_empty() {
            return Ok(Vec::new());
        }
        let root_ids: Vec<Uuid> = roots.iter().map(|c| c.id).collect();

        let reply_rows = sqlx::query(
            "SELECT c.id, c.video_id, c.author_id, c.parent_id, c.content, c.created_at, \
                    u.name AS author_name \
             FROM comments c \
             JOIN users u ON u.id = c.author_id \
             WHERE c.video_id = $1 AND c.parent_id = ANY($2) \
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(video_id)
        .bind(&root_ids)
        .fetch_all(self.db.pool())
        .await?;
        let replies: Vec<Comment> = reply_rows.iter().map(comment_from_row).collect();

        let all_ids: Vec<Uuid> = root_ids
            .iter()
            .copied()
            .chain(replies.iter().map(|c| c.id))
            .collect();

        let reactions = ReactionService::new(self.db.clone());
        let counts = reactions.counts_many(SubjectKind::Comment, &all_ids).await?;
        let states = match viewer_id {
            Some(viewer_id) => {
                reactions
                    .states_many(SubjectKind::Comment, &all_ids, viewer_id)
                    .await?
            }
            None => HashMap::new(),
        };

        let view = |comment: Comment| CommentView {
            counts: counts.get(&comment.id).copied().unwrap_or_default(),
            viewer_state: states
                .get(&comment.id)
                .copied()
                .unwrap_or(ReactionState::Absent),
            comment,
        };

        Ok(assemble_threads(roots, replies, view))
    }
}

/// Attach each reply to its root; replies keep their incoming order.
fn assemble_threads<F>(roots: Vec<Comment>, replies: Vec<Comment>, view: F) -> Vec<CommentThread>
where
    F: Fn(Comment) -> CommentView,
{
    let mut by_parent: HashMap<Uuid, Vec<CommentView>> = HashMap::new();
    for reply in replies {
        if let Some(parent_id) = reply.parent_id {
            by_parent.entry(parent_id).or_default().push(view(reply));
        }
    }

    roots
        .into_iter()
        .map(|root| {
            let replies = by_parent.remove(&root.id).unwrap_or_default();
            CommentThread {
                root: view(root),
                replies,
            }
        })
        .collect()
}

fn comment_from_row(row: &sqlx::postgres::PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        video_id: row.get("video_id"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}
