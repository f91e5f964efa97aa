use std::collections::HashMap;

use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::reaction::{
    Polarity, Reaction, ReactionCounts, ReactionState, ReactionSubject, SubjectKind, Transition,
};
use crate::infra::db::{is_unique_violation, Db};

/// Attempts before a racing first vote is reported as a conflict.
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ReactionError {
    #[error("concurrent votes on {kind} {id} could not be reconciled")]
    Conflict { kind: &'static str, id: Uuid },
}

#[derive(Clone)]
pub struct ReactionService {
    db: Db,
}

impl ReactionService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Toggle `voter_id`'s vote on `subject`.
    ///
    /// Returns `None` when the subject does not exist. Repeating the stored
    /// polarity removes the vote, the opposite polarity flips it in place.
    pub async fn apply(
        &self,
        subject: ReactionSubject,
        voter_id: Uuid,
        requested: Polarity,
    ) -> Result<Option<ReactionState>> {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_apply(subject, voter_id, requested).await {
                Ok(state) => return Ok(state),
                Err(err) if is_unique_violation(&err) => {
                    tracing::warn!(
                        attempt,
                        subject_kind = subject.kind().as_str(),
                        subject_id = %subject.id(),
                        user_id = %voter_id,
                        "vote raced with a concurrent insert, re-reading"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ReactionError::Conflict {
            kind: subject.kind().as_str(),
            id: subject.id(),
        }
        .into())
    }

    async fn try_apply(
        &self,
        subject: ReactionSubject,
        voter_id: Uuid,
        requested: Polarity,
    ) -> Result<Option<ReactionState>, sqlx::Error> {
        let kind = subject.kind();
        let table = kind.reactions_table();
        let column = kind.subject_column();

        let mut tx = self.db.pool().begin().await?;

        let exists_sql = format!("SELECT id FROM {} WHERE id = $1", kind.subject_table());
        let found: Option<Uuid> = sqlx::query_scalar(&exists_sql)
            .bind(subject.id())
            .fetch_optional(&mut *tx)
            .await?;
        if found.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let existing_sql = format!(
            "SELECT is_like FROM {} WHERE {} = $1 AND user_id = $2 FOR UPDATE",
            table, column
        );
        let existing: Option<bool> = sqlx::query_scalar(&existing_sql)
            .bind(subject.id())
            .bind(voter_id)
            .fetch_optional(&mut *tx)
            .await?;

        let transition = Transition::decide(existing, requested);
        match transition {
            Transition::Insert(polarity) => {
                let sql = format!(
                    "INSERT INTO {} ({}, user_id, is_like) VALUES ($1, $2, $3)",
                    table, column
                );
                sqlx::query(&sql)
                    .bind(subject.id())
                    .bind(voter_id)
                    .bind(polarity.is_like())
                    .execute(&mut *tx)
                    .await?;
            }
            Transition::Flip(polarity) => {
                let sql = format!(
                    "UPDATE {} SET is_like = $3 WHERE {} = $1 AND user_id = $2",
                    table, column
                );
                sqlx::query(&sql)
                    .bind(subject.id())
                    .bind(voter_id)
                    .bind(polarity.is_like())
                    .execute(&mut *tx)
                    .await?;
            }
            Transition::Delete => {
                let sql = format!("DELETE FROM {} WHERE {} = $1 AND user_id = $2", table, column);
                sqlx::query(&sql)
                    .bind(subject.id())
                    .bind(voter_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        Ok(Some(transition.resulting_state()))
    }

    pub async fn find(&self, subject: ReactionSubject, user_id: Uuid) -> Result<Option<Reaction>> {
        let kind = subject.kind();
        let sql = format!(
            "SELECT id, user_id, is_like, created_at FROM {} WHERE {} = $1 AND user_id = $2",
            kind.reactions_table(),
            kind.subject_column()
        );
        let row = sqlx::query(&sql)
            .bind(subject.id())
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        let reaction = row.map(|row| Reaction {
            id: row.get("id"),
            subject,
            user_id: row.get("user_id"),
            is_like: row.get("is_like"),
            created_at: row.get("created_at"),
        });

        Ok(reaction)
    }

    pub async fn state_for(&self, subject: ReactionSubject, user_id: Uuid) -> Result<ReactionState> {
        let reaction = self.find(subject, user_id).await?;
        Ok(ReactionState::from_row(reaction.map(|r| r.is_like)))
    }

    /// Live like/dislike totals; nothing is cached on the subject row.
    pub async fn counts(&self, subject: ReactionSubject) -> Result<ReactionCounts> {
        let kind = subject.kind();
        let sql = format!(
            "SELECT COUNT(*) FILTER (WHERE is_like) AS likes, \
                    COUNT(*) FILTER (WHERE NOT is_like) AS dislikes \
             FROM {} WHERE {} = $1",
            kind.reactions_table(),
            kind.subject_column()
        );
        let row = sqlx::query(&sql)
            .bind(subject.id())
            .fetch_one(self.db.pool())
            .await?;

        Ok(ReactionCounts {
            likes: row.get("likes"),
            dislikes: row.get("dislikes"),
        })
    }

    pub async fn counts_many(
        &self,
        kind: SubjectKind,
        subject_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, ReactionCounts>> {
        if subject_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT {column} AS subject_id, \
                    COUNT(*) FILTER (WHERE is_like) AS likes, \
                    COUNT(*) FILTER (WHERE NOT is_like) AS dislikes \
             FROM {table} WHERE {column} = ANY($1) \
             GROUP BY {column}",
            table = kind.reactions_table(),
            column = kind.subject_column()
        );
        let rows = sqlx::query(&sql)
            .bind(subject_ids)
            .fetch_all(self.db.pool())
            .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            counts.insert(
                row.get("subject_id"),
                ReactionCounts {
                    likes: row.get("likes"),
                    dislikes: row.get("dislikes"),
                },
            );
        }

        Ok(counts)
    }

    pub async fn states_many(
        &self,
        kind: SubjectKind,
        subject_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<HashMap<Uuid, ReactionState>> {
        if subject_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT {column} AS subject_id, is_like FROM {table} \
             WHERE {column} = ANY($1) AND user_id = $2",
            table = kind.reactions_table(),
            column = kind.subject_column()
        );
        let rows = sqlx::query(&sql)
            .bind(subject_ids)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        let mut states = HashMap::with_capacity(rows.len());
        for row in rows {
            let is_like: bool = row.get("is_like");
            states.insert(row.get("subject_id"), ReactionState::from_row(Some(is_like)));
        }

        Ok(states)
    }
}
