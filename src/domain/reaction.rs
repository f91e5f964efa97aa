use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Which entity a reaction is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectKind {
    Video,
    Comment,
}

impl SubjectKind {
    pub fn reactions_table(&self) -> &'static str {
        match self {
            Self::Video => "video_reactions",
            Self::Comment => "comment_reactions",
        }
    }

    pub fn subject_column(&self) -> &'static str {
        match self {
            Self::Video => "video_id",
            Self::Comment => "comment_id",
        }
    }

    pub fn subject_table(&self) -> &'static str {
        match self {
            Self::Video => "videos",
            Self::Comment => "comments",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactionSubject {
    Video(Uuid),
    Comment(Uuid),
}

impl ReactionSubject {
    pub fn kind(&self) -> SubjectKind {
        match self {
            Self::Video(_) => SubjectKind::Video,
            Self::Comment(_) => SubjectKind::Comment,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Video(id) | Self::Comment(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    Like,
    Dislike,
}

impl Polarity {
    pub fn is_like(&self) -> bool {
        matches!(self, Self::Like)
    }

    /// Action name used in form intents and route segments.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }
}

/// Persisted state of one (subject, user) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactionState {
    Absent,
    Like,
    Dislike,
}

impl ReactionState {
    pub fn from_row(is_like: Option<bool>) -> Self {
        match is_like {
            None => Self::Absent,
            Some(true) => Self::Like,
            Some(false) => Self::Dislike,
        }
    }
}

impl From<Polarity> for ReactionState {
    fn from(polarity: Polarity) -> Self {
        match polarity {
            Polarity::Like => Self::Like,
            Polarity::Dislike => Self::Dislike,
        }
    }
}

/// Write needed to move from the stored vote to the requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Insert(Polarity),
    Flip(Polarity),
    Delete,
}

impl Transition {
    /// `existing` is the stored `is_like` flag, if a row exists.
    pub fn decide(existing: Option<bool>, requested: Polarity) -> Self {
        match existing {
            None => Self::Insert(requested),
            Some(is_like) if is_like == requested.is_like() => Self::Delete,
            Some(_) => Self::Flip(requested),
        }
    }

    pub fn resulting_state(&self) -> ReactionState {
        match self {
            Self::Insert(polarity) | Self::Flip(polarity) => (*polarity).into(),
            Self::Delete => ReactionState::Absent,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub id: Uuid,
    pub subject: ReactionSubject,
    pub user_id: Uuid,
    pub is_like: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
