//! Threaded comments on posts and accommodations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ContentKind;

/// A comment, or a reply when `parent_id` is set.
///
/// Post and accommodation comments live in separate tables; `kind` records
/// which one the row came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub kind: ContentKind,
    pub entity_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Comment as shown in listings, with author details and reply count
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub username: String,
    pub avatar: String,
    pub reply_count: i64,
}
