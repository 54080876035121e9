//! Social feed post

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentImage, ContentKind, ContentRef};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub caption: Option<String>,
    pub description: Option<String>,
    /// Set by an admin; new posts start unapproved
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<ContentImage>,
}

impl Post {
    pub fn content_ref(&self) -> ContentRef {
        ContentRef {
            kind: ContentKind::Post,
            id: self.id,
            owner_id: self.user_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePostInput {
    pub content: String,
    pub caption: Option<String>,
    pub description: Option<String>,
}
