//! Shared vocabulary for commentable, image-bearing content

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two kinds of content users can publish and comment on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Accommodation,
}

impl ContentKind {
    /// Table holding the entity rows
    pub fn table(&self) -> &'static str {
        match self {
            ContentKind::Post => "posts",
            ContentKind::Accommodation => "accommodations",
        }
    }

    /// Table holding this kind's comment rows
    pub fn comment_table(&self) -> &'static str {
        match self {
            ContentKind::Post => "post_comments",
            ContentKind::Accommodation => "accommodation_comments",
        }
    }

    /// Table holding this kind's image rows
    pub fn image_table(&self) -> &'static str {
        match self {
            ContentKind::Post => "post_images",
            ContentKind::Accommodation => "accommodation_images",
        }
    }

    /// Foreign-key column pointing at the entity from comment/image rows
    pub fn entity_column(&self) -> &'static str {
        match self {
            ContentKind::Post => "post_id",
            ContentKind::Accommodation => "accommodation_id",
        }
    }

    /// Storage folder for this kind's uploaded images
    pub fn image_folder(&self) -> &'static str {
        match self {
            ContentKind::Post => "posts",
            ContentKind::Accommodation => "accommodations",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Post => write!(f, "post"),
            ContentKind::Accommodation => write!(f, "accommodation"),
        }
    }
}

impl FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" | "posts" => Ok(ContentKind::Post),
            "accommodation" | "accommodations" => Ok(ContentKind::Accommodation),
            _ => Err(anyhow::anyhow!("Unknown content kind: {}", s)),
        }
    }
}

/// A specific piece of content together with its owner.
///
/// This is what the comment event needs to decide who gets notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub id: i64,
    pub owner_id: i64,
}

/// Image attached to a post or accommodation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentImage {
    pub id: i64,
    pub url: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// An uploaded file waiting to be stored
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
