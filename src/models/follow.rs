//! Follow edges of the social graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directed edge: `follower_id` follows `followee_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub id: i64,
    pub follower_id: i64,
    pub followee_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of toggling a follow edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowToggle {
    /// Edge did not exist and was inserted
    Created(Follow),
    /// Edge existed and was deleted
    Removed,
}
