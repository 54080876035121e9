//! In-app notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub notice: String,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification row to be written by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub notice: String,
    pub sender_id: i64,
    pub recipient_id: i64,
}
