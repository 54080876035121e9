//! Notification repository

use crate::db::{on_pool, DynDatabasePool};
use crate::models::{NewNotification, Notification};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const SELECT_NOTIFICATION: &str =
    "SELECT id, notice, sender_id, recipient_id, is_read, created_at FROM notifications";

macro_rules! notification_from_row {
    ($row:expr) => {{
        let row = &$row;
        Notification {
            id: row.try_get("id")?,
            notice: row.try_get("notice")?,
            sender_id: row.try_get("sender_id")?,
            recipient_id: row.try_get("recipient_id")?,
            is_read: row.try_get("is_read")?,
            created_at: row.try_get("created_at")?,
        }
    }};
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Insert all rows in one transaction, returning how many were written
    async fn create_many(&self, notifications: &[NewNotification]) -> Result<usize>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Notification>>;

    /// A recipient's notifications, newest first
    async fn list_for_recipient(&self, recipient_id: i64) -> Result<Vec<Notification>>;

    async fn count_unread(&self, recipient_id: i64) -> Result<i64>;

    async fn mark_read(&self, id: i64) -> Result<()>;
}

pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create_many(&self, notifications: &[NewNotification]) -> Result<usize> {
        if notifications.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();

        on_pool!(self.pool, |conn| {
            let mut tx = conn.begin().await.context("Failed to begin transaction")?;
            for notification in notifications {
                sqlx::query(
                    r#"
                    INSERT INTO notifications (notice, sender_id, recipient_id, is_read, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&notification.notice)
                .bind(notification.sender_id)
                .bind(notification.recipient_id)
                .bind(false)
                .bind(now)
                .execute(&mut *tx)
                .await
                .context("Failed to create notification")?;
            }
            tx.commit().await.context("Failed to commit notifications")?;
        });

        Ok(notifications.len())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Notification>> {
        let sql = format!("{} WHERE id = ?", SELECT_NOTIFICATION);
        on_pool!(self.pool, |conn| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get notification")?;
            match row {
                Some(row) => Ok(Some(notification_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn list_for_recipient(&self, recipient_id: i64) -> Result<Vec<Notification>> {
        let sql = format!("{} WHERE recipient_id = ? ORDER BY id DESC", SELECT_NOTIFICATION);
        on_pool!(self.pool, |conn| {
            let rows = sqlx::query(&sql)
                .bind(recipient_id)
                .fetch_all(conn)
                .await
                .context("Failed to list notifications")?;
            let mut items = Vec::with_capacity(rows.len());
            for row in rows {
                items.push(notification_from_row!(row));
            }
            Ok(items)
        })
    }

    async fn count_unread(&self, recipient_id: i64) -> Result<i64> {
        on_pool!(self.pool, |conn| {
            let count: i64 = sqlx::query(
                "SELECT COUNT(*) AS count FROM notifications WHERE recipient_id = ? AND is_read = ?",
            )
            .bind(recipient_id)
            .bind(false)
            .fetch_one(conn)
            .await
            .context("Failed to count unread notifications")?
            .try_get("count")?;
            Ok(count)
        })
    }

    async fn mark_read(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |conn| {
            sqlx::query("UPDATE notifications SET is_read = ? WHERE id = ?")
                .bind(true)
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to mark notification read")?;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};

    fn notice(sender_id: i64, recipient_id: i64, text: &str) -> NewNotification {
        NewNotification {
            notice: text.to_string(),
            sender_id,
            recipient_id,
        }
    }

    #[tokio::test]
    async fn test_create_many_and_list_newest_first() {
        let pool = setup_pool().await;
        let a = insert_user(&pool, "a", "HOST").await;
        let b = insert_user(&pool, "b", "TENANT").await;
        let c = insert_user(&pool, "c", "TENANT").await;
        let repo = SqlxNotificationRepository::new(pool);

        let written = repo
            .create_many(&[notice(a, b, "first"), notice(a, c, "other"), notice(a, b, "second")])
            .await
            .unwrap();
        assert_eq!(written, 3);

        let for_b = repo.list_for_recipient(b).await.unwrap();
        assert_eq!(for_b.len(), 2);
        assert_eq!(for_b[0].notice, "second");
        assert!(for_b.iter().all(|n| !n.is_read && n.sender_id == a));

        assert_eq!(repo.create_many(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_read() {
        let pool = setup_pool().await;
        let a = insert_user(&pool, "a", "HOST").await;
        let b = insert_user(&pool, "b", "TENANT").await;
        let repo = SqlxNotificationRepository::new(pool);

        repo.create_many(&[notice(a, b, "x"), notice(a, b, "y")]).await.unwrap();
        assert_eq!(repo.count_unread(b).await.unwrap(), 2);

        let first = repo.list_for_recipient(b).await.unwrap()[0].id;
        repo.mark_read(first).await.unwrap();

        assert!(repo.get_by_id(first).await.unwrap().unwrap().is_read);
        assert_eq!(repo.count_unread(b).await.unwrap(), 1);
        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }
}
