//! Comment repository
//!
//! Post and accommodation comments share one shape but live in separate
//! tables; every call names the [`ContentKind`] it targets.

use crate::db::{on_pool, DynDatabasePool, InsertedId};
use crate::models::{avatar_or_gravatar, Comment, CommentView, ContentKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

macro_rules! comment_from_row {
    ($row:expr, $kind:expr) => {{
        let row = &$row;
        Comment {
            id: row.try_get("id")?,
            kind: $kind,
            entity_id: row.try_get("entity_id")?,
            user_id: row.try_get("user_id")?,
            parent_id: row.try_get("parent_id")?,
            text: row.try_get("text")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }
    }};
}

fn select_comment(kind: ContentKind) -> String {
    format!(
        "SELECT id, {} AS entity_id, user_id, parent_id, text, created_at, updated_at FROM {}",
        kind.entity_column(),
        kind.comment_table()
    )
}

/// Listing query joined with the author and a direct-reply count
fn select_comment_view(kind: ContentKind, condition: &str) -> String {
    format!(
        r#"
        SELECT c.id, c.{col} AS entity_id, c.user_id, c.parent_id, c.text, c.created_at,
               c.updated_at, u.username, u.avatar, u.email,
               (SELECT COUNT(*) FROM {table} r WHERE r.parent_id = c.id) AS reply_count
        FROM {table} c
        JOIN users u ON u.id = c.user_id
        WHERE {condition}
        ORDER BY c.id
        "#,
        col = kind.entity_column(),
        table = kind.comment_table(),
        condition = condition,
    )
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(
        &self,
        kind: ContentKind,
        entity_id: i64,
        user_id: i64,
        parent_id: Option<i64>,
        text: &str,
    ) -> Result<Comment>;

    async fn get_by_id(&self, kind: ContentKind, id: i64) -> Result<Option<Comment>>;

    /// Comments on the entity with no parent, oldest first
    async fn list_top_level(&self, kind: ContentKind, entity_id: i64) -> Result<Vec<CommentView>>;

    /// Direct children of a comment, oldest first
    async fn list_replies(&self, kind: ContentKind, parent_id: i64) -> Result<Vec<CommentView>>;

    /// Replace the text and bump `updated_at`
    async fn update_text(&self, kind: ContentKind, id: i64, text: &str) -> Result<()>;

    /// Delete a comment and, through the foreign key, its replies
    async fn delete(&self, kind: ContentKind, id: i64) -> Result<bool>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }

    async fn list_views(&self, kind: ContentKind, condition: &str, key: i64) -> Result<Vec<CommentView>> {
        let sql = select_comment_view(kind, condition);
        on_pool!(self.pool, |conn| {
            let rows = sqlx::query(&sql)
                .bind(key)
                .fetch_all(conn)
                .await
                .with_context(|| format!("Failed to list {} comments", kind))?;

            let mut views = Vec::with_capacity(rows.len());
            for row in rows {
                let avatar: Option<String> = row.try_get("avatar")?;
                let email: String = row.try_get("email")?;
                views.push(CommentView {
                    comment: comment_from_row!(row, kind),
                    username: row.try_get("username")?,
                    avatar: avatar_or_gravatar(avatar.as_deref(), &email),
                    reply_count: row.try_get("reply_count")?,
                });
            }
            Ok(views)
        })
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(
        &self,
        kind: ContentKind,
        entity_id: i64,
        user_id: i64,
        parent_id: Option<i64>,
        text: &str,
    ) -> Result<Comment> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO {} ({}, user_id, parent_id, text, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            kind.comment_table(),
            kind.entity_column()
        );

        let id = on_pool!(self.pool, |conn| {
            sqlx::query(&sql)
                .bind(entity_id)
                .bind(user_id)
                .bind(parent_id)
                .bind(text)
                .bind(now)
                .bind(now)
                .execute(conn)
                .await
                .with_context(|| format!("Failed to create {} comment", kind))?
                .inserted_id()
        });

        Ok(Comment {
            id,
            kind,
            entity_id,
            user_id,
            parent_id,
            text: text.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, kind: ContentKind, id: i64) -> Result<Option<Comment>> {
        let sql = format!("{} WHERE id = ?", select_comment(kind));
        on_pool!(self.pool, |conn| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .with_context(|| format!("Failed to get {} comment", kind))?;
            match row {
                Some(row) => Ok(Some(comment_from_row!(row, kind))),
                None => Ok(None),
            }
        })
    }

    async fn list_top_level(&self, kind: ContentKind, entity_id: i64) -> Result<Vec<CommentView>> {
        let condition = format!("c.{} = ? AND c.parent_id IS NULL", kind.entity_column());
        self.list_views(kind, &condition, entity_id).await
    }

    async fn list_replies(&self, kind: ContentKind, parent_id: i64) -> Result<Vec<CommentView>> {
        self.list_views(kind, "c.parent_id = ?", parent_id).await
    }

    async fn update_text(&self, kind: ContentKind, id: i64, text: &str) -> Result<()> {
        let sql = format!("UPDATE {} SET text = ?, updated_at = ? WHERE id = ?", kind.comment_table());
        on_pool!(self.pool, |conn| {
            sqlx::query(&sql)
                .bind(text)
                .bind(Utc::now())
                .bind(id)
                .execute(conn)
                .await
                .with_context(|| format!("Failed to update {} comment", kind))?;
        });
        Ok(())
    }

    async fn delete(&self, kind: ContentKind, id: i64) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?", kind.comment_table());
        let removed = on_pool!(self.pool, |conn| {
            sqlx::query(&sql)
                .bind(id)
                .execute(conn)
                .await
                .with_context(|| format!("Failed to delete {} comment", kind))?
                .rows_affected()
        });
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};
    use crate::db::repositories::{PostRepository, SqlxPostRepository};
    use crate::models::CreatePostInput;

    async fn setup() -> (SqlxCommentRepository, i64, i64) {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "alice", "TENANT").await;
        let post = SqlxPostRepository::new(pool.clone())
            .create(user, &CreatePostInput { content: "hi".into(), ..Default::default() }, &[])
            .await
            .unwrap();
        (SqlxCommentRepository::new(pool), user, post.id)
    }

    #[tokio::test]
    async fn test_top_level_excludes_replies() {
        let (repo, user, post_id) = setup().await;

        let root = repo.create(ContentKind::Post, post_id, user, None, "root").await.unwrap();
        repo.create(ContentKind::Post, post_id, user, Some(root.id), "reply").await.unwrap();
        repo.create(ContentKind::Post, post_id, user, None, "second root").await.unwrap();

        let top = repo.list_top_level(ContentKind::Post, post_id).await.unwrap();
        assert_eq!(top.len(), 2);
        assert!(top.iter().all(|v| v.comment.parent_id.is_none()));
        assert_eq!(top[0].reply_count, 1);
        assert_eq!(top[0].username, "alice");
        assert!(!top[0].avatar.is_empty());

        let replies = repo.list_replies(ContentKind::Post, root.id).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].comment.text, "reply");
    }

    #[tokio::test]
    async fn test_update_text_only() {
        let (repo, user, post_id) = setup().await;
        let comment = repo.create(ContentKind::Post, post_id, user, None, "old").await.unwrap();

        repo.update_text(ContentKind::Post, comment.id, "new").await.unwrap();

        let stored = repo.get_by_id(ContentKind::Post, comment.id).await.unwrap().unwrap();
        assert_eq!(stored.text, "new");
        assert_eq!(stored.user_id, comment.user_id);
        assert_eq!(stored.entity_id, comment.entity_id);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_replies() {
        let (repo, user, post_id) = setup().await;
        let root = repo.create(ContentKind::Post, post_id, user, None, "root").await.unwrap();
        let reply = repo.create(ContentKind::Post, post_id, user, Some(root.id), "r").await.unwrap();

        assert!(repo.delete(ContentKind::Post, root.id).await.unwrap());
        assert!(repo.get_by_id(ContentKind::Post, reply.id).await.unwrap().is_none());
        assert!(!repo.delete(ContentKind::Post, root.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_kinds_use_separate_tables() {
        let (repo, user, post_id) = setup().await;
        let comment = repo.create(ContentKind::Post, post_id, user, None, "x").await.unwrap();
        assert!(repo
            .get_by_id(ContentKind::Accommodation, comment.id)
            .await
            .unwrap()
            .is_none());
    }
}
