//! Post repository

use crate::db::repositories::image::{insert_image_sql, load_images};
use crate::db::{on_pool, DynDatabasePool, InsertedId};
use crate::models::{ContentKind, CreatePostInput, ListParams, Post};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const SELECT_POST: &str = r#"
    SELECT id, user_id, content, caption, description, is_approved, created_at, updated_at
    FROM posts
"#;

macro_rules! post_from_row {
    ($row:expr) => {{
        let row = &$row;
        Post {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            content: row.try_get("content")?,
            caption: row.try_get("caption")?,
            description: row.try_get("description")?,
            is_approved: row.try_get("is_approved")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            images: Vec::new(),
        }
    }};
}

/// Narrows a post listing
#[derive(Debug, Clone, Copy, Default)]
pub struct PostFilter {
    pub owner_id: Option<i64>,
    pub approved: Option<bool>,
}

impl PostFilter {
    fn where_clause(&self) -> String {
        let mut conditions = Vec::new();
        if self.owner_id.is_some() {
            conditions.push("user_id = ?");
        }
        if self.approved.is_some() {
            conditions.push("is_approved = ?");
        }
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert the post and its image rows in one transaction
    async fn create(&self, user_id: i64, input: &CreatePostInput, image_urls: &[String]) -> Result<Post>;

    /// Post with its images
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Newest first, with images, plus the total matching count
    async fn list(&self, filter: PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)>;

    async fn set_approved(&self, id: i64, approved: bool) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }

    async fn attach_images(&self, posts: &mut [Post]) -> Result<()> {
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let mut images = load_images(&self.pool, ContentKind::Post, &ids).await?;
        for post in posts.iter_mut() {
            post.images = images.remove(&post.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, user_id: i64, input: &CreatePostInput, image_urls: &[String]) -> Result<Post> {
        let now = Utc::now();
        let image_sql = insert_image_sql(ContentKind::Post);

        let id = on_pool!(self.pool, |conn| {
            let mut tx = conn.begin().await.context("Failed to begin transaction")?;

            let id = sqlx::query(
                r#"
                INSERT INTO posts (user_id, content, caption, description, is_approved, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(&input.content)
            .bind(&input.caption)
            .bind(&input.description)
            .bind(false)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to create post")?
            .inserted_id();

            for (position, url) in image_urls.iter().enumerate() {
                sqlx::query(&image_sql)
                    .bind(id)
                    .bind(url)
                    .bind(position as i64)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to attach post image")?;
            }

            tx.commit().await.context("Failed to commit post")?;
            id
        });

        self.get_by_id(id)
            .await?
            .with_context(|| format!("Post {} missing after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("{} WHERE id = ?", SELECT_POST);
        let post = on_pool!(self.pool, |conn| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get post")?;
            match row {
                Some(row) => Some(post_from_row!(row)),
                None => None,
            }
        });

        match post {
            Some(post) => {
                let mut posts = [post];
                self.attach_images(&mut posts).await?;
                let [post] = posts;
                Ok(Some(post))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, filter: PostFilter, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        let where_clause = filter.where_clause();
        let count_sql = format!("SELECT COUNT(*) AS count FROM posts{}", where_clause);
        let list_sql = format!(
            "{}{} ORDER BY id DESC LIMIT ? OFFSET ?",
            SELECT_POST, where_clause
        );

        let (mut posts, total) = on_pool!(self.pool, |conn| {
            let mut count_query = sqlx::query(&count_sql);
            let mut list_query = sqlx::query(&list_sql);
            if let Some(owner_id) = filter.owner_id {
                count_query = count_query.bind(owner_id);
                list_query = list_query.bind(owner_id);
            }
            if let Some(approved) = filter.approved {
                count_query = count_query.bind(approved);
                list_query = list_query.bind(approved);
            }

            let total: i64 = count_query
                .fetch_one(conn)
                .await
                .context("Failed to count posts")?
                .try_get("count")?;

            let rows = list_query
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list posts")?;

            let mut posts = Vec::with_capacity(rows.len());
            for row in rows {
                posts.push(post_from_row!(row));
            }
            (posts, total)
        });

        self.attach_images(&mut posts).await?;
        Ok((posts, total))
    }

    async fn set_approved(&self, id: i64, approved: bool) -> Result<()> {
        on_pool!(self.pool, |conn| {
            sqlx::query("UPDATE posts SET is_approved = ?, updated_at = ? WHERE id = ?")
                .bind(approved)
                .bind(Utc::now())
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to update post approval")?;
        });
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete post")?;
        });
        Ok(())
    }
}
