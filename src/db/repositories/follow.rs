//! Follow-edge repository

use crate::db::{insert_ignore, on_pool, DynDatabasePool, InsertedId};
use crate::models::Follow;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Insert the edge unless it already exists.
    ///
    /// Returns the new edge, or `None` when the pair was already present.
    /// This is a single conditional statement, so two racing callers cannot
    /// both create the edge.
    async fn insert_if_absent(&self, follower_id: i64, followee_id: i64) -> Result<Option<Follow>>;

    /// Delete the edge, returning whether a row was removed
    async fn delete(&self, follower_id: i64, followee_id: i64) -> Result<bool>;

    /// Ids of users following `user_id`, oldest edge first
    async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>>;

    /// Ids of users `user_id` follows, oldest edge first
    async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>>;
}

pub struct SqlxFollowRepository {
    pool: DynDatabasePool,
}

impl SqlxFollowRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowRepository> {
        Arc::new(Self::new(pool))
    }

    async fn ids(&self, select: &str, filter: &str, user_id: i64) -> Result<Vec<i64>> {
        let sql = format!("SELECT {} AS uid FROM follows WHERE {} = ? ORDER BY id", select, filter);
        on_pool!(self.pool, |conn| {
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .fetch_all(conn)
                .await
                .context("Failed to list follow edges")?;
            rows.iter()
                .map(|row| row.try_get::<i64, _>("uid").map_err(Into::into))
                .collect()
        })
    }
}

#[async_trait]
impl FollowRepository for SqlxFollowRepository {
    async fn insert_if_absent(&self, follower_id: i64, followee_id: i64) -> Result<Option<Follow>> {
        let now = Utc::now();
        let sql = format!(
            "{} follows (follower_id, followee_id, created_at) VALUES (?, ?, ?)",
            insert_ignore(self.pool.driver())
        );

        let inserted = on_pool!(self.pool, |conn| {
            let result = sqlx::query(&sql)
                .bind(follower_id)
                .bind(followee_id)
                .bind(now)
                .execute(conn)
                .await
                .context("Failed to insert follow edge")?;
            (result.rows_affected() > 0).then(|| result.inserted_id())
        });

        Ok(inserted.map(|id| Follow {
            id,
            follower_id,
            followee_id,
            created_at: now,
        }))
    }

    async fn delete(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let removed = on_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
                .bind(follower_id)
                .bind(followee_id)
                .execute(conn)
                .await
                .context("Failed to delete follow edge")?
                .rows_affected()
        });
        Ok(removed > 0)
    }

    async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        self.ids("follower_id", "followee_id", user_id).await
    }

    async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        self.ids("followee_id", "follower_id", user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};

    #[tokio::test]
    async fn test_insert_if_absent_only_once() {
        let pool = setup_pool().await;
        let a = insert_user(&pool, "a", "TENANT").await;
        let b = insert_user(&pool, "b", "HOST").await;
        let repo = SqlxFollowRepository::new(pool);

        let edge = repo.insert_if_absent(a, b).await.unwrap().unwrap();
        assert_eq!(edge.follower_id, a);
        assert_eq!(edge.followee_id, b);
        assert_eq!(repo.following_ids(a).await.unwrap(), vec![b]);
        assert!(repo.following_ids(b).await.unwrap().is_empty());

        assert!(repo.insert_if_absent(a, b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_edge() {
        let pool = setup_pool().await;
        let a = insert_user(&pool, "a", "TENANT").await;
        let b = insert_user(&pool, "b", "HOST").await;
        let repo = SqlxFollowRepository::new(pool);

        repo.insert_if_absent(a, b).await.unwrap();
        assert!(repo.delete(a, b).await.unwrap());
        assert!(!repo.delete(a, b).await.unwrap());
        assert!(repo.following_ids(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_follower_and_following_ids() {
        let pool = setup_pool().await;
        let host = insert_user(&pool, "host", "HOST").await;
        let t1 = insert_user(&pool, "t1", "TENANT").await;
        let t2 = insert_user(&pool, "t2", "TENANT").await;
        let repo = SqlxFollowRepository::new(pool);

        repo.insert_if_absent(t1, host).await.unwrap();
        repo.insert_if_absent(t2, host).await.unwrap();
        repo.insert_if_absent(host, t1).await.unwrap();

        assert_eq!(repo.follower_ids(host).await.unwrap(), vec![t1, t2]);
        assert_eq!(repo.following_ids(host).await.unwrap(), vec![t1]);
        assert!(repo.follower_ids(t2).await.unwrap().is_empty());
    }
}
