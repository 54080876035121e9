//! User repository
//!
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing it for SQLite and MySQL

use crate::db::{on_pool, DynDatabasePool, InsertedId};
use crate::models::{ListParams, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

const SELECT_USER: &str = r#"
    SELECT id, username, email, password_hash, first_name, last_name, phone, avatar,
           role, last_login, created_at, updated_at
    FROM users
"#;

macro_rules! user_from_row {
    ($row:expr) => {{
        let row = &$row;
        let role: String = row.try_get("role")?;
        User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            phone: row.try_get("phone")?,
            avatar: row.try_get("avatar")?,
            role: role.parse()?,
            last_login: row.try_get("last_login")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }
    }};
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; `user.id` is ignored and the stored row is returned
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Users with the given ids, in no particular order
    async fn get_many(&self, ids: &[i64]) -> Result<Vec<User>>;

    /// Persist profile fields (names, email, phone, avatar)
    async fn update_profile(&self, user: &User) -> Result<User>;

    async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Page of users ordered by id, plus the total count
    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)>;
}

/// SQLx-based user repository for SQLite and MySQL
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let id = on_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                INSERT INTO users (username, email, password_hash, first_name, last_name,
                                   phone, avatar, role, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.phone)
            .bind(&user.avatar)
            .bind(user.role.to_string())
            .bind(now)
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create user")?
            .inserted_id()
        });

        Ok(User {
            id,
            last_login: None,
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("{} WHERE id = ?", SELECT_USER);
        on_pool!(self.pool, |conn| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get user by id")?;
            match row {
                Some(row) => Ok(Some(user_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("{} WHERE username = ?", SELECT_USER);
        on_pool!(self.pool, |conn| {
            let row = sqlx::query(&sql)
                .bind(username)
                .fetch_optional(conn)
                .await
                .context("Failed to get user by username")?;
            match row {
                Some(row) => Ok(Some(user_from_row!(row))),
                None => Ok(None),
            }
        })
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("{} WHERE id IN ({})", SELECT_USER, placeholders);
        on_pool!(self.pool, |conn| {
            let mut query = sqlx::query(&sql);
            for id in ids {
                query = query.bind(*id);
            }
            let rows = query.fetch_all(conn).await.context("Failed to load users")?;
            let mut users = Vec::with_capacity(rows.len());
            for row in rows {
                users.push(user_from_row!(row));
            }
            Ok(users)
        })
    }

    async fn update_profile(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        on_pool!(self.pool, |conn| {
            sqlx::query(
                r#"
                UPDATE users
                SET first_name = ?, last_name = ?, email = ?, phone = ?, avatar = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.phone)
            .bind(&user.avatar)
            .bind(now)
            .bind(user.id)
            .execute(conn)
            .await
            .context("Failed to update user")?;
        });

        Ok(User {
            updated_at: now,
            ..user.clone()
        })
    }

    async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        on_pool!(self.pool, |conn| {
            sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
                .bind(at)
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to update last login")?;
        });
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete user")?;
        });
        Ok(())
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)> {
        let sql = format!("{} ORDER BY id LIMIT ? OFFSET ?", SELECT_USER);
        on_pool!(self.pool, |conn| {
            let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM users")
                .fetch_one(conn)
                .await
                .context("Failed to count users")?
                .try_get("count")?;

            let rows = sqlx::query(&sql)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(conn)
                .await
                .context("Failed to list users")?;

            let mut users = Vec::with_capacity(rows.len());
            for row in rows {
                users.push(user_from_row!(row));
            }
            Ok((users, total))
        })
    }
}
