//! Raw timestamps behind the reporting aggregates
//!
//! Bucketing happens in the stats service so the SQL stays identical across
//! backends.

use crate::db::{on_pool, DynDatabasePool};
use crate::models::ReportSubject;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Every non-null timestamp counted by `subject`, oldest first
    async fn timestamps(&self, subject: ReportSubject) -> Result<Vec<DateTime<Utc>>>;
}

pub struct SqlxStatsRepository {
    pool: DynDatabasePool,
}

impl SqlxStatsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn StatsRepository> {
        Arc::new(Self::new(pool))
    }
}

fn timestamp_query(subject: ReportSubject) -> &'static str {
    match subject {
        ReportSubject::Logins => {
            "SELECT last_login AS ts FROM users WHERE last_login IS NOT NULL ORDER BY last_login"
        }
        ReportSubject::Posts => "SELECT created_at AS ts FROM posts ORDER BY created_at",
        ReportSubject::Accommodations => {
            "SELECT created_at AS ts FROM accommodations ORDER BY created_at"
        }
    }
}

#[async_trait]
impl StatsRepository for SqlxStatsRepository {
    async fn timestamps(&self, subject: ReportSubject) -> Result<Vec<DateTime<Utc>>> {
        let sql = timestamp_query(subject);
        on_pool!(self.pool, |conn| {
            let rows = sqlx::query(sql)
                .fetch_all(conn)
                .await
                .with_context(|| format!("Failed to load {:?} timestamps", subject))?;
            rows.iter()
                .map(|row| row.try_get::<DateTime<Utc>, _>("ts").map_err(Into::into))
                .collect()
        })
    }
}
