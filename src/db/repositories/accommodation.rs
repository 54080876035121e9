//! Accommodation repository

use crate::db::repositories::image::{insert_image_sql, load_images};
use crate::db::{on_pool, DynDatabasePool, InsertedId};
use crate::models::{Accommodation, ContentKind, CreateAccommodationInput, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const SELECT_ACCOMMODATION: &str = r#"
    SELECT id, user_id, address, district, city, number_of_people, rent_cost, description,
           latitude, longitude, is_verified, is_rented, created_at, updated_at
    FROM accommodations
"#;

macro_rules! accommodation_from_row {
    ($row:expr) => {{
        let row = &$row;
        Accommodation {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            address: row.try_get("address")?,
            district: row.try_get("district")?,
            city: row.try_get("city")?,
            number_of_people: row.try_get("number_of_people")?,
            rent_cost: row.try_get("rent_cost")?,
            description: row.try_get("description")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            is_verified: row.try_get("is_verified")?,
            is_rented: row.try_get("is_rented")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            images: Vec::new(),
        }
    }};
}

/// Narrows an accommodation listing
#[derive(Debug, Clone, Copy, Default)]
pub struct AccommodationFilter {
    pub owner_id: Option<i64>,
    pub verified: Option<bool>,
    /// Only rows with both coordinates recorded
    pub located: bool,
}

impl AccommodationFilter {
    fn where_clause(&self) -> String {
        let mut conditions = Vec::new();
        if self.owner_id.is_some() {
            conditions.push("user_id = ?");
        }
        if self.verified.is_some() {
            conditions.push("is_verified = ?");
        }
        if self.located {
            conditions.push("latitude IS NOT NULL AND longitude IS NOT NULL");
        }
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }
}

#[async_trait]
pub trait AccommodationRepository: Send + Sync {
    /// Insert the listing and its image rows in one transaction
    async fn create(
        &self,
        user_id: i64,
        input: &CreateAccommodationInput,
        image_urls: &[String],
    ) -> Result<Accommodation>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Accommodation>>;

    /// Newest first, with images, plus the total matching count
    async fn list(
        &self,
        filter: AccommodationFilter,
        params: &ListParams,
    ) -> Result<(Vec<Accommodation>, i64)>;

    /// Every matching row, newest first, with images
    async fn list_all(&self, filter: AccommodationFilter) -> Result<Vec<Accommodation>>;

    async fn set_verified(&self, id: i64, verified: bool) -> Result<()>;

    async fn set_rented(&self, id: i64, rented: bool) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxAccommodationRepository {
    pool: DynDatabasePool,
}

impl SqlxAccommodationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AccommodationRepository> {
        Arc::new(Self::new(pool))
    }

    async fn attach_images(&self, items: &mut [Accommodation]) -> Result<()> {
        let ids: Vec<i64> = items.iter().map(|a| a.id).collect();
        let mut images = load_images(&self.pool, ContentKind::Accommodation, &ids).await?;
        for item in items.iter_mut() {
            item.images = images.remove(&item.id).unwrap_or_default();
        }
        Ok(())
    }

    /// Rows matching `filter`, optionally sliced by `limit`/`offset`
    async fn fetch(
        &self,
        filter: AccommodationFilter,
        page: Option<&ListParams>,
    ) -> Result<Vec<Accommodation>> {
        let mut sql = format!("{}{} ORDER BY id DESC", SELECT_ACCOMMODATION, filter.where_clause());
        if page.is_some() {
            sql.push_str(" LIMIT ? OFFSET ?");
        }

        let mut items = on_pool!(self.pool, |conn| {
            let mut query = sqlx::query(&sql);
            if let Some(owner_id) = filter.owner_id {
                query = query.bind(owner_id);
            }
            if let Some(verified) = filter.verified {
                query = query.bind(verified);
            }
            if let Some(params) = page {
                query = query.bind(params.limit()).bind(params.offset());
            }

            let rows = query
                .fetch_all(conn)
                .await
                .context("Failed to list accommodations")?;
            let mut items = Vec::with_capacity(rows.len());
            for row in rows {
                items.push(accommodation_from_row!(row));
            }
            items
        });

        self.attach_images(&mut items).await?;
        Ok(items)
    }

    async fn count(&self, filter: AccommodationFilter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) AS count FROM accommodations{}", filter.where_clause());
        on_pool!(self.pool, |conn| {
            let mut query = sqlx::query(&sql);
            if let Some(owner_id) = filter.owner_id {
                query = query.bind(owner_id);
            }
            if let Some(verified) = filter.verified {
                query = query.bind(verified);
            }
            let count: i64 = query
                .fetch_one(conn)
                .await
                .context("Failed to count accommodations")?
                .try_get("count")?;
            Ok(count)
        })
    }

    async fn set_flag(&self, column: &str, id: i64, value: bool) -> Result<()> {
        let sql = format!("UPDATE accommodations SET {} = ?, updated_at = ? WHERE id = ?", column);
        on_pool!(self.pool, |conn| {
            sqlx::query(&sql)
                .bind(value)
                .bind(Utc::now())
                .bind(id)
                .execute(conn)
                .await
                .with_context(|| format!("Failed to update accommodation {}", column))?;
        });
        Ok(())
    }
}

#[async_trait]
impl AccommodationRepository for SqlxAccommodationRepository {
    async fn create(
        &self,
        user_id: i64,
        input: &CreateAccommodationInput,
        image_urls: &[String],
    ) -> Result<Accommodation> {
        let now = Utc::now();
        let image_sql = insert_image_sql(ContentKind::Accommodation);

        let id = on_pool!(self.pool, |conn| {
            let mut tx = conn.begin().await.context("Failed to begin transaction")?;

            let id = sqlx::query(
                r#"
                INSERT INTO accommodations (user_id, address, district, city, number_of_people,
                    rent_cost, description, latitude, longitude, is_verified, is_rented,
                    created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(&input.address)
            .bind(&input.district)
            .bind(&input.city)
            .bind(input.number_of_people)
            .bind(input.rent_cost)
            .bind(&input.description)
            .bind(input.latitude)
            .bind(input.longitude)
            .bind(false)
            .bind(false)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to create accommodation")?
            .inserted_id();

            for (position, url) in image_urls.iter().enumerate() {
                sqlx::query(&image_sql)
                    .bind(id)
                    .bind(url)
                    .bind(position as i64)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to attach accommodation image")?;
            }

            tx.commit().await.context("Failed to commit accommodation")?;
            id
        });

        self.get_by_id(id)
            .await?
            .with_context(|| format!("Accommodation {} missing after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Accommodation>> {
        let sql = format!("{} WHERE id = ?", SELECT_ACCOMMODATION);
        let found = on_pool!(self.pool, |conn| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get accommodation")?;
            match row {
                Some(row) => Some(accommodation_from_row!(row)),
                None => None,
            }
        });

        let Some(item) = found else {
            return Ok(None);
        };
        let mut items = vec![item];
        self.attach_images(&mut items).await?;
        Ok(items.pop())
    }

    async fn list(
        &self,
        filter: AccommodationFilter,
        params: &ListParams,
    ) -> Result<(Vec<Accommodation>, i64)> {
        let total = self.count(filter).await?;
        let items = self.fetch(filter, Some(params)).await?;
        Ok((items, total))
    }

    async fn list_all(&self, filter: AccommodationFilter) -> Result<Vec<Accommodation>> {
        self.fetch(filter, None).await
    }

    async fn set_verified(&self, id: i64, verified: bool) -> Result<()> {
        self.set_flag("is_verified", id, verified).await
    }

    async fn set_rented(&self, id: i64, rented: bool) -> Result<()> {
        self.set_flag("is_rented", id, rented).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_pool!(self.pool, |conn| {
            sqlx::query("DELETE FROM accommodations WHERE id = ?")
                .bind(id)
                .execute(conn)
                .await
                .context("Failed to delete accommodation")?;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, setup_pool};

    fn input(address: &str, coords: Option<(f64, f64)>) -> CreateAccommodationInput {
        CreateAccommodationInput {
            address: address.to_string(),
            district: "District 1".to_string(),
            city: "Ho Chi Minh".to_string(),
            number_of_people: 2,
            rent_cost: 3_000_000,
            description: None,
            latitude: coords.map(|c| c.0),
            longitude: coords.map(|c| c.1),
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("/uploads/accommodations/{}.png", i)).collect()
    }

    #[tokio::test]
    async fn test_create_with_images() {
        let pool = setup_pool().await;
        let host = insert_user(&pool, "host", "HOST").await;
        let repo = SqlxAccommodationRepository::new(pool);

        let created = repo
            .create(host, &input("1 Le Loi", Some((10.77, 106.70))), &urls(3))
            .await
            .unwrap();

        assert_eq!(created.user_id, host);
        assert_eq!(created.images.len(), 3);
        assert!(!created.is_verified);
        assert!(!created.is_rented);
        assert_eq!(created.latitude, Some(10.77));
        assert!(created.coordinates().is_some());
    }

    #[tokio::test]
    async fn test_failed_create_leaves_no_rows() {
        let pool = setup_pool().await;
        let repo = SqlxAccommodationRepository::new(pool);

        assert!(repo.create(42, &input("ghost", None), &urls(3)).await.is_err());
        let (items, total) = repo
            .list(AccommodationFilter::default(), &ListParams::default())
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_filters() {
        let pool = setup_pool().await;
        let host = insert_user(&pool, "host", "HOST").await;
        let other = insert_user(&pool, "other", "HOST").await;
        let repo = SqlxAccommodationRepository::new(pool);

        let a = repo.create(host, &input("a", Some((10.0, 106.0))), &urls(3)).await.unwrap();
        let b = repo.create(other, &input("b", None), &urls(3)).await.unwrap();
        let c = repo.create(host, &input("c", Some((10.1, 106.1))), &urls(3)).await.unwrap();
        repo.set_verified(b.id, true).await.unwrap();

        let all = repo.list_all(AccommodationFilter::default()).await.unwrap();
        assert_eq!(all.iter().map(|x| x.id).collect::<Vec<_>>(), vec![c.id, b.id, a.id]);

        let located = AccommodationFilter { located: true, ..Default::default() };
        let located = repo.list_all(located).await.unwrap();
        assert_eq!(located.iter().map(|x| x.id).collect::<Vec<_>>(), vec![c.id, a.id]);

        let verified = AccommodationFilter { verified: Some(true), ..Default::default() };
        let (verified, total) = repo.list(verified, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(verified[0].id, b.id);

        let owned = AccommodationFilter { owner_id: Some(host), ..Default::default() };
        let (page, total) = repo.list(owned, &ListParams::new(1, 1)).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, c.id);
    }

    #[tokio::test]
    async fn test_rented_flag_and_delete() {
        let pool = setup_pool().await;
        let host = insert_user(&pool, "host", "HOST").await;
        let repo = SqlxAccommodationRepository::new(pool);

        let item = repo.create(host, &input("a", None), &urls(3)).await.unwrap();
        repo.set_rented(item.id, true).await.unwrap();
        assert!(repo.get_by_id(item.id).await.unwrap().unwrap().is_rented);

        repo.delete(item.id).await.unwrap();
        assert!(repo.get_by_id(item.id).await.unwrap().is_none());
    }
}
