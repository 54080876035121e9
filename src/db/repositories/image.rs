//! Image rows shared by posts and accommodations

use std::collections::HashMap;

use crate::db::{on_pool, DynDatabasePool};
use crate::models::{ContentImage, ContentKind};
use anyhow::{Context, Result};
use sqlx::Row;

/// Images for the given entities, grouped by entity id and ordered by position
pub(crate) async fn load_images(
    pool: &DynDatabasePool,
    kind: ContentKind,
    entity_ids: &[i64],
) -> Result<HashMap<i64, Vec<ContentImage>>> {
    let mut grouped: HashMap<i64, Vec<ContentImage>> = HashMap::new();
    if entity_ids.is_empty() {
        return Ok(grouped);
    }

    let column = kind.entity_column();
    let sql = format!(
        "SELECT id, {col} AS entity_id, url, position, created_at FROM {table} \
         WHERE {col} IN ({ids}) ORDER BY {col}, position, id",
        col = column,
        table = kind.image_table(),
        ids = vec!["?"; entity_ids.len()].join(", "),
    );

    on_pool!(pool, |conn| {
        let mut query = sqlx::query(&sql);
        for id in entity_ids {
            query = query.bind(*id);
        }
        let rows = query
            .fetch_all(conn)
            .await
            .with_context(|| format!("Failed to load {} images", kind))?;

        for row in rows {
            let entity_id: i64 = row.try_get("entity_id")?;
            grouped.entry(entity_id).or_default().push(ContentImage {
                id: row.try_get("id")?,
                url: row.try_get("url")?,
                position: row.try_get("position")?,
                created_at: row.try_get("created_at")?,
            });
        }
    });

    Ok(grouped)
}

/// SQL inserting one image row for `kind`
pub(crate) fn insert_image_sql(kind: ContentKind) -> String {
    format!(
        "INSERT INTO {} ({}, url, position, created_at) VALUES (?, ?, ?, ?)",
        kind.image_table(),
        kind.entity_column()
    )
}
