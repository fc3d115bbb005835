use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::repo_types::{Collection, ContentDraft, ContentItem, ContentRow};

/// Document storage for portfolio content, keyed by collection.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Sorted by `order` ascending, newest first among equal orders.
    async fn list(&self, c: Collection, published_only: bool) -> anyhow::Result<Vec<ContentItem>>;
    async fn get(&self, c: Collection, id: Uuid) -> anyhow::Result<Option<ContentItem>>;
    /// The oldest document in the collection; used for singleton sections.
    async fn first(&self, c: Collection, published_only: bool) -> anyhow::Result<Option<ContentItem>>;
    async fn insert(&self, c: Collection, draft: ContentDraft) -> anyhow::Result<ContentItem>;
    /// Merges `draft.data` into the stored document.
    async fn update(
        &self,
        c: Collection,
        id: Uuid,
        draft: ContentDraft,
    ) -> anyhow::Result<Option<ContentItem>>;
    async fn delete(&self, c: Collection, id: Uuid) -> anyhow::Result<bool>;
    async fn toggle_published(&self, c: Collection, id: Uuid) -> anyhow::Result<Option<ContentItem>>;
}

const CONTENT_COLUMNS: &str = "id, data, sort_order, is_published, created_at, updated_at";

#[derive(Clone)]
pub struct PgContentStore {
    db: PgPool,
}

impl PgContentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn list(&self, c: Collection, published_only: bool) -> anyhow::Result<Vec<ContentItem>> {
        let rows = sqlx::query_as::<_, ContentRow>(&format!(
            r#"
            SELECT {CONTENT_COLUMNS}
              FROM content_items
             WHERE collection = $1 AND (NOT $2 OR is_published)
             ORDER BY sort_order ASC, created_at DESC
            "#
        ))
        .bind(c.slug())
        .bind(published_only)
        .fetch_all(&self.db)
        .await
        .with_context(|| format!("list {}", c.slug()))?;
        Ok(rows.into_iter().map(ContentItem::from).collect())
    }

    async fn get(&self, c: Collection, id: Uuid) -> anyhow::Result<Option<ContentItem>> {
        let row = sqlx::query_as::<_, ContentRow>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items WHERE collection = $1 AND id = $2"
        ))
        .bind(c.slug())
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("get {} {}", c.slug(), id))?;
        Ok(row.map(ContentItem::from))
    }

    async fn first(&self, c: Collection, published_only: bool) -> anyhow::Result<Option<ContentItem>> {
        let row = sqlx::query_as::<_, ContentRow>(&format!(
            r#"
            SELECT {CONTENT_COLUMNS}
              FROM content_items
             WHERE collection = $1 AND (NOT $2 OR is_published)
             ORDER BY created_at ASC
             LIMIT 1
            "#
        ))
        .bind(c.slug())
        .bind(published_only)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("first {}", c.slug()))?;
        Ok(row.map(ContentItem::from))
    }

    async fn insert(&self, c: Collection, draft: ContentDraft) -> anyhow::Result<ContentItem> {
        let row = sqlx::query_as::<_, ContentRow>(&format!(
            r#"
            INSERT INTO content_items (collection, data, sort_order, is_published)
            VALUES ($1, $2, $3, $4)
            RETURNING {CONTENT_COLUMNS}
            "#
        ))
        .bind(c.slug())
        .bind(Json(draft.data))
        .bind(draft.order.unwrap_or(0))
        .bind(draft.is_published.unwrap_or(true))
        .fetch_one(&self.db)
        .await
        .with_context(|| format!("insert {}", c.slug()))?;
        Ok(row.into())
    }

    async fn update(
        &self,
        c: Collection,
        id: Uuid,
        draft: ContentDraft,
    ) -> anyhow::Result<Option<ContentItem>> {
        let row = sqlx::query_as::<_, ContentRow>(&format!(
            r#"
            UPDATE content_items
               SET data         = data || $3,
                   sort_order   = COALESCE($4, sort_order),
                   is_published = COALESCE($5, is_published),
                   updated_at   = now()
             WHERE collection = $1 AND id = $2
            RETURNING {CONTENT_COLUMNS}
            "#
        ))
        .bind(c.slug())
        .bind(id)
        .bind(Json(draft.data))
        .bind(draft.order)
        .bind(draft.is_published)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("update {} {}", c.slug(), id))?;
        Ok(row.map(ContentItem::from))
    }

    async fn delete(&self, c: Collection, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM content_items WHERE collection = $1 AND id = $2")
            .bind(c.slug())
            .bind(id)
            .execute(&self.db)
            .await
            .with_context(|| format!("delete {} {}", c.slug(), id))?;
        Ok(res.rows_affected() > 0)
    }

    async fn toggle_published(&self, c: Collection, id: Uuid) -> anyhow::Result<Option<ContentItem>> {
        let row = sqlx::query_as::<_, ContentRow>(&format!(
            r#"
            UPDATE content_items
               SET is_published = NOT is_published,
                   updated_at   = now()
             WHERE collection = $1 AND id = $2
            RETURNING {CONTENT_COLUMNS}
            "#
        ))
        .bind(c.slug())
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("toggle publish {} {}", c.slug(), id))?;
        Ok(row.map(ContentItem::from))
    }
}
