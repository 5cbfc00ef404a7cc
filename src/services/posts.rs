use serde_json::{json, Value};

use crate::domain::{NewPost, Post, PostPatch};
use crate::error::{AppResult, Error};
use crate::gateway::{DynGateway, Filter, Order, Query, Subscription};

use super::{decode, decode_rows};

pub const TABLE: &str = "posts";

/// Text columns scanned by `search`. Substring match, no ranking.
const SEARCH_COLUMNS: [&str; 4] = ["title", "excerpt", "content", "speaker"];

/// Read filters for post listings. Pagination is offset-based with no
/// cursor stability guarantee under concurrent inserts.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub published_only: bool,
    pub featured_only: bool,
    pub category_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
    /// Override for the default newest-first ordering.
    pub order: Option<Order>,
}

impl PostQuery {
    pub fn published() -> Self {
        Self {
            published_only: true,
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct PostService {
    gateway: DynGateway,
}

impl PostService {
    pub fn new(gateway: DynGateway) -> Self {
        Self { gateway }
    }

    fn default_order() -> Vec<Order> {
        vec![Order::desc("event_date"), Order::desc("created_at")]
    }

    fn base_query(filters: &PostQuery) -> Query {
        let mut query = Query::new();
        if filters.published_only {
            query = query.filter(Filter::eq("published", true));
        }
        if filters.featured_only {
            query = query.filter(Filter::eq("featured", true));
        }
        if let Some(category_id) = &filters.category_id {
            query = query.filter(Filter::eq("category_id", category_id.clone()));
        }
        query.order = match &filters.order {
            Some(order) => vec![order.clone()],
            None => Self::default_order(),
        };
        query.limit = filters.limit;
        query.offset = filters.offset;
        query
    }

    pub async fn list(&self, filters: &PostQuery) -> AppResult<Vec<Post>> {
        let rows = self.gateway.select(TABLE, Self::base_query(filters)).await?;
        decode_rows(rows)
    }

    pub async fn get(&self, id: &str) -> AppResult<Post> {
        let rows = self
            .gateway
            .select(TABLE, Query::new().filter(Filter::eq("id", id)).limit(1))
            .await?;
        rows.into_iter().next().ok_or(Error::NotFound).and_then(decode)
    }

    pub async fn get_by_slug(&self, slug: &str) -> AppResult<Post> {
        let rows = self
            .gateway
            .select(TABLE, Query::new().filter(Filter::eq("slug", slug)).limit(1))
            .await?;
        rows.into_iter().next().ok_or(Error::NotFound).and_then(decode)
    }

    /// Case-insensitive substring search over title, excerpt, content and
    /// speaker. Results keep the default newest-first ordering; there is
    /// no relevance ranking.
    pub async fn search(&self, needle: &str, limit: usize) -> AppResult<Vec<Post>> {
        let needle = needle.trim();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let any_of = SEARCH_COLUMNS
            .iter()
            .map(|col| Filter::contains(*col, needle))
            .collect();
        let mut query = Query::new().any_of(any_of).limit(limit);
        query.order = Self::default_order();
        let rows = self.gateway.select(TABLE, query).await?;
        decode_rows(rows)
    }

    /// Create a post. Fails with `Validation` on blank required fields
    /// and `Duplicate` on a slug collision.
    pub async fn create(&self, new: NewPost) -> AppResult<Post> {
        new.validate()?;
        let slug = new.slug();
        if slug.is_empty() {
            return Err(Error::Validation("title yields an empty slug".into()));
        }

        let taken = self
            .gateway
            .select(TABLE, Query::new().filter(Filter::eq("slug", slug.clone())).limit(1))
            .await?;
        if !taken.is_empty() {
            return Err(Error::Duplicate(format!("slug '{}' is taken", slug)));
        }

        let mut record = serde_json::to_value(&new)
            .map_err(|e| Error::Remote(crate::gateway::GatewayError::Serde(e)))?;
        if let Some(obj) = record.as_object_mut() {
            obj.insert("slug".into(), json!(slug));
            obj.insert("view_count".into(), json!(0));
            obj.insert("like_count".into(), json!(0));
            obj.insert("comment_count".into(), json!(0));
            if new.published {
                obj.insert("published_at".into(), json!(chrono::Utc::now()));
            }
        }

        let row = self.gateway.insert(TABLE, record).await?;
        tracing::info!(slug = %slug, "Created post");
        decode(row)
    }

    pub async fn update(&self, id: &str, patch: PostPatch) -> AppResult<Post> {
        let patch = serde_json::to_value(&patch)
            .map_err(|e| Error::Remote(crate::gateway::GatewayError::Serde(e)))?;
        let row = self.gateway.update(TABLE, id, patch).await?;
        decode(row)
    }

    /// Hard delete. Posts never soft-delete; categories are the entity
    /// with a deactivation flag instead.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        if self.gateway.delete(TABLE, id).await? {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    /// Atomic server-side increment. Never a client-side
    /// read-modify-write; concurrent viewers must not lose updates.
    /// Returns the new count.
    pub async fn increment_view_count(&self, id: &str) -> AppResult<i64> {
        let result = self
            .gateway
            .rpc("increment_post_view", json!({ "post_id": id }))
            .await?;
        result
            .as_i64()
            .ok_or_else(|| Error::Remote(crate::gateway::GatewayError::Invalid(
                "increment_post_view returned a non-integer".into(),
            )))
    }

    pub async fn subscribe(&self) -> AppResult<Subscription> {
        Ok(self.gateway.subscribe(TABLE, None).await?)
    }

    pub(crate) fn row_matches(filters: &PostQuery, row: &Value) -> bool {
        Self::base_query(filters).matches(row)
    }
}
