use serde_json::json;

use crate::domain::{Category, CategoryPatch, NewCategory};
use crate::error::{AppResult, Error};
use crate::gateway::{DynGateway, Filter, GatewayError, Order, Query};

use super::{decode, decode_rows};

pub const TABLE: &str = "categories";

#[derive(Clone)]
pub struct CategoryService {
    gateway: DynGateway,
}

impl CategoryService {
    pub fn new(gateway: DynGateway) -> Self {
        Self { gateway }
    }

    pub async fn list(&self, active_only: bool) -> AppResult<Vec<Category>> {
        let mut query = Query::new()
            .order(Order::asc("display_order"))
            .order(Order::asc("name"));
        if active_only {
            query = query.filter(Filter::eq("is_active", true));
        }
        let rows = self.gateway.select(TABLE, query).await?;
        decode_rows(rows)
    }

    pub async fn get_by_slug(&self, slug: &str) -> AppResult<Category> {
        let rows = self
            .gateway
            .select(TABLE, Query::new().filter(Filter::eq("slug", slug)).limit(1))
            .await?;
        rows.into_iter().next().ok_or(Error::NotFound).and_then(decode)
    }

    pub async fn create(&self, new: NewCategory) -> AppResult<Category> {
        new.validate()?;
        let slug = new.slug();
        if slug.is_empty() {
            return Err(Error::Validation("name yields an empty slug".into()));
        }

        let taken = self
            .gateway
            .select(TABLE, Query::new().filter(Filter::eq("slug", slug.clone())).limit(1))
            .await?;
        if !taken.is_empty() {
            return Err(Error::Duplicate(format!("slug '{}' is taken", slug)));
        }

        let mut record =
            serde_json::to_value(&new).map_err(|e| Error::Remote(GatewayError::Serde(e)))?;
        if let Some(obj) = record.as_object_mut() {
            obj.insert("slug".into(), json!(slug));
        }
        let row = self.gateway.insert(TABLE, record).await?;
        decode(row)
    }

    pub async fn update(&self, id: &str, patch: CategoryPatch) -> AppResult<Category> {
        let patch =
            serde_json::to_value(&patch).map_err(|e| Error::Remote(GatewayError::Serde(e)))?;
        let row = self.gateway.update(TABLE, id, patch).await?;
        decode(row)
    }

    /// Soft delete: categories are switched off, never removed, so posts
    /// referencing them stay readable.
    pub async fn deactivate(&self, id: &str) -> AppResult<Category> {
        self.update(
            id,
            CategoryPatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }
}
