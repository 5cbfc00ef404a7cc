use std::collections::HashMap;

use serde_json::Value;

use crate::domain::{Interaction, InteractionKind, NewInteraction};
use crate::error::{AppResult, Error};
use crate::gateway::{DynGateway, Filter, GatewayError, Order, Query, Subscription};

use super::{decode, decode_rows};

pub const TABLE: &str = "interactions";

#[derive(Clone)]
pub struct InteractionService {
    gateway: DynGateway,
}

impl InteractionService {
    pub fn new(gateway: DynGateway) -> Self {
        Self { gateway }
    }

    /// All interactions for a post, newest first, optionally narrowed to
    /// one kind.
    pub async fn list_for_post(
        &self,
        post_id: &str,
        kind: Option<InteractionKind>,
    ) -> AppResult<Vec<Interaction>> {
        let mut query = Query::new()
            .filter(Filter::eq("post_id", post_id))
            .order(Order::desc("created_at"));
        if let Some(kind) = kind {
            query = query.filter(Filter::eq("kind", kind.as_str()));
        }
        let rows = self.gateway.select(TABLE, query).await?;
        decode_rows(rows)
    }

    /// The given user's interaction per kind for one post, fetched with a
    /// single batched query. At most one entry per kind survives; with
    /// newest-first ordering the most recent one wins.
    pub async fn find_own(
        &self,
        post_id: &str,
        user_id: &str,
        kinds: &[InteractionKind],
    ) -> AppResult<HashMap<InteractionKind, Interaction>> {
        if kinds.is_empty() {
            return Ok(HashMap::new());
        }
        let values: Vec<Value> = kinds.iter().map(|k| Value::from(k.as_str())).collect();
        let query = Query::new()
            .filter(Filter::eq("post_id", post_id))
            .filter(Filter::eq("user_id", user_id))
            .filter(Filter::any("kind", values))
            .order(Order::desc("created_at"));
        let rows: Vec<Interaction> = decode_rows(self.gateway.select(TABLE, query).await?)?;

        let mut own = HashMap::new();
        for interaction in rows {
            own.entry(interaction.kind).or_insert(interaction);
        }
        Ok(own)
    }

    pub async fn create(&self, new: NewInteraction) -> AppResult<Interaction> {
        new.validate()?;
        let record =
            serde_json::to_value(&new).map_err(|e| Error::Remote(GatewayError::Serde(e)))?;
        let row = self.gateway.insert(TABLE, record).await?;
        tracing::debug!(post_id = %new.post_id, kind = %new.kind, "Created interaction");
        decode(row)
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        if self.gateway.delete(TABLE, id).await? {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    pub async fn count(&self, post_id: &str, kind: InteractionKind) -> AppResult<usize> {
        let query = Query::new()
            .filter(Filter::eq("post_id", post_id))
            .filter(Filter::eq("kind", kind.as_str()));
        Ok(self.gateway.select(TABLE, query).await?.len())
    }

    /// Push channel scoped to one post's interactions.
    pub async fn subscribe(&self, post_id: &str) -> AppResult<Subscription> {
        Ok(self
            .gateway
            .subscribe(TABLE, Some(Filter::eq("post_id", post_id)))
            .await?)
    }
}
