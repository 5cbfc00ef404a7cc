use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::gateway::{
    sort_rows, ChangeEvent, Filter, Gateway, GatewayError, Query, Subscription,
};

use super::seed;

pub const COLLECTIONS: [&str; 4] = ["posts", "categories", "interactions", "users"];

const SEED_MARKER: &str = ".seeded";
const CHANNEL_CAPACITY: usize = 64;

/// Simulated network latency so local-mode callers get the same
/// result-arrives-later contract as the remote path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyProfile {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl LatencyProfile {
    pub fn standard() -> Self {
        Self {
            min_ms: 100,
            max_ms: 800,
        }
    }

    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    async fn sleep(&self) {
        // Inverted bounds are treated as if swapped, never a panic
        let min = self.min_ms.min(self.max_ms);
        let max = self.min_ms.max(self.max_ms);
        if max == 0 {
            return;
        }
        let ms = rand::thread_rng().gen_range(min..=max);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// File-backed stand-in for the remote backend: one JSON blob file per
/// collection, read-modify-written whole on every call. Fine at the
/// scale of a single local dataset; concurrent processes sharing a
/// directory are not synchronized (last writer wins).
pub struct LocalStore {
    dir: PathBuf,
    latency: LatencyProfile,
    lock: Mutex<()>,
    channels: Mutex<HashMap<String, broadcast::Sender<ChangeEvent>>>,
}

impl LocalStore {
    pub fn open(
        dir: impl Into<PathBuf>,
        latency: LatencyProfile,
    ) -> Result<Arc<Self>, GatewayError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let store = Self {
            dir,
            latency,
            lock: Mutex::new(()),
            channels: Mutex::new(HashMap::new()),
        };
        store.seed_once()?;
        Ok(Arc::new(store))
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Seed the fixed dataset exactly once. The marker file decides, not
    /// the collection contents: a collection the user emptied stays
    /// empty across restarts.
    fn seed_once(&self) -> Result<(), GatewayError> {
        let marker = self.dir.join(SEED_MARKER);
        if marker.exists() {
            return Ok(());
        }
        for collection in COLLECTIONS {
            self.write_rows(collection, &seed::rows(collection))?;
        }
        std::fs::write(&marker, Utc::now().to_rfc3339())?;
        tracing::info!("Seeded local store at {}", self.dir.display());
        Ok(())
    }

    /// Wipe every collection and the stored session, then re-seed.
    /// Deterministic: the same records with the same ids come back.
    pub fn clear_all_data(&self) -> Result<(), GatewayError> {
        let _guard = self.guard();
        for collection in COLLECTIONS {
            let path = self.path(collection);
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        let session = self.path(super::auth::SESSION_KEY);
        if session.exists() {
            std::fs::remove_file(session)?;
        }
        let marker = self.dir.join(SEED_MARKER);
        if marker.exists() {
            std::fs::remove_file(marker)?;
        }
        self.seed_once()
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().expect("store lock poisoned")
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn read_rows(&self, collection: &str) -> Result<Vec<Value>, GatewayError> {
        let path = self.path(collection);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }

    fn write_rows(&self, collection: &str, rows: &[Value]) -> Result<(), GatewayError> {
        std::fs::write(self.path(collection), serde_json::to_string_pretty(rows)?)?;
        Ok(())
    }

    // Keyed single-object blobs, used for the session record.

    pub fn read_blob(&self, key: &str) -> Result<Option<Value>, GatewayError> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&std::fs::read_to_string(path)?)?))
    }

    pub fn write_blob(&self, key: &str, value: &Value) -> Result<(), GatewayError> {
        std::fs::write(self.path(key), serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    pub fn remove_blob(&self, key: &str) -> Result<(), GatewayError> {
        let path = self.path(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn emit(&self, table: &str, event: ChangeEvent) {
        let channels = self.channels.lock().expect("channel map lock poisoned");
        if let Some(tx) = channels.get(table) {
            let _ = tx.send(event);
        }
    }
}

#[async_trait]
impl Gateway for LocalStore {
    async fn select(&self, table: &str, query: Query) -> Result<Vec<Value>, GatewayError> {
        self.latency.sleep().await;
        let rows = {
            let _guard = self.guard();
            self.read_rows(table)?
        };
        let mut rows: Vec<Value> = rows.into_iter().filter(|r| query.matches(r)).collect();
        sort_rows(&mut rows, &query.order);
        let rows = rows.into_iter().skip(query.offset);
        Ok(match query.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        })
    }

    async fn insert(&self, table: &str, mut record: Value) -> Result<Value, GatewayError> {
        self.latency.sleep().await;
        let now = json!(Utc::now());
        let id = {
            let obj = record
                .as_object_mut()
                .ok_or_else(|| GatewayError::Invalid("record must be a JSON object".into()))?;
            obj.entry("id")
                .or_insert_with(|| json!(Uuid::now_v7().to_string()));
            obj.entry("created_at").or_insert_with(|| now.clone());
            obj.entry("updated_at").or_insert(now);
            obj["id"]
                .as_str()
                .ok_or_else(|| GatewayError::Invalid("id must be a string".into()))?
                .to_string()
        };

        {
            let _guard = self.guard();
            let mut rows = self.read_rows(table)?;
            if rows
                .iter()
                .any(|r| r.get("id").and_then(Value::as_str) == Some(id.as_str()))
            {
                return Err(GatewayError::Conflict(format!(
                    "id '{}' already exists in {}",
                    id, table
                )));
            }
            rows.push(record.clone());
            self.write_rows(table, &rows)?;
        }
        self.emit(table, ChangeEvent::Inserted(record.clone()));
        Ok(record)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value, GatewayError> {
        self.latency.sleep().await;
        let patch = patch
            .as_object()
            .ok_or_else(|| GatewayError::Invalid("patch must be a JSON object".into()))?
            .clone();

        let updated = {
            let _guard = self.guard();
            let mut rows = self.read_rows(table)?;
            let slot = rows
                .iter_mut()
                .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
                .ok_or(GatewayError::NotFound)?;
            if let Some(obj) = slot.as_object_mut() {
                for (key, value) in patch {
                    obj.insert(key, value);
                }
                obj.insert("updated_at".into(), json!(Utc::now()));
            }
            let updated = slot.clone();
            self.write_rows(table, &rows)?;
            updated
        };
        self.emit(table, ChangeEvent::Updated(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool, GatewayError> {
        self.latency.sleep().await;
        let existed = {
            let _guard = self.guard();
            let mut rows = self.read_rows(table)?;
            let before = rows.len();
            rows.retain(|r| r.get("id").and_then(Value::as_str) != Some(id));
            let existed = rows.len() != before;
            if existed {
                self.write_rows(table, &rows)?;
            }
            existed
        };
        if existed {
            self.emit(table, ChangeEvent::Deleted { id: id.to_string() });
        }
        Ok(existed)
    }

    async fn rpc(&self, name: &str, args: Value) -> Result<Value, GatewayError> {
        self.latency.sleep().await;
        match name {
            // Atomic under the store lock; clients never read-modify-write
            // view counts themselves.
            "increment_post_view" => {
                let post_id = args
                    .get("post_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| GatewayError::Invalid("post_id is required".into()))?;
                let (count, updated) = {
                    let _guard = self.guard();
                    let mut rows = self.read_rows("posts")?;
                    let slot = rows
                        .iter_mut()
                        .find(|r| r.get("id").and_then(Value::as_str) == Some(post_id))
                        .ok_or(GatewayError::NotFound)?;
                    let count = slot.get("view_count").and_then(Value::as_i64).unwrap_or(0) + 1;
                    if let Some(obj) = slot.as_object_mut() {
                        obj.insert("view_count".into(), json!(count));
                    }
                    let updated = slot.clone();
                    self.write_rows("posts", &rows)?;
                    (count, updated)
                };
                self.emit("posts", ChangeEvent::Updated(updated));
                Ok(json!(count))
            }
            other => Err(GatewayError::Unavailable(format!("unknown rpc '{}'", other))),
        }
    }

    async fn subscribe(
        &self,
        table: &str,
        filter: Option<Filter>,
    ) -> Result<Subscription, GatewayError> {
        let rx = {
            let mut channels = self.channels.lock().expect("channel map lock poisoned");
            channels
                .entry(table.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe()
        };
        Ok(Subscription::new(rx, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store(tmp: &tempfile::TempDir) -> Arc<LocalStore> {
        LocalStore::open(tmp.path().join("store"), LatencyProfile::none()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn inverted_latency_bounds_do_not_panic() {
        LatencyProfile {
            min_ms: 500,
            max_ms: 100,
        }
        .sleep()
        .await;
    }

    #[tokio::test]
    async fn opens_with_seed_data() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);
        let posts = store.select("posts", Query::new()).await.unwrap();
        assert_eq!(posts.len(), 3);
    }

    #[tokio::test]
    async fn does_not_reseed_emptied_collections() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = open_store(&tmp);
            for row in store.select("posts", Query::new()).await.unwrap() {
                store
                    .delete("posts", row["id"].as_str().unwrap())
                    .await
                    .unwrap();
            }
        }
        // Re-open over the same directory: marker present, no re-seed
        let store = open_store(&tmp);
        assert!(store.select("posts", Query::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamps() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);
        let row = store
            .insert("interactions", json!({"post_id": "p-001", "kind": "view"}))
            .await
            .unwrap();
        assert!(row["id"].as_str().is_some());
        assert!(row["created_at"].as_str().is_some());
        assert!(row["updated_at"].as_str().is_some());
    }

    #[tokio::test]
    async fn insert_keeps_caller_supplied_id() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);
        let row = store
            .insert("interactions", json!({"id": "i-custom", "post_id": "p-001", "kind": "view"}))
            .await
            .unwrap();
        assert_eq!(row["id"], "i-custom");

        // Same id again is a conflict
        let err = store
            .insert("interactions", json!({"id": "i-custom", "post_id": "p-001", "kind": "view"}))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);
        let err = store
            .update("posts", "missing", json!({"title": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound));
    }

    #[tokio::test]
    async fn update_merges_patch_and_bumps_updated_at() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);
        let row = store
            .update("posts", "p-001", json!({"title": "Nuevo título"}))
            .await
            .unwrap();
        assert_eq!(row["title"], "Nuevo título");
        assert_eq!(row["slug"], "confia-en-dios");
        assert_ne!(row["updated_at"], json!("2024-03-04T08:00:00Z"));
    }

    #[tokio::test]
    async fn rpc_increments_view_count() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);
        let count = store
            .rpc("increment_post_view", json!({"post_id": "p-001"}))
            .await
            .unwrap();
        assert_eq!(count, json!(13));
        let again = store
            .rpc("increment_post_view", json!({"post_id": "p-001"}))
            .await
            .unwrap();
        assert_eq!(again, json!(14));
    }

    #[tokio::test]
    async fn unknown_rpc_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);
        let err = store.rpc("no_such_fn", json!({})).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
    }

    #[tokio::test]
    async fn writes_are_pushed_to_subscribers() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);
        let mut sub = store
            .subscribe("interactions", Some(Filter::eq("post_id", "p-001")))
            .await
            .unwrap();

        let row = store
            .insert("interactions", json!({"post_id": "p-001", "kind": "like", "user_id": "u-001"}))
            .await
            .unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event, ChangeEvent::Inserted(row.clone()));

        store
            .delete("interactions", row["id"].as_str().unwrap())
            .await
            .unwrap();
        let event = sub.recv().await.unwrap();
        assert_eq!(
            event,
            ChangeEvent::Deleted {
                id: row["id"].as_str().unwrap().to_string()
            }
        );
    }

    #[tokio::test]
    async fn clear_all_data_restores_the_seed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);
        store
            .insert("posts", json!({"slug": "extra", "title": "Extra", "content": "x",
                "published": false, "featured": false, "event_date": "2024-07-01T10:00:00Z"}))
            .await
            .unwrap();
        store.delete("posts", "p-001").await.unwrap();

        store.clear_all_data().unwrap();

        let posts = store.select("posts", Query::new()).await.unwrap();
        let ids: Vec<&str> = posts.iter().filter_map(|r| r["id"].as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"p-001"));
        assert!(ids.contains(&"p-002"));
        assert!(ids.contains(&"p-003"));
    }
}
