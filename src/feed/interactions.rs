use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::{Interaction, InteractionKind, NewInteraction};
use crate::error::{AppResult, Error};
use crate::gateway::{ChangeEvent, Subscription};
use crate::services::InteractionService;

use super::Viewer;

/// Per-post interaction cache: the full interaction list (newest first)
/// plus the current user's own interaction per kind.
///
/// Writes are optimistic with explicit reconciliation: a provisional
/// entry is applied first, replaced by the server's authoritative record
/// on success and rolled back on failure. Two concurrent toggles are not
/// serialized client-side; the last response wins locally until the next
/// fetch or push event.
pub struct InteractionFeed {
    service: InteractionService,
    post_id: String,
    viewer: Option<Viewer>,
    state: Mutex<FeedState>,
}

#[derive(Default)]
struct FeedState {
    entries: Vec<Interaction>,
    own: HashMap<InteractionKind, Interaction>,
    pending: HashSet<String>,
    generation: u64,
    loading: bool,
    last_error: Option<String>,
}

fn provisional(new: &NewInteraction) -> Interaction {
    Interaction {
        id: format!("pending-{}", Uuid::now_v7()),
        post_id: new.post_id.clone(),
        user_id: new.user_id.clone(),
        kind: new.kind,
        content: new.content.clone(),
        author_name: new.author_name.clone(),
        author_email: new.author_email.clone(),
        parent_id: new.parent_id.clone(),
        approved: new.approved,
        created_at: Utc::now(),
    }
}

impl InteractionFeed {
    pub fn new(service: InteractionService, post_id: impl Into<String>, viewer: Option<Viewer>) -> Self {
        Self {
            service,
            post_id: post_id.into(),
            viewer,
            state: Mutex::new(FeedState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().expect("feed state lock poisoned")
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    /// Re-fetch the interaction list and the viewer's own interactions
    /// (one batched query). A response from a superseded refresh is
    /// discarded so a slow fetch never clobbers a newer one.
    pub async fn refresh(&self) -> AppResult<()> {
        let generation = {
            let mut st = self.state();
            st.generation += 1;
            st.loading = true;
            st.generation
        };

        let result = self.fetch().await;

        let mut st = self.state();
        if st.generation != generation {
            return Ok(());
        }
        st.loading = false;
        match result {
            Ok((entries, own)) => {
                st.entries = entries;
                st.own = own;
                st.pending.clear();
                st.last_error = None;
                Ok(())
            }
            Err(e) => {
                st.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch(
        &self,
    ) -> AppResult<(Vec<Interaction>, HashMap<InteractionKind, Interaction>)> {
        let entries = self.service.list_for_post(&self.post_id, None).await?;
        let own = match &self.viewer {
            Some(viewer) => {
                self.service
                    .find_own(&self.post_id, &viewer.id, &InteractionKind::ALL)
                    .await?
            }
            None => HashMap::new(),
        };
        Ok((entries, own))
    }

    pub async fn toggle_like(&self) -> AppResult<bool> {
        self.toggle(InteractionKind::Like).await
    }

    pub async fn toggle_favorite(&self) -> AppResult<bool> {
        self.toggle(InteractionKind::Favorite).await
    }

    /// Delete the viewer's existing interaction of this kind, or create
    /// one. Two remote calls are never fused: a duplicate create racing
    /// another toggle fails harmlessly, rolled back and recorded as a
    /// non-fatal error. Returns whether the interaction now exists.
    async fn toggle(&self, kind: InteractionKind) -> AppResult<bool> {
        let viewer = self.viewer.clone().ok_or(Error::AuthRequired)?;
        let existing = self.state().own.get(&kind).cloned();

        if let Some(existing) = existing {
            {
                let mut st = self.state();
                st.entries.retain(|e| e.id != existing.id);
                st.own.remove(&kind);
                st.pending.remove(&existing.id);
            }
            match self.service.delete(&existing.id).await {
                Ok(()) => Ok(false),
                // Already gone remotely; the local removal stands.
                Err(Error::NotFound) => Ok(false),
                Err(e) => {
                    let mut st = self.state();
                    st.entries.insert(0, existing.clone());
                    st.own.insert(kind, existing);
                    st.last_error = Some(e.to_string());
                    Err(e)
                }
            }
        } else {
            let new = NewInteraction::of_kind(kind, self.post_id.clone(), viewer.id.clone());
            let entry = provisional(&new);
            {
                let mut st = self.state();
                st.pending.insert(entry.id.clone());
                st.own.insert(kind, entry.clone());
                st.entries.insert(0, entry.clone());
            }
            match self.service.create(new).await {
                Ok(server) => {
                    let mut st = self.state();
                    Self::confirm(&mut st, &entry.id, server.clone());
                    st.own.insert(kind, server);
                    Ok(true)
                }
                Err(e) => {
                    let mut st = self.state();
                    Self::rollback(&mut st, &entry.id, kind);
                    st.last_error = Some(e.to_string());
                    Err(e)
                }
            }
        }
    }

    /// Create a comment. Validated before any optimistic state change;
    /// the provisional entry at the head of the list is replaced by the
    /// server's record, never by a client-guessed one.
    pub async fn add_comment(&self, content: &str) -> AppResult<Interaction> {
        let viewer = self.viewer.clone().ok_or(Error::AuthRequired)?;
        let new = NewInteraction::comment(
            self.post_id.clone(),
            viewer.id.clone(),
            content,
            viewer.name.clone(),
            viewer.email.clone(),
        );
        if let Err(e) = new.validate() {
            self.state().last_error = Some(e.to_string());
            return Err(e);
        }

        let entry = provisional(&new);
        {
            let mut st = self.state();
            st.pending.insert(entry.id.clone());
            st.own.insert(InteractionKind::Comment, entry.clone());
            st.entries.insert(0, entry.clone());
        }
        match self.service.create(new).await {
            Ok(server) => {
                let mut st = self.state();
                Self::confirm(&mut st, &entry.id, server.clone());
                st.own.insert(InteractionKind::Comment, server.clone());
                drop(st);
                Ok(server)
            }
            Err(e) => {
                let mut st = self.state();
                Self::rollback(&mut st, &entry.id, InteractionKind::Comment);
                st.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Record a view event, anonymously when nobody is signed in. Views
    /// are not optimistic; the server record is applied on success.
    pub async fn record_view(&self) -> AppResult<Interaction> {
        let user_id = self.viewer.as_ref().map(|v| v.id.clone());
        let new = NewInteraction::view(self.post_id.clone(), user_id);
        match self.service.create(new).await {
            Ok(server) => {
                let mut st = self.state();
                if !st.entries.iter().any(|e| e.id == server.id) {
                    st.entries.insert(0, server.clone());
                }
                Ok(server)
            }
            Err(e) => {
                self.state().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn confirm(st: &mut FeedState, provisional_id: &str, server: Interaction) {
        st.pending.remove(provisional_id);
        if st.entries.iter().any(|e| e.id == server.id) {
            // The push echo of this write arrived first; the server row is
            // already in the list, so the provisional entry just goes.
            st.entries.retain(|e| e.id != provisional_id);
        } else if let Some(slot) = st.entries.iter_mut().find(|e| e.id == provisional_id) {
            *slot = server;
        } else {
            st.entries.insert(0, server);
        }
    }

    fn rollback(st: &mut FeedState, provisional_id: &str, kind: InteractionKind) {
        st.pending.remove(provisional_id);
        st.entries.retain(|e| e.id != provisional_id);
        if st.own.get(&kind).map(|o| o.id == provisional_id).unwrap_or(false) {
            st.own.remove(&kind);
        }
    }

    /// Merge a push event into local state.
    ///
    /// Insert prepends (and updates the own map when the actor is the
    /// viewer), update replaces by id in place, delete removes by id.
    /// Events for unknown ids or other posts are no-ops.
    pub fn apply_event(&self, event: ChangeEvent) {
        match event {
            ChangeEvent::Inserted(row) => {
                let interaction: Interaction = match serde_json::from_value(row) {
                    Ok(i) => i,
                    Err(e) => {
                        tracing::warn!("Ignoring undecodable push row: {}", e);
                        return;
                    }
                };
                if interaction.post_id != self.post_id {
                    return;
                }
                let mut st = self.state();
                if st.entries.iter().any(|e| e.id == interaction.id) {
                    // echo of our own confirmed write
                    return;
                }
                if self.is_viewer(&interaction) {
                    st.own.insert(interaction.kind, interaction.clone());
                }
                st.entries.insert(0, interaction);
            }
            ChangeEvent::Updated(row) => {
                let interaction: Interaction = match serde_json::from_value(row) {
                    Ok(i) => i,
                    Err(e) => {
                        tracing::warn!("Ignoring undecodable push row: {}", e);
                        return;
                    }
                };
                if interaction.post_id != self.post_id {
                    return;
                }
                let mut st = self.state();
                if let Some(own) = st.own.get_mut(&interaction.kind) {
                    if own.id == interaction.id {
                        *own = interaction.clone();
                    }
                }
                if let Some(slot) = st.entries.iter_mut().find(|e| e.id == interaction.id) {
                    *slot = interaction;
                }
            }
            ChangeEvent::Deleted { id } => {
                let mut st = self.state();
                st.entries.retain(|e| e.id != id);
                st.own.retain(|_, own| own.id != id);
                st.pending.remove(&id);
            }
        }
    }

    fn is_viewer(&self, interaction: &Interaction) -> bool {
        match (&self.viewer, &interaction.user_id) {
            (Some(viewer), Some(user_id)) => &viewer.id == user_id,
            _ => false,
        }
    }

    pub async fn subscribe(&self) -> AppResult<Subscription> {
        self.service.subscribe(&self.post_id).await
    }

    /// Forward push events into the feed until the subscription closes.
    /// Aborting the handle drops the subscription, which unsubscribes.
    pub fn spawn_listener(self: &Arc<Self>, mut subscription: Subscription) -> JoinHandle<()> {
        let feed = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                feed.apply_event(event);
            }
        })
    }

    // Derived views: pure functions over the cached list.

    pub fn interactions(&self) -> Vec<Interaction> {
        self.state().entries.clone()
    }

    pub fn of_kind(&self, kind: InteractionKind) -> Vec<Interaction> {
        self.state()
            .entries
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn likes(&self) -> Vec<Interaction> {
        self.of_kind(InteractionKind::Like)
    }

    pub fn comments(&self) -> Vec<Interaction> {
        self.of_kind(InteractionKind::Comment)
    }

    pub fn favorites(&self) -> Vec<Interaction> {
        self.of_kind(InteractionKind::Favorite)
    }

    pub fn shares(&self) -> Vec<Interaction> {
        self.of_kind(InteractionKind::Share)
    }

    pub fn count_of(&self, kind: InteractionKind) -> usize {
        self.state().entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn like_count(&self) -> usize {
        self.count_of(InteractionKind::Like)
    }

    pub fn comment_count(&self) -> usize {
        self.count_of(InteractionKind::Comment)
    }

    pub fn favorite_count(&self) -> usize {
        self.count_of(InteractionKind::Favorite)
    }

    pub fn own(&self, kind: InteractionKind) -> Option<Interaction> {
        self.state().own.get(&kind).cloned()
    }

    pub fn is_liked(&self) -> bool {
        self.state().own.contains_key(&InteractionKind::Like)
    }

    pub fn is_favorited(&self) -> bool {
        self.state().own.contains_key(&InteractionKind::Favorite)
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    use crate::fallback::{LatencyProfile, LocalStore};
    use crate::gateway::DynGateway;

    async fn feed_with_viewer() -> (InteractionFeed, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::open(tmp.path().join("store"), LatencyProfile::none()).unwrap();
        let gateway: DynGateway = store;
        let service = InteractionService::new(gateway);
        let feed = InteractionFeed::new(
            service,
            "p-100",
            Some(Viewer::new("u-9", "Marta", "marta@example.org")),
        );
        (feed, tmp)
    }

    #[tokio::test]
    async fn delete_event_for_unknown_id_is_a_noop() {
        let (feed, _tmp) = feed_with_viewer().await;
        feed.refresh().await.unwrap();
        let before = feed.interactions();

        feed.apply_event(ChangeEvent::Deleted { id: "nope".into() });

        assert_eq!(feed.interactions(), before);
        assert!(feed.last_error().is_none());
    }

    #[tokio::test]
    async fn insert_event_updates_count_and_own_map() {
        let (feed, _tmp) = feed_with_viewer().await;
        feed.refresh().await.unwrap();
        assert_eq!(feed.like_count(), 0);
        assert!(!feed.is_liked());

        feed.apply_event(ChangeEvent::Inserted(json!({
            "id": "i-77",
            "post_id": "p-100",
            "user_id": "u-9",
            "kind": "like",
            "approved": true,
            "created_at": "2024-05-01T09:00:00Z",
        })));

        assert_eq!(feed.like_count(), 1);
        assert!(feed.is_liked());
    }

    #[tokio::test]
    async fn insert_event_for_another_user_leaves_own_map_alone() {
        let (feed, _tmp) = feed_with_viewer().await;
        feed.refresh().await.unwrap();

        feed.apply_event(ChangeEvent::Inserted(json!({
            "id": "i-78",
            "post_id": "p-100",
            "user_id": "u-other",
            "kind": "like",
            "approved": true,
            "created_at": "2024-05-01T09:00:00Z",
        })));

        assert_eq!(feed.like_count(), 1);
        assert!(!feed.is_liked());
    }

    #[tokio::test]
    async fn insert_event_for_other_post_is_ignored() {
        let (feed, _tmp) = feed_with_viewer().await;
        feed.refresh().await.unwrap();

        feed.apply_event(ChangeEvent::Inserted(json!({
            "id": "i-79",
            "post_id": "p-999",
            "user_id": "u-9",
            "kind": "like",
            "approved": true,
            "created_at": "2024-05-01T09:00:00Z",
        })));

        assert_eq!(feed.like_count(), 0);
    }

    #[tokio::test]
    async fn toggle_without_viewer_requires_auth() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::open(tmp.path().join("store"), LatencyProfile::none()).unwrap();
        let feed = InteractionFeed::new(InteractionService::new(store), "p-100", None);
        assert!(matches!(feed.toggle_like().await, Err(Error::AuthRequired)));
    }

    #[tokio::test]
    async fn listener_stops_after_subscription_drops() {
        let (feed, _tmp) = feed_with_viewer().await;
        let feed = Arc::new(feed);
        let sub = feed.subscribe().await.unwrap();
        let handle = feed.spawn_listener(sub);
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
