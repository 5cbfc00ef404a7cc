use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use crate::domain::Post;
use crate::error::AppResult;
use crate::gateway::{ChangeEvent, Subscription};
use crate::services::{PostQuery, PostService};

/// Cached post list for one query, kept in sync through refresh and push
/// events. The cache lives as long as the owning view holds the feed.
pub struct PostFeed {
    service: PostService,
    query: PostQuery,
    state: Mutex<FeedState>,
}

#[derive(Default)]
struct FeedState {
    posts: Vec<Post>,
    generation: u64,
    loading: bool,
    last_error: Option<String>,
}

impl PostFeed {
    pub fn new(service: PostService, query: PostQuery) -> Self {
        Self {
            service,
            query,
            state: Mutex::new(FeedState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().expect("feed state lock poisoned")
    }

    pub async fn refresh(&self) -> AppResult<()> {
        let generation = {
            let mut st = self.state();
            st.generation += 1;
            st.loading = true;
            st.generation
        };

        let result = self.service.list(&self.query).await;

        let mut st = self.state();
        if st.generation != generation {
            return Ok(());
        }
        st.loading = false;
        match result {
            Ok(posts) => {
                st.posts = posts;
                st.last_error = None;
                Ok(())
            }
            Err(e) => {
                st.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Merge a push event. Inserts are admitted only when the row matches
    /// this feed's query filters; updates replace in place (a post
    /// unpublished out of a published-only feed is dropped); deletes of
    /// unknown ids are no-ops.
    pub fn apply_event(&self, event: ChangeEvent) {
        match event {
            ChangeEvent::Inserted(row) => {
                if !PostService::row_matches(&self.query, &row) {
                    return;
                }
                let post: Post = match serde_json::from_value(row) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!("Ignoring undecodable push row: {}", e);
                        return;
                    }
                };
                let mut st = self.state();
                if st.posts.iter().any(|p| p.id == post.id) {
                    return;
                }
                st.posts.insert(0, post);
            }
            ChangeEvent::Updated(row) => {
                let admitted = PostService::row_matches(&self.query, &row);
                let post: Post = match serde_json::from_value(row) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!("Ignoring undecodable push row: {}", e);
                        return;
                    }
                };
                let mut st = self.state();
                if !admitted {
                    st.posts.retain(|p| p.id != post.id);
                    return;
                }
                if let Some(slot) = st.posts.iter_mut().find(|p| p.id == post.id) {
                    *slot = post;
                }
            }
            ChangeEvent::Deleted { id } => {
                self.state().posts.retain(|p| p.id != id);
            }
        }
    }

    /// Count a view through the server-side atomic increment, then apply
    /// the authoritative count to the cached row.
    pub async fn record_view(&self, post_id: &str) -> AppResult<i64> {
        match self.service.increment_view_count(post_id).await {
            Ok(count) => {
                let mut st = self.state();
                if let Some(post) = st.posts.iter_mut().find(|p| p.id == post_id) {
                    post.view_count = count;
                }
                Ok(count)
            }
            Err(e) => {
                self.state().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn subscribe(&self) -> AppResult<Subscription> {
        self.service.subscribe().await
    }

    pub fn spawn_listener(self: &Arc<Self>, mut subscription: Subscription) -> JoinHandle<()> {
        let feed = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                feed.apply_event(event);
            }
        })
    }

    pub fn posts(&self) -> Vec<Post> {
        self.state().posts.clone()
    }

    pub fn get_by_slug(&self, slug: &str) -> Option<Post> {
        self.state().posts.iter().find(|p| p.slug == slug).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().posts.is_empty()
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

    use crate::fallback::{LatencyProfile, LocalStore};

    fn published_feed(dir: &std::path::Path) -> PostFeed {
        let store = LocalStore::open(dir.join("store"), LatencyProfile::none()).unwrap();
        PostFeed::new(PostService::new(store), PostQuery::published())
    }

    fn post_row(id: &str, published: bool) -> serde_json::Value {
        json!({
            "id": id,
            "slug": format!("slug-{id}"),
            "title": "Culto de oración",
            "content": "Nos reunimos el miércoles.",
            "published": published,
            "featured": false,
            "event_date": "2024-06-01T19:00:00Z",
            "view_count": 0,
            "like_count": 0,
            "comment_count": 0,
            "created_at": "2024-05-20T10:00:00Z",
            "updated_at": "2024-05-20T10:00:00Z",
        })
    }

    #[tokio::test]
    async fn unpublished_insert_is_not_admitted() {
        let tmp = tempfile::tempdir().unwrap();
        let feed = published_feed(tmp.path());
        feed.refresh().await.unwrap();
        let before = feed.len();

        feed.apply_event(ChangeEvent::Inserted(post_row("p-draft", false)));
        assert_eq!(feed.len(), before);

        feed.apply_event(ChangeEvent::Inserted(post_row("p-live", true)));
        assert_eq!(feed.len(), before + 1);
    }

    #[tokio::test]
    async fn unpublish_update_drops_the_row() {
        let tmp = tempfile::tempdir().unwrap();
        let feed = published_feed(tmp.path());
        feed.apply_event(ChangeEvent::Inserted(post_row("p-1", true)));
        assert_eq!(feed.len(), 1);

        feed.apply_event(ChangeEvent::Updated(post_row("p-1", false)));
        assert!(feed.is_empty());
    }

    #[tokio::test]
    async fn delete_of_unknown_id_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let feed = published_feed(tmp.path());
        feed.refresh().await.unwrap();
        let before = feed.posts();

        feed.apply_event(ChangeEvent::Deleted { id: "missing".into() });
        assert_eq!(feed.posts(), before);
    }
}
