use std::sync::Arc;

use crate::config::Config;
use crate::error::AppResult;
use crate::fallback::{LocalAuth, LocalStore};
use crate::feed::{InteractionFeed, PostFeed, Viewer};
use crate::services::{CategoryService, InteractionService, PostQuery, PostService};
use crate::gateway::DynGateway;

/// Explicitly constructed handle bundling the gateway and the entity
/// services. Passed in rather than reached for: tests substitute a fake
/// backend by building a client over it.
#[derive(Clone)]
pub struct Client {
    pub gateway: DynGateway,
    pub posts: PostService,
    pub categories: CategoryService,
    pub interactions: InteractionService,
    /// Present only when running on the local fallback store.
    pub auth: Option<Arc<LocalAuth>>,
}

impl Client {
    pub fn with_gateway(gateway: DynGateway) -> Self {
        Self {
            posts: PostService::new(gateway.clone()),
            categories: CategoryService::new(gateway.clone()),
            interactions: InteractionService::new(gateway.clone()),
            auth: None,
            gateway,
        }
    }

    /// Build a client over the local fallback store.
    pub fn local(config: &Config) -> AppResult<Self> {
        let store = LocalStore::open(config.store_path(), config.latency())?;
        let auth = Arc::new(LocalAuth::new(store.clone(), config.auth.session_hours));
        let gateway: DynGateway = store;
        let mut client = Self::with_gateway(gateway);
        client.auth = Some(auth);
        Ok(client)
    }

    pub fn post_feed(&self, query: PostQuery) -> PostFeed {
        PostFeed::new(self.posts.clone(), query)
    }

    pub fn interaction_feed(
        &self,
        post_id: impl Into<String>,
        viewer: Option<Viewer>,
    ) -> InteractionFeed {
        InteractionFeed::new(self.interactions.clone(), post_id, viewer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cli, Command};

    #[tokio::test]
    async fn local_client_serves_seeded_posts() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: None,
            data_dir: Some(tmp.path().to_path_buf()),
            command: Command::Seed,
        };
        let config = Config::load(&cli).unwrap();
        let config = Config {
            store: crate::config::StoreConfig {
                latency_min_ms: 0,
                latency_max_ms: 0,
                ..config.store
            },
            ..config
        };

        let client = Client::local(&config).unwrap();
        assert!(client.auth.is_some());
        let posts = client.posts.list(&PostQuery::published()).await.unwrap();
        assert_eq!(posts.len(), 3);
    }
}
