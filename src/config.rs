use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variables naming the remote backend. Loaded from the
/// process environment, usually via a dotenv-style file.
pub const ENV_URL: &str = "KAPILYA_URL";
pub const ENV_ANON_KEY: &str = "KAPILYA_ANON_KEY";

#[derive(Parser, Debug)]
#[command(name = "kapilya", about = "Church community content sync")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify the remote backend configuration from the environment
    CheckConfig,
    /// Initialize the local store (seeds the fixed dataset once)
    Seed,
    /// Wipe the local store and re-seed it
    Reset,
    /// Print a local collection as JSON
    Show {
        /// Collection name: posts, categories, interactions or users
        collection: String,
    },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
    pub latency_min_ms: u64,
    pub latency_max_ms: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub session_hours: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            latency_min_ms: 100,
            latency_max_ms: 800,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_hours: crate::fallback::DEFAULT_SESSION_HOURS,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // Environment fills in backend values the file left unset
        if config.backend.url.is_none() {
            config.backend.url = std::env::var(ENV_URL).ok();
        }
        if config.backend.anon_key.is_none() {
            config.backend.anon_key = std::env::var(ENV_ANON_KEY).ok();
        }

        if config.store.path.is_none() {
            config.store.path = Some(data_dir.join("store"));
        }

        if config.store.latency_min_ms > config.store.latency_max_ms {
            tracing::warn!(
                "latency_min_ms {} exceeds latency_max_ms {}, swapping",
                config.store.latency_min_ms,
                config.store.latency_max_ms
            );
            std::mem::swap(
                &mut config.store.latency_min_ms,
                &mut config.store.latency_max_ms,
            );
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .expect("Could not determine home directory")
                .join(".kapilya")
        })
    }

    pub fn store_path(&self) -> &PathBuf {
        self.store.path.as_ref().expect("store path resolved at load")
    }

    pub fn latency(&self) -> crate::fallback::LatencyProfile {
        crate::fallback::LatencyProfile {
            min_ms: self.store.latency_min_ms,
            max_ms: self.store.latency_max_ms,
        }
    }

    /// The remote backend pair, or the names of whichever variables are
    /// missing.
    pub fn backend(&self) -> Result<(&str, &str), Vec<&'static str>> {
        let mut missing = Vec::new();
        if self.backend.url.is_none() {
            missing.push(ENV_URL);
        }
        if self.backend.anon_key.is_none() {
            missing.push(ENV_ANON_KEY);
        }
        if missing.is_empty() {
            Ok((
                self.backend.url.as_deref().unwrap_or_default(),
                self.backend.anon_key.as_deref().unwrap_or_default(),
            ))
        } else {
            Err(missing)
        }
    }
}
