use clap::Parser;
use tracing_subscriber::EnvFilter;

use kapilya::config::{Cli, Command, Config};
use kapilya::fallback::{LatencyProfile, LocalStore};
use kapilya::gateway::{Gateway, Query};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load a dotenv-style file if one is present
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    let config = Config::load(&cli)?;

    match cli.command {
        Command::CheckConfig => match config.backend() {
            Ok((url, _anon_key)) => {
                tracing::info!("Backend configured: {}", url);
            }
            Err(missing) => {
                eprintln!("Error: missing configuration: {}", missing.join(", "));
                eprintln!("Set them in the environment or a .env file.");
                std::process::exit(1);
            }
        },
        Command::Seed => {
            let store = LocalStore::open(config.store_path(), LatencyProfile::none())?;
            tracing::info!("Local store ready at {}", store.dir().display());
        }
        Command::Reset => {
            let store = LocalStore::open(config.store_path(), LatencyProfile::none())?;
            store.clear_all_data()?;
            tracing::info!("Local store reset to the seed dataset");
        }
        Command::Show { collection } => {
            let store = LocalStore::open(config.store_path(), LatencyProfile::none())?;
            let rows = store.select(&collection, Query::new()).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }

    Ok(())
}
