use anyhow::Result;
use arabic_writer::config::Config;
use arabic_writer::server::{self, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when variables come from the environment)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arabic_writer=info".parse()?),
        )
        .init();

    info!("Starting Arabic Writer");

    // Load configuration from environment
    let config = Config::from_env()?;

    // Open the store and build the gateway once, then hand them to the router
    let state = AppState::from_config(&config).await?;

    server::serve(&config, state).await
}
