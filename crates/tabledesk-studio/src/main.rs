use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tabledesk_studio::{
    config::{Args, StudioConfig},
    create_router, demo,
    state::AppState,
    upstream::OllamaClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let log_filter = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "tabledesk_studio={0},tabledesk_core={0},tower_http=info",
                    log_filter
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Create configuration
    let config: StudioConfig = args.into();
    let listen_addr = config.listen_addr();
    let base_url = config.base_url();

    // Create application state
    let suggester = OllamaClient::new(&config.suggest)?;
    tracing::info!(endpoint = suggester.endpoint(), model = %config.suggest.model, "Suggestion service configured");
    let state = AppState::new(config.clone(), Arc::new(suggester));

    // Bootstrap the database
    if let Some(script) = &config.init_script {
        if script.exists() {
            let sql = std::fs::read_to_string(script)?;
            state.database.apply_script(&sql)?;
        } else {
            tracing::warn!(path = %script.display(), "Init script not found, skipping");
        }
    }
    if config.demo {
        demo::seed(&state.database)?;
    }

    // Create router
    let app = create_router(state);

    // Bind to address
    let listener = TcpListener::bind(&listen_addr).await?;

    tracing::info!("TableDesk Studio starting on {}", base_url);
    tracing::info!("Database file {}", config.database.display());
    tracing::info!("API available at {}/api/schema", base_url);
    tracing::info!("Health check at {}/health", base_url);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}
