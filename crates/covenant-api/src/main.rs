//! Covenant API server entry point

use covenant_api::{serve, AppState};
use covenant_core::AppConfig;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("covenant=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .init();

    tracing::info!("Starting Covenant host");
    let state = AppState::with_config(AppConfig::default());
    serve(state).await
}
