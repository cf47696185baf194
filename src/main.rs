mod config;
mod conversations;
mod error;
mod gateway;
mod handlers;
mod routes;
mod search;
mod state;
mod tools;
mod vision;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Config, Credentials};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shopping_guide=debug,tower_http=debug")),
        )
        .init();

    // An explicit config path must load; otherwise the first existing file wins
    let (config, loaded_path) = match std::env::var("SHOPPING_GUIDE_CONFIG") {
        Ok(path) => (Config::load(&path)?, Some(path)),
        Err(_) => {
            let candidates = vec!["conf.yaml".to_string(), "conf.json".to_string()];
            Config::discover(&candidates)?
        }
    };
    match loaded_path {
        Some(path) => info!("Loaded configuration from: {}", path),
        None => info!("No config file found, using defaults"),
    }

    // Missing gateway credential is fatal before anything talks to the network
    let credentials = Credentials::from_env(&config)?;

    let app_state = AppState::new(config.clone(), credentials).await?;

    let app = routes::create_routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
