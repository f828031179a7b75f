//! Server binary: settings from the environment, registry with optional extensions,
//! PostgreSQL plugin when `DATABASE_URL` is set and the in-memory plugin otherwise.

use netapi::{app, load_registry, AppState, InMemoryPlugin, PgPlugin, Plugin, Policy, Settings};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("netapi=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let registry = Arc::new(load_registry(settings.extensions_path.as_deref()).await?);
    let policy = match &settings.policy_path {
        Some(path) => Policy::parse(&tokio::fs::read_to_string(path).await?)?,
        None => Policy::default(),
    };

    let plugin: Arc<dyn Plugin> = match &settings.database_url {
        Some(url) => {
            tracing::info!(schema = %settings.schema, "using postgres plugin");
            Arc::new(PgPlugin::connect(url, &settings.schema, registry.clone()).await?)
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory plugin");
            Arc::new(InMemoryPlugin::new(registry.clone()))
        }
    };

    let state = AppState::new(plugin, registry, policy);
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state, settings.body_limit)).await?;
    Ok(())
}
