use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use clasificados::config::AppConfig;
use clasificados::database::pool;
use clasificados::services::auth_service::HostedAuth;
use clasificados::storage::LocalObjectStorage;
use clasificados::web::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // 1. Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("clasificados=info,tower_http=info")),
        )
        .init();

    // 2. Config + database
    let config = AppConfig::from_env().context("invalid configuration")?;
    let pool = pool::connect(&config.database_url)
        .await
        .context("cannot open database")?;

    // 3. Object storage
    tokio::fs::create_dir_all(&config.storage_dir)
        .await
        .with_context(|| format!("cannot create {}", config.storage_dir.display()))?;
    let storage = LocalObjectStorage::new(&config.storage_dir, &config.storage_public_url);

    let auth = HostedAuth::new(&config);

    let config = Arc::new(config);
    let state = AppState {
        pool,
        storage: Arc::new(storage),
        config: config.clone(),
        auth: Arc::new(auth),
    };
    let app = web::router(state);

    // 4. Start the server (with fallback port)
    let addr = config.bind_addr(config.port)?;
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            let fallback_port = config.port.checked_add(1).context("no fallback port")?;
            let fallback = config.bind_addr(fallback_port)?;
            warn!("⚠️  Cannot bind {}: {}. Trying fallback {}", addr, e, fallback);
            tokio::net::TcpListener::bind(fallback)
                .await
                .with_context(|| format!("cannot bind fallback {}", fallback))?
        }
    };

    let bound_addr = listener.local_addr()?;
    info!("🚀 Server running on http://{}", bound_addr);
    info!("📍 Public URL {}", config.base_url());

    axum::serve(listener, app).await?;
    Ok(())
}
