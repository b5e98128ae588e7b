use std::path::PathBuf;

use anyhow::Context;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use clasificados::database::pool;
use clasificados::services::location_service;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clasificados=info")),
        )
        .init();

    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let seed_path: PathBuf = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SEED_FILE").ok())
        .unwrap_or_else(|| "seed/locations.json".to_string())
        .into();

    let pool = pool::connect(&db_url).await?;
    let report = location_service::seed_from_path(&pool, &seed_path)
        .await
        .with_context(|| format!("seeding from {} failed", seed_path.display()))?;

    println!(
        "seed: states={}, cities={}, sub_categories={}, skipped={}",
        report.states, report.cities, report.sub_categories, report.skipped
    );
    Ok(())
}
