//! Seed the product catalog.
//!
//! ```bash
//! seed-products                 # config/sample_products.toml, else built-in
//! seed-products my_catalog.toml # catalog from file
//! ```

use pay_api::seed::{
    find_sample_catalog, load_sample_catalog, seed_products, SAMPLE_CATALOG_PATHS,
};
use pay_api::state::{AppConfig, AppState};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| find_sample_catalog(SAMPLE_CATALOG_PATHS));
    if path.is_none() {
        info!("No catalog file found, using the built-in catalog");
    }
    let samples = load_sample_catalog(path.as_deref())?;

    let config = AppConfig::from_env()?;
    let state = AppState::build(config).await?;

    let report = seed_products(&state.payments, &samples)
        .await
        .map_err(|e| anyhow::anyhow!("Seeding failed: {}", e))?;

    info!(
        created = report.created,
        failed = report.failed,
        skipped = report.skipped,
        "Seeding finished"
    );
    Ok(())
}
