//! Dashboard API service.
//!
//! Serves the campaign dashboard: ads insights and account rollups, session
//! recordings, the purchase ledger fed by the order webhook, and Web Push
//! subscription intake. See [`dashboard_api::config`] for the environment
//! variables it reads.

use std::sync::Arc;

use anyhow::{Context, Result};
use dashboard_api::{config::Settings, router, secrets::SecretsClient, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dashboard_api=info".parse()?)
                .add_directive("analytics_core=info".parse()?)
                .add_directive("purchase_ledger=info".parse()?),
        )
        .json()
        .init();

    // Resolve settings (Bitwarden → env fallback).
    let secrets = SecretsClient::new()?;
    let settings = Settings::load(&secrets).await?;

    let ledger = purchase_ledger::open(&settings.ledger_url)
        .await
        .context("failed to open purchase ledger")?;

    let state = Arc::new(AppState::from_settings(&settings, ledger)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    info!(addr = %settings.bind_addr, "dashboard api listening");

    axum::serve(listener, app).await?;

    Ok(())
}
