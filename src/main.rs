// This is the entry point of the sync service.
//
// **Architecture Overview:**
// - `core/` = Business logic (provider-agnostic)
// - `infra/` = Implementations of core traits (Google Ads, Airtable)
// - `api/` = HTTP surface (routes, handlers, error mapping)
//
// This file's job is to:
// 1. Load and validate configuration
// 2. Initialize clients and services (dependency injection)
// 3. Start the daily sync loop
// 4. Serve the HTTP API

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "api/api_layer.rs"]
mod api;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use std::sync::Arc;

use anyhow::Context;
use chrono::{Days, Utc};
use tokio::time::{sleep, Duration};

use crate::api::routes::build_router;
use crate::api::state::AppState;
use crate::config::Config;
use crate::core::performance::DateRange;
use crate::core::sync::SyncService;
use crate::infra::airtable::AirtableApiClient;
use crate::infra::google_ads::GoogleAdsApiClient;

const DAILY_SYNC_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Load .env file if present (for local development)
    dotenv::dotenv().ok();

    // Configuration problems are fatal: the service must not come up
    // half-wired and fail on the first request instead.
    let config = Arc::new(Config::from_env().context("configuration validation failed")?);
    tracing::info!(
        environment = %config.app.environment,
        port = config.app.port,
        "configuration loaded"
    );

    let source = Arc::new(
        GoogleAdsApiClient::new(config.google_ads.clone())
            .context("failed to build Google Ads client")?,
    );
    let store = Arc::new(
        AirtableApiClient::new(config.airtable.clone())
            .context("failed to build Airtable client")?,
    );

    spawn_daily_sync(source.clone(), store.clone(), config.clone());

    let state = AppState::new(source, store, config.clone());
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", config.app.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router)
        .await
        .context("server error")?;

    Ok(())
}

/// Background loop that pulls yesterday's data once per day for the
/// configured accounts. Skipped entirely when no account ids are set.
fn spawn_daily_sync(
    source: Arc<GoogleAdsApiClient>,
    store: Arc<AirtableApiClient>,
    config: Arc<Config>,
) {
    let customer_ids = config.sync_customer_ids();
    if customer_ids.is_empty() {
        tracing::warn!("no customer IDs configured, daily sync disabled");
        return;
    }

    let sync = SyncService::new(source, store);
    tokio::spawn(async move {
        loop {
            sleep(DAILY_SYNC_INTERVAL).await;

            let Some(yesterday) = Utc::now().date_naive().checked_sub_days(Days::new(1)) else {
                tracing::error!("could not compute yesterday's date");
                continue;
            };
            let range = DateRange::single_day(yesterday);
            tracing::info!(?range, accounts = customer_ids.len(), "daily sync starting");

            match sync.run(&customer_ids, &range).await {
                Ok(report) => {
                    tracing::info!(
                        campaigns = report.campaigns,
                        ad_groups = report.ad_groups,
                        keywords = report.keywords,
                        ads = report.ads,
                        failures = report.failures.len(),
                        "daily sync completed"
                    );
                }
                Err(err) => tracing::error!("daily sync failed: {err}"),
            }
        }
    });
}
