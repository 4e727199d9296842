// Operational endpoints: /system/health, /system/progress and
// /system/test-connections. These never fail the request pipeline; a broken
// dependency shows up in the body and the status code instead.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::api::state::AppState;
use crate::core::performance::{PerformanceSource, RecordStore};

pub fn routes<P, R>() -> Router<AppState<P, R>>
where
    P: PerformanceSource + 'static,
    R: RecordStore + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/progress", get(progress))
        .route("/test-connections", get(test_connections))
}

/// Deep health check: probes both providers and reports per-service detail.
/// Any provider error makes the whole report unhealthy (500); a missing
/// analysis key only degrades it (still 200).
async fn health<P, R>(State(state): State<AppState<P, R>>) -> (StatusCode, Json<Value>)
where
    P: PerformanceSource,
    R: RecordStore,
{
    tracing::info!("health check requested");

    let mut status = "healthy";

    let google_ads = if state.source.test_connection().await {
        json!({
            "status": "connected",
            "hasToken": true,
            "customerId": state.config.google_ads.customer_id,
            "mccCustomerId": state.config.google_ads.mcc_customer_id,
        })
    } else {
        status = "unhealthy";
        json!({ "status": "error" })
    };

    let airtable = if state.store.test_connection().await {
        json!({
            "status": "connected",
            "baseId": state.config.airtable.base_id,
        })
    } else {
        status = "unhealthy";
        json!({ "status": "error", "baseId": state.config.airtable.base_id })
    };

    let claude = if state.config.claude.api_key.is_empty() {
        if status == "healthy" {
            status = "degraded";
        }
        json!({ "status": "not_configured", "hasApiKey": false })
    } else {
        json!({ "status": "configured", "hasApiKey": true })
    };

    let code = if status == "unhealthy" {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };

    tracing::info!(status, "health check completed");

    let body = json!({
        "status": status,
        "timestamp": Utc::now().to_rfc3339(),
        "services": {
            "googleAds": google_ads,
            "airtable": airtable,
            "claude": claude,
        },
        "environment": {
            "appEnv": state.config.app.environment,
        },
    });

    (code, Json(body))
}

/// Sync progress: table counts plus how many whole days have passed since
/// the newest campaign row. 200 when both providers answer, 207 otherwise.
async fn progress<P, R>(State(state): State<AppState<P, R>>) -> (StatusCode, Json<Value>)
where
    P: PerformanceSource,
    R: RecordStore,
{
    let google_ok = state.source.test_connection().await;
    let google_ads = json!({ "status": if google_ok { "ok" } else { "error" } });

    let mut airtable_ok = false;
    let mut airtable_service = json!({ "status": "error" });
    let mut airtable = json!({ "recencyDays": Value::Null, "counts": {} });

    if state.store.test_connection().await {
        match state.store.table_counts().await {
            Ok(counts) => {
                airtable_ok = true;
                airtable_service = json!({ "status": "ok" });
                airtable["counts"] = json!({
                    "campaigns": counts.campaigns,
                    "adGroups": counts.ad_groups,
                    "keywords": counts.keywords,
                    "ads": counts.ads,
                });

                match state.store.latest_campaign_update().await {
                    Ok(Some(latest)) => {
                        airtable["recencyDays"] = json!(recency_days(latest, Utc::now()));
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!("latest campaign lookup failed: {err}");
                    }
                }
            }
            Err(err) => {
                airtable_service = json!({ "status": "error", "error": err.to_string() });
            }
        }
    }

    let code = if google_ok && airtable_ok {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };

    let body = json!({
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.app.environment,
        "services": {
            "googleAds": google_ads,
            "airtable": airtable_service,
        },
        "airtable": airtable,
    });

    (code, Json(body))
}

/// Probe both providers and report each result. 200 only when every
/// connection succeeds.
async fn test_connections<P, R>(State(state): State<AppState<P, R>>) -> (StatusCode, Json<Value>)
where
    P: PerformanceSource,
    R: RecordStore,
{
    let google_ads = state.source.test_connection().await;
    let airtable = state.store.test_connection().await;
    let all_connected = google_ads && airtable;

    let code = if all_connected {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let body = json!({
        "success": all_connected,
        "results": {
            "googleAds": google_ads,
            "airtable": airtable,
            "timestamp": Utc::now().to_rfc3339(),
        },
        "message": if all_connected {
            "All connections successful"
        } else {
            "Some connections failed"
        },
    });

    (code, Json(body))
}

/// Whole days elapsed between `latest` and `now`, truncated toward zero.
fn recency_days(latest: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - latest).num_days()
}
