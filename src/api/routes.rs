use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::api::system;
use crate::core::performance::{DateRange, PerformanceSource, RecordStore};

/// Assemble the full application router. CORS is wide open: this service
/// sits behind a private deployment, not a browser-facing origin policy.
pub fn build_router<P, R>(state: AppState<P, R>) -> Router
where
    P: PerformanceSource + 'static,
    R: RecordStore + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/health", get(liveness))
        .nest("/data", data_routes())
        .nest("/system", system::routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

fn data_routes<P, R>() -> Router<AppState<P, R>>
where
    P: PerformanceSource + 'static,
    R: RecordStore + 'static,
{
    Router::new()
        .route("/pull-performance", post(pull_performance))
        .route("/status", get(data_status))
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "ads-airtable-sync",
        "status": "running",
        "endpoints": [
            "POST /data/pull-performance",
            "GET /data/status",
            "GET /system/health",
            "GET /system/progress",
            "GET /system/test-connections",
        ],
    }))
}

/// Shallow liveness probe. Deep checks live under /system/health.
async fn liveness<P, R>(State(state): State<AppState<P, R>>) -> Json<Value>
where
    P: PerformanceSource,
    R: RecordStore,
{
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.app.environment,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug)]
struct PullRequest {
    customer_ids: Vec<String>,
    range: DateRange,
}

/// Trigger a pull for the requested accounts and date range. Partial
/// failures come back inside the report; the request itself still succeeds.
async fn pull_performance<P, R>(
    State(state): State<AppState<P, R>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError>
where
    P: PerformanceSource,
    R: RecordStore,
{
    let request = parse_pull_request(&body)?;
    tracing::info!(
        accounts = request.customer_ids.len(),
        range = ?request.range,
        "pull requested"
    );

    let report = state.sync.run(&request.customer_ids, &request.range).await?;

    Ok(Json(json!({
        "success": true,
        "result": report,
    })))
}

async fn data_status<P, R>(
    State(state): State<AppState<P, R>>,
) -> Result<Json<Value>, ApiError>
where
    P: PerformanceSource,
    R: RecordStore,
{
    let counts = state.store.table_counts().await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "campaigns": counts.campaigns,
            "adGroups": counts.ad_groups,
            "keywords": counts.keywords,
            "ads": counts.ads,
            "lastUpdated": Utc::now().to_rfc3339(),
        },
    })))
}

fn parse_pull_request(body: &Value) -> Result<PullRequest, ApiError> {
    let ids = body
        .get("customerIds")
        .and_then(Value::as_array)
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest("customerIds is required and must be a non-empty array".into())
        })?;

    let customer_ids = ids
        .iter()
        .map(|id| {
            id.as_str().map(str::to_string).ok_or_else(|| {
                ApiError::BadRequest("customerIds entries must be strings".into())
            })
        })
        .collect::<Result<Vec<String>, ApiError>>()?;

    let date_range = body.get("dateRange").ok_or_else(|| {
        ApiError::BadRequest("dateRange with start and end dates is required".into())
    })?;

    let start = parse_date(date_range, "start")?;
    let end = parse_date(date_range, "end")?;
    if start > end {
        return Err(ApiError::BadRequest(
            "dateRange.start must not be after dateRange.end".into(),
        ));
    }

    Ok(PullRequest {
        customer_ids,
        range: DateRange { start, end },
    })
}

fn parse_date(range: &Value, key: &str) -> Result<NaiveDate, ApiError> {
    range
        .get(key)
        .and_then(Value::as_str)
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .ok_or_else(|| {
            ApiError::BadRequest(format!("dateRange.{key} must be a YYYY-MM-DD date"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{DateTime, Duration};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::core::performance::{
        Ad, AdGroup, Campaign, CampaignScore, Keyword, MatchType, Metrics,
        PerformanceThresholds, SourceError, StoreError, StoredRecord, TableCounts,
    };

    struct StubSource {
        connected: bool,
    }

    #[async_trait]
    impl PerformanceSource for StubSource {
        async fn pull_campaigns(
            &self,
            _customer_id: &str,
            _range: &DateRange,
        ) -> Result<Vec<Campaign>, SourceError> {
            Ok(vec![Campaign {
                id: "123".into(),
                name: "Brand".into(),
                status: "ENABLED".into(),
                channel_type: "SEARCH".into(),
                start_date: "2024-01-01".into(),
                end_date: "2024-12-31".into(),
                metrics: Metrics::default(),
                last_updated: Utc::now(),
            }])
        }

        async fn pull_ad_groups(
            &self,
            _customer_id: &str,
            campaign_id: &str,
            _range: &DateRange,
        ) -> Result<Vec<AdGroup>, SourceError> {
            Ok(vec![AdGroup {
                id: "456".into(),
                name: "AG".into(),
                status: "ENABLED".into(),
                campaign_id: campaign_id.into(),
                campaign_name: "Brand".into(),
                metrics: Metrics::default(),
                last_updated: Utc::now(),
            }])
        }

        async fn pull_keywords(
            &self,
            _customer_id: &str,
            ad_group_id: &str,
            _range: &DateRange,
        ) -> Result<Vec<Keyword>, SourceError> {
            Ok(vec![Keyword {
                id: "789".into(),
                text: "running shoes".into(),
                match_type: MatchType::Exact,
                status: "ENABLED".into(),
                ad_group_id: ad_group_id.into(),
                ad_group_name: "AG".into(),
                campaign_id: "123".into(),
                campaign_name: "Brand".into(),
                metrics: Metrics::default(),
                quality_score: 7,
                last_updated: Utc::now(),
            }])
        }

        async fn pull_ads(
            &self,
            _customer_id: &str,
            ad_group_id: &str,
            _range: &DateRange,
        ) -> Result<Vec<Ad>, SourceError> {
            Ok(vec![Ad {
                id: "111".into(),
                headlines: "[]".into(),
                descriptions: "[]".into(),
                path1: String::new(),
                path2: String::new(),
                final_urls: "[]".into(),
                ad_group_id: ad_group_id.into(),
                ad_group_name: "AG".into(),
                campaign_id: "123".into(),
                campaign_name: "Brand".into(),
                metrics: Metrics::default(),
                last_updated: Utc::now(),
            }])
        }

        async fn test_connection(&self) -> bool {
            self.connected
        }
    }

    struct StubStore {
        connected: bool,
    }

    impl StubStore {
        fn echo<T>(records: &[T]) -> Result<Vec<StoredRecord>, StoreError> {
            Ok(records
                .iter()
                .enumerate()
                .map(|(i, _)| StoredRecord {
                    id: format!("rec{i}"),
                    fields: Value::Null,
                })
                .collect())
        }
    }

    #[async_trait]
    impl RecordStore for StubStore {
        async fn create_campaigns(
            &self,
            records: &[Campaign],
        ) -> Result<Vec<StoredRecord>, StoreError> {
            Self::echo(records)
        }

        async fn create_ad_groups(
            &self,
            records: &[AdGroup],
        ) -> Result<Vec<StoredRecord>, StoreError> {
            Self::echo(records)
        }

        async fn create_keywords(
            &self,
            records: &[Keyword],
        ) -> Result<Vec<StoredRecord>, StoreError> {
            Self::echo(records)
        }

        async fn create_ads(&self, records: &[Ad]) -> Result<Vec<StoredRecord>, StoreError> {
            Self::echo(records)
        }

        async fn test_connection(&self) -> bool {
            self.connected
        }

        async fn high_performers(
            &self,
            _thresholds: &PerformanceThresholds,
        ) -> Result<Vec<StoredRecord>, StoreError> {
            Ok(Vec::new())
        }

        async fn update_performance_scores(
            &self,
            _scores: &[CampaignScore],
        ) -> Result<Vec<StoredRecord>, StoreError> {
            Ok(Vec::new())
        }

        async fn table_counts(&self) -> Result<TableCounts, StoreError> {
            Ok(TableCounts {
                campaigns: 1,
                ad_groups: 1,
                keywords: 1,
                ads: 1,
            })
        }

        async fn latest_campaign_update(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
            Ok(Some(Utc::now() - Duration::days(2)))
        }
    }

    fn test_config() -> Config {
        let env = HashMap::from([
            ("GOOGLE_ADS_DEVELOPER_TOKEN", "dev-token"),
            ("GOOGLE_ADS_CLIENT_ID", "client-id"),
            ("GOOGLE_ADS_CLIENT_SECRET", "client-secret"),
            ("GOOGLE_ADS_CUSTOMER_ID", "1234567890"),
            ("AIRTABLE_API_KEY", "key"),
            ("AIRTABLE_BASE_ID", "appBase"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
        ]);
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap()
    }

    fn test_router(source_up: bool, store_up: bool) -> Router {
        let state = AppState::new(
            Arc::new(StubSource {
                connected: source_up,
            }),
            Arc::new(StubStore {
                connected: store_up,
            }),
            Arc::new(test_config()),
        );
        build_router(state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, payload: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn pull_request_parses_ids_and_dates() {
        let request = parse_pull_request(&json!({
            "customerIds": ["123", "456"],
            "dateRange": { "start": "2024-01-01", "end": "2024-01-31" },
        }))
        .unwrap();

        assert_eq!(request.customer_ids, vec!["123", "456"]);
        assert_eq!(
            request.range.start,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(
            request.range.end,
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
        );
    }

    #[test]
    fn pull_request_rejects_missing_or_empty_ids() {
        let missing = parse_pull_request(&json!({
            "dateRange": { "start": "2024-01-01", "end": "2024-01-31" },
        }));
        assert!(missing.is_err());

        let empty = parse_pull_request(&json!({
            "customerIds": [],
            "dateRange": { "start": "2024-01-01", "end": "2024-01-31" },
        }));
        assert!(empty.is_err());

        let not_an_array = parse_pull_request(&json!({
            "customerIds": "123",
            "dateRange": { "start": "2024-01-01", "end": "2024-01-31" },
        }));
        assert!(not_an_array.is_err());
    }

    #[test]
    fn pull_request_rejects_bad_dates() {
        let malformed = parse_pull_request(&json!({
            "customerIds": ["123"],
            "dateRange": { "start": "01/01/2024", "end": "2024-01-31" },
        }));
        assert!(malformed.is_err());

        let inverted = parse_pull_request(&json!({
            "customerIds": ["123"],
            "dateRange": { "start": "2024-02-01", "end": "2024-01-01" },
        }));
        assert!(inverted.is_err());

        let missing_end = parse_pull_request(&json!({
            "customerIds": ["123"],
            "dateRange": { "start": "2024-01-01" },
        }));
        assert!(missing_end.is_err());
    }

    #[tokio::test]
    async fn pull_endpoint_returns_the_sync_report() {
        let response = test_router(true, true)
            .oneshot(post_json(
                "/data/pull-performance",
                json!({
                    "customerIds": ["1234567890"],
                    "dateRange": { "start": "2024-01-01", "end": "2024-01-01" },
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["result"]["campaigns"], 1);
        assert_eq!(body["result"]["adGroups"], 1);
        assert_eq!(body["result"]["keywords"], 1);
        assert_eq!(body["result"]["ads"], 1);
        assert_eq!(body["result"]["failures"], json!([]));
    }

    #[tokio::test]
    async fn pull_endpoint_rejects_invalid_bodies() {
        let response = test_router(true, true)
            .oneshot(post_json(
                "/data/pull-performance",
                json!({ "customerIds": [] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn status_endpoint_reports_table_counts() {
        let response = test_router(true, true)
            .oneshot(get_request("/data/status"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["campaigns"], 1);
        assert_eq!(body["data"]["adGroups"], 1);
    }

    #[tokio::test]
    async fn root_lists_the_available_endpoints() {
        let response = test_router(true, true)
            .oneshot(get_request("/"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["name"], "ads-airtable-sync");
    }

    #[tokio::test]
    async fn health_reports_connected_services() {
        let response = test_router(true, true)
            .oneshot(get_request("/system/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["services"]["googleAds"]["status"], "connected");
        assert_eq!(body["services"]["googleAds"]["customerId"], "1234567890");
        assert_eq!(body["services"]["airtable"]["baseId"], "appBase");
        assert_eq!(body["services"]["claude"]["hasApiKey"], true);
    }

    #[tokio::test]
    async fn health_is_unhealthy_when_a_provider_is_down() {
        let response = test_router(false, true)
            .oneshot(get_request("/system/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["services"]["googleAds"]["status"], "error");
    }

    #[tokio::test]
    async fn progress_reports_counts_and_recency() {
        let response = test_router(true, true)
            .oneshot(get_request("/system/progress"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["services"]["googleAds"]["status"], "ok");
        assert_eq!(body["services"]["airtable"]["status"], "ok");
        assert_eq!(body["airtable"]["counts"]["campaigns"], 1);
        assert_eq!(body["airtable"]["recencyDays"], 2);
    }

    #[tokio::test]
    async fn progress_is_multi_status_when_the_store_is_down() {
        let response = test_router(true, false)
            .oneshot(get_request("/system/progress"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::MULTI_STATUS);
        let body = body_json(response).await;
        assert_eq!(body["services"]["airtable"]["status"], "error");
        assert_eq!(body["airtable"]["recencyDays"], Value::Null);
    }

    #[tokio::test]
    async fn test_connections_reports_each_probe() {
        let response = test_router(true, false)
            .oneshot(get_request("/system/test-connections"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["results"]["googleAds"], true);
        assert_eq!(body["results"]["airtable"], false);
    }
}
