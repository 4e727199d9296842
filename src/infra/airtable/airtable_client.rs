// Airtable REST client implementing the `RecordStore` port.
//
// Each entity type has a fixed mapping from domain fields to named columns
// ("Campaign ID", "Quality Score", ...). Writes go out in chunks of 10
// records, the API's batch cap. Every outbound request claims exactly one
// unit of the 1-minute rate-limit window, so a chunked batch claims one
// unit per chunk, not one per call.
//
// Creates are append-only. There is no upsert-by-key: pulling the same date
// range twice produces duplicate rows, which is the documented behavior of
// this pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Duration;

use crate::config::AirtableConfig;
use crate::core::performance::{
    Ad, AdGroup, Campaign, CampaignScore, Keyword, PerformanceThresholds, RecordStore, StoreError,
    StoredRecord, TableCounts,
};
use crate::infra::rate_limit::RateLimiter;

const API_BASE_URL: &str = "https://api.airtable.com/v0";
const MINUTE: Duration = Duration::from_secs(60);

/// Airtable caps create/update batches at this many records per request.
const BATCH_SIZE: usize = 10;

#[derive(Debug, Default, Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    records: Vec<ApiRecord>,
}

#[derive(Debug, Deserialize)]
struct ApiRecord {
    id: String,
    #[serde(default)]
    fields: Value,
}

impl From<ApiRecord> for StoredRecord {
    fn from(record: ApiRecord) -> Self {
        StoredRecord {
            id: record.id,
            fields: record.fields,
        }
    }
}

pub struct AirtableApiClient {
    http: Client,
    base_url: String,
    base_id: String,
    limiter: RateLimiter,
}

impl AirtableApiClient {
    pub fn new(config: AirtableConfig) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| StoreError::Write(e.to_string()))?,
        );

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Write(e.to_string()))?;

        Ok(Self {
            http,
            base_url: API_BASE_URL.to_string(),
            base_id: config.base_id,
            limiter: RateLimiter::new(config.rate_limit, MINUTE),
        })
    }

    #[cfg(test)]
    fn with_base_url(config: AirtableConfig, base_url: String) -> Result<Self, StoreError> {
        let mut client = Self::new(config)?;
        client.base_url = base_url;
        Ok(client)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.base_id, table)
    }

    /// Create rows in chunks of `BATCH_SIZE`, claiming one unit of quota
    /// per chunk. Any failed chunk fails the whole batch; there is no
    /// partial-row retry.
    async fn create_rows(
        &self,
        table: &str,
        fields: Vec<Value>,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let url = self.table_url(table);
        let mut created = Vec::with_capacity(fields.len());

        for chunk in fields.chunks(BATCH_SIZE) {
            self.limiter.acquire().await;
            let records: Vec<Value> = chunk.iter().map(|f| json!({ "fields": f })).collect();
            let response = self
                .http
                .post(&url)
                .json(&json!({ "records": records }))
                .send()
                .await
                .map_err(|e| StoreError::Write(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(StoreError::Write(format!(
                    "{table} create returned {status}: {text}"
                )));
            }

            let page: RecordsResponse = response
                .json()
                .await
                .map_err(|e| StoreError::Write(e.to_string()))?;
            created.extend(page.records.into_iter().map(StoredRecord::from));
        }

        Ok(created)
    }

    async fn select(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<StoredRecord>, StoreError> {
        self.limiter.acquire().await;
        let response = self
            .http
            .request(Method::GET, self.table_url(table))
            .query(params)
            .send()
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Read(format!(
                "{table} select returned {status}: {text}"
            )));
        }

        let page: RecordsResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;
        Ok(page.records.into_iter().map(StoredRecord::from).collect())
    }

    async fn one_page_count(&self, table: &str) -> Result<usize, StoreError> {
        // One page only: the count is a presence indicator, not a total.
        let records = self
            .select(table, &[("maxRecords", "1".to_string())])
            .await?;
        Ok(records.len())
    }
}

#[async_trait]
impl RecordStore for AirtableApiClient {
    async fn create_campaigns(
        &self,
        records: &[Campaign],
    ) -> Result<Vec<StoredRecord>, StoreError> {
        tracing::info!(count = records.len(), "creating campaigns in Airtable");

        let fields = records.iter().map(campaign_fields).collect();
        let created = self.create_rows("Campaigns", fields).await?;

        tracing::info!(count = created.len(), "created campaigns");
        Ok(created)
    }

    async fn create_ad_groups(
        &self,
        records: &[AdGroup],
    ) -> Result<Vec<StoredRecord>, StoreError> {
        tracing::info!(count = records.len(), "creating ad groups in Airtable");

        let fields = records.iter().map(ad_group_fields).collect();
        let created = self.create_rows("Ad Groups", fields).await?;

        tracing::info!(count = created.len(), "created ad groups");
        Ok(created)
    }

    async fn create_keywords(
        &self,
        records: &[Keyword],
    ) -> Result<Vec<StoredRecord>, StoreError> {
        tracing::info!(count = records.len(), "creating keywords in Airtable");

        let fields = records.iter().map(keyword_fields).collect();
        let created = self.create_rows("Keywords", fields).await?;

        tracing::info!(count = created.len(), "created keywords");
        Ok(created)
    }

    async fn create_ads(&self, records: &[Ad]) -> Result<Vec<StoredRecord>, StoreError> {
        tracing::info!(count = records.len(), "creating ads in Airtable");

        let fields = records.iter().map(ad_fields).collect();
        let created = self.create_rows("Ads", fields).await?;

        tracing::info!(count = created.len(), "created ads");
        Ok(created)
    }

    async fn test_connection(&self) -> bool {
        match self.one_page_count("Campaigns").await {
            Ok(_) => true,
            Err(err) => {
                tracing::error!("Airtable connection test failed: {err}");
                false
            }
        }
    }

    async fn high_performers(
        &self,
        thresholds: &PerformanceThresholds,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        tracing::info!(?thresholds, "fetching high performers from Airtable");

        let records = self
            .select(
                "Campaigns",
                &[("filterByFormula", high_performer_formula(thresholds))],
            )
            .await?;

        tracing::info!(count = records.len(), "found high performers");
        Ok(records)
    }

    async fn update_performance_scores(
        &self,
        scores: &[CampaignScore],
    ) -> Result<Vec<StoredRecord>, StoreError> {
        tracing::info!(count = scores.len(), "updating performance scores");

        let url = self.table_url("Campaigns");
        let now = Utc::now();
        let mut updated = Vec::with_capacity(scores.len());

        for chunk in scores.chunks(BATCH_SIZE) {
            self.limiter.acquire().await;
            let records: Vec<Value> = chunk
                .iter()
                .map(|score| {
                    json!({
                        "id": score.record_id,
                        "fields": score_fields(score, now),
                    })
                })
                .collect();

            let response = self
                .http
                .patch(&url)
                .json(&json!({ "records": records }))
                .send()
                .await
                .map_err(|e| StoreError::Write(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(StoreError::Write(format!(
                    "score update returned {status}: {text}"
                )));
            }

            let page: RecordsResponse = response
                .json()
                .await
                .map_err(|e| StoreError::Write(e.to_string()))?;
            updated.extend(page.records.into_iter().map(StoredRecord::from));
        }

        tracing::info!(count = updated.len(), "updated performance scores");
        Ok(updated)
    }

    async fn table_counts(&self) -> Result<TableCounts, StoreError> {
        Ok(TableCounts {
            campaigns: self.one_page_count("Campaigns").await?,
            ad_groups: self.one_page_count("Ad Groups").await?,
            keywords: self.one_page_count("Keywords").await?,
            ads: self.one_page_count("Ads").await?,
        })
    }

    async fn latest_campaign_update(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let records = self
            .select(
                "Campaigns",
                &[
                    ("maxRecords", "1".to_string()),
                    ("fields[]", "Last Updated".to_string()),
                    ("sort[0][field]", "Last Updated".to_string()),
                    ("sort[0][direction]", "desc".to_string()),
                ],
            )
            .await?;

        let latest = records
            .first()
            .and_then(|record| record.fields.get("Last Updated"))
            .and_then(|value| value.as_str())
            .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(latest)
    }
}

fn campaign_fields(campaign: &Campaign) -> Value {
    json!({
        "Campaign ID": campaign.id,
        "Campaign Name": campaign.name,
        "Status": campaign.status,
        "Channel Type": campaign.channel_type,
        "Start Date": campaign.start_date,
        "End Date": campaign.end_date,
        "Impressions": campaign.metrics.impressions,
        "Clicks": campaign.metrics.clicks,
        "CTR": campaign.metrics.ctr,
        "Cost": campaign.metrics.cost,
        "Conversions": campaign.metrics.conversions,
        "Conversion Rate": campaign.metrics.conversion_rate,
        "CPA": campaign.metrics.cpa,
        "ROAS": campaign.metrics.roas,
        "Last Updated": campaign.last_updated.to_rfc3339(),
    })
}

fn ad_group_fields(ad_group: &AdGroup) -> Value {
    json!({
        "Ad Group ID": ad_group.id,
        "Ad Group Name": ad_group.name,
        "Status": ad_group.status,
        "Campaign ID": ad_group.campaign_id,
        "Campaign Name": ad_group.campaign_name,
        "Impressions": ad_group.metrics.impressions,
        "Clicks": ad_group.metrics.clicks,
        "CTR": ad_group.metrics.ctr,
        "Cost": ad_group.metrics.cost,
        "Conversions": ad_group.metrics.conversions,
        "Conversion Rate": ad_group.metrics.conversion_rate,
        "CPA": ad_group.metrics.cpa,
        "ROAS": ad_group.metrics.roas,
        "Last Updated": ad_group.last_updated.to_rfc3339(),
    })
}

fn keyword_fields(keyword: &Keyword) -> Value {
    json!({
        "Keyword ID": keyword.id,
        "Keyword Text": keyword.text,
        "Match Type": keyword.match_type.as_str(),
        "Status": keyword.status,
        "Ad Group ID": keyword.ad_group_id,
        "Ad Group Name": keyword.ad_group_name,
        "Campaign ID": keyword.campaign_id,
        "Campaign Name": keyword.campaign_name,
        "Impressions": keyword.metrics.impressions,
        "Clicks": keyword.metrics.clicks,
        "CTR": keyword.metrics.ctr,
        "Cost": keyword.metrics.cost,
        "Conversions": keyword.metrics.conversions,
        "Conversion Rate": keyword.metrics.conversion_rate,
        "CPA": keyword.metrics.cpa,
        "ROAS": keyword.metrics.roas,
        "Quality Score": keyword.quality_score,
        "Last Updated": keyword.last_updated.to_rfc3339(),
    })
}

fn ad_fields(ad: &Ad) -> Value {
    json!({
        "Ad ID": ad.id,
        "Headlines": ad.headlines,
        "Descriptions": ad.descriptions,
        "Path1": ad.path1,
        "Path2": ad.path2,
        "Final URLs": ad.final_urls,
        "Ad Group ID": ad.ad_group_id,
        "Ad Group Name": ad.ad_group_name,
        "Campaign ID": ad.campaign_id,
        "Campaign Name": ad.campaign_name,
        "Impressions": ad.metrics.impressions,
        "Clicks": ad.metrics.clicks,
        "CTR": ad.metrics.ctr,
        "Cost": ad.metrics.cost,
        "Conversions": ad.metrics.conversions,
        "Conversion Rate": ad.metrics.conversion_rate,
        "CPA": ad.metrics.cpa,
        "ROAS": ad.metrics.roas,
        "Last Updated": ad.last_updated.to_rfc3339(),
    })
}

fn score_fields(score: &CampaignScore, now: DateTime<Utc>) -> Value {
    json!({
        "Performance Score": score.performance_score,
        "Priority": score.priority,
        "Meets Thresholds": score.meets_thresholds,
        "Analysis Date": now.to_rfc3339(),
    })
}

/// Every clause must hold: score, CTR, conversion rate, ROAS, and the
/// pre-computed Meets Thresholds flag.
fn high_performer_formula(thresholds: &PerformanceThresholds) -> String {
    format!(
        "AND({{Performance Score}} >= {score}, {{CTR}} >= {ctr}, \
         {{Conversion Rate}} >= {rate}, {{ROAS}} >= {roas}, \
         {{Meets Thresholds}} = TRUE())",
        score = thresholds.performance_score,
        ctr = thresholds.ctr,
        rate = thresholds.conversion_rate,
        roas = thresholds.roas,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::performance::{MatchType, Metrics};
    use axum::routing::post;
    use axum::Router;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn metrics() -> Metrics {
        Metrics {
            impressions: 1000,
            clicks: 100,
            ctr: 0.1,
            cost: 25.0,
            conversions: 10.0,
            conversion_rate: 0.1,
            cpa: 2.5,
            roas: 5.5,
        }
    }

    fn last_updated() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn campaign_fields_map_to_named_columns() {
        let fields = campaign_fields(&Campaign {
            id: "123".into(),
            name: "Brand".into(),
            status: "ENABLED".into(),
            channel_type: "SEARCH".into(),
            start_date: "2024-01-01".into(),
            end_date: "2024-12-31".into(),
            metrics: metrics(),
            last_updated: last_updated(),
        });

        assert_eq!(fields["Campaign ID"], "123");
        assert_eq!(fields["Campaign Name"], "Brand");
        assert_eq!(fields["Channel Type"], "SEARCH");
        assert_eq!(fields["Start Date"], "2024-01-01");
        assert_eq!(fields["Impressions"], 1000);
        assert_eq!(fields["Clicks"], 100);
        assert_eq!(fields["CTR"], 0.1);
        assert_eq!(fields["Cost"], 25.0);
        assert_eq!(fields["CPA"], 2.5);
        assert_eq!(fields["ROAS"], 5.5);
        assert_eq!(fields["Last Updated"], "2024-06-01T12:00:00+00:00");
    }

    #[test]
    fn ad_group_fields_carry_parent_campaign_columns() {
        let fields = ad_group_fields(&AdGroup {
            id: "456".into(),
            name: "AG".into(),
            status: "ENABLED".into(),
            campaign_id: "123".into(),
            campaign_name: "Brand".into(),
            metrics: metrics(),
            last_updated: last_updated(),
        });

        assert_eq!(fields["Ad Group ID"], "456");
        assert_eq!(fields["Campaign ID"], "123");
        assert_eq!(fields["Campaign Name"], "Brand");
    }

    #[test]
    fn keyword_fields_preserve_quality_score_as_integer() {
        let fields = keyword_fields(&Keyword {
            id: "789".into(),
            text: "running shoes".into(),
            match_type: MatchType::Phrase,
            status: "ENABLED".into(),
            ad_group_id: "456".into(),
            ad_group_name: "AG".into(),
            campaign_id: "123".into(),
            campaign_name: "Brand".into(),
            metrics: metrics(),
            quality_score: 8,
            last_updated: last_updated(),
        });

        assert_eq!(fields["Keyword ID"], "789");
        assert_eq!(fields["Keyword Text"], "running shoes");
        assert_eq!(fields["Match Type"], "PHRASE");
        assert_eq!(fields["Quality Score"], 8);
    }

    #[test]
    fn ad_fields_keep_serialized_asset_lists() {
        let fields = ad_fields(&Ad {
            id: "111".into(),
            headlines: r#"[{"text":"H1"}]"#.into(),
            descriptions: "[]".into(),
            path1: "p1".into(),
            path2: "p2".into(),
            final_urls: r#"["https://x.com"]"#.into(),
            ad_group_id: "456".into(),
            ad_group_name: "AG".into(),
            campaign_id: "123".into(),
            campaign_name: "Brand".into(),
            metrics: metrics(),
            last_updated: last_updated(),
        });

        assert_eq!(fields["Ad ID"], "111");
        assert_eq!(fields["Headlines"], r#"[{"text":"H1"}]"#);
        assert_eq!(fields["Final URLs"], r#"["https://x.com"]"#);
        assert_eq!(fields["Path1"], "p1");
    }

    #[test]
    fn score_fields_stamp_the_analysis_date() {
        let fields = score_fields(
            &CampaignScore {
                record_id: "recABC".into(),
                performance_score: 9.0,
                priority: "High".into(),
                meets_thresholds: true,
            },
            last_updated(),
        );

        assert_eq!(fields["Performance Score"], 9.0);
        assert_eq!(fields["Priority"], "High");
        assert_eq!(fields["Meets Thresholds"], true);
        assert_eq!(fields["Analysis Date"], "2024-06-01T12:00:00+00:00");
    }

    #[test]
    fn high_performer_formula_ands_every_threshold() {
        let formula = high_performer_formula(&PerformanceThresholds::default());
        assert!(formula.starts_with("AND("));
        assert!(formula.contains("{Performance Score} >= 8"));
        assert!(formula.contains("{CTR} >= 5"));
        assert!(formula.contains("{Conversion Rate} >= 7"));
        assert!(formula.contains("{ROAS} >= 4"));
        assert!(formula.contains("{Meets Thresholds} = TRUE()"));
    }

    #[test]
    fn records_response_maps_to_stored_records() {
        let page: RecordsResponse = serde_json::from_value(serde_json::json!({
            "records": [
                { "id": "rec1", "fields": { "Campaign ID": "123" } },
                { "id": "rec2" }
            ]
        }))
        .unwrap();

        let stored: Vec<StoredRecord> = page.records.into_iter().map(StoredRecord::from).collect();
        assert_eq!(stored[0].id, "rec1");
        assert_eq!(stored[0].fields["Campaign ID"], "123");
        assert_eq!(stored[1].id, "rec2");
    }

    /// Local stand-in for the records API. Write handlers echo one record
    /// per posted record; reads return a single row. Every hit bumps the
    /// shared counter.
    async fn spawn_records_api() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));

        fn echo_records(hits: Arc<AtomicUsize>, body: Value) -> axum::Json<Value> {
            hits.fetch_add(1, Ordering::SeqCst);
            let count = body["records"].as_array().map(Vec::len).unwrap_or(0);
            let records: Vec<Value> = (0..count)
                .map(|i| json!({ "id": format!("rec{i}"), "fields": {} }))
                .collect();
            axum::Json(json!({ "records": records }))
        }

        let post_hits = hits.clone();
        let patch_hits = hits.clone();
        let get_hits = hits.clone();
        let app = Router::new().route(
            "/{base}/{table}",
            post(move |axum::Json(body): axum::Json<Value>| {
                let hits = post_hits.clone();
                async move { echo_records(hits, body) }
            })
            .patch(move |axum::Json(body): axum::Json<Value>| {
                let hits = patch_hits.clone();
                async move { echo_records(hits, body) }
            })
            .get(move || {
                let hits = get_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    axum::Json(json!({
                        "records": [{ "id": "rec0", "fields": {} }]
                    }))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), hits)
    }

    fn test_client(base_url: String) -> AirtableApiClient {
        AirtableApiClient::with_base_url(
            AirtableConfig {
                api_key: "key".into(),
                base_id: "appBase".into(),
                rate_limit: 60,
            },
            base_url,
        )
        .unwrap()
    }

    fn campaigns(count: usize) -> Vec<Campaign> {
        (0..count)
            .map(|i| Campaign {
                id: format!("{i}"),
                name: format!("Campaign {i}"),
                status: "ENABLED".into(),
                channel_type: "SEARCH".into(),
                start_date: "2024-01-01".into(),
                end_date: "2024-12-31".into(),
                metrics: metrics(),
                last_updated: last_updated(),
            })
            .collect()
    }

    #[tokio::test]
    async fn each_create_chunk_claims_one_quota_unit() {
        let (base_url, hits) = spawn_records_api().await;
        let client = test_client(base_url);

        // 25 records split into chunks of 10 is three requests.
        let created = client.create_campaigns(&campaigns(25)).await.unwrap();

        assert_eq!(created.len(), 25);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(client.limiter.used().await, 3);
    }

    #[tokio::test]
    async fn each_score_update_chunk_claims_one_quota_unit() {
        let (base_url, hits) = spawn_records_api().await;
        let client = test_client(base_url);

        let scores: Vec<CampaignScore> = (0..12)
            .map(|i| CampaignScore {
                record_id: format!("rec{i}"),
                performance_score: 9.0,
                priority: "High".into(),
                meets_thresholds: true,
            })
            .collect();
        let updated = client.update_performance_scores(&scores).await.unwrap();

        assert_eq!(updated.len(), 12);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(client.limiter.used().await, 2);
    }

    #[tokio::test]
    async fn table_counts_claims_one_quota_unit_per_table() {
        let (base_url, hits) = spawn_records_api().await;
        let client = test_client(base_url);

        let counts = client.table_counts().await.unwrap();

        assert_eq!(counts.campaigns, 1);
        assert_eq!(counts.ads, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert_eq!(client.limiter.used().await, 4);
    }
}
