// Google Ads REST client implementing the `PerformanceSource` port.
//
// Authentication is the OAuth refresh-token grant: the stored refresh token
// is exchanged for a short-lived access token which is cached until shortly
// before expiry. Queries go through the `googleAds:search` endpoint and page
// via `nextPageToken` until the response runs dry.
//
// Every pull is restricted to ENABLED entities. Paused and removed entities
// are excluded by policy, not oversight.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::GoogleAdsConfig;
use crate::core::performance::{
    normalize, raw::RawRow, Ad, AdGroup, Campaign, DateRange, Keyword, PerformanceSource,
    SourceError,
};
use crate::infra::rate_limit::RateLimiter;

const API_BASE_URL: &str = "https://googleads.googleapis.com/v17";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Response from Google's OAuth token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Cached access token with expiration.
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// One page of query results.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SearchResponse {
    results: Vec<RawRow>,
    next_page_token: Option<String>,
}

pub struct GoogleAdsApiClient {
    http: Client,
    config: GoogleAdsConfig,
    limiter: RateLimiter,
    cached_token: RwLock<Option<CachedToken>>,
    base_url: String,
    token_url: String,
}

impl GoogleAdsApiClient {
    pub fn new(config: GoogleAdsConfig) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "developer-token",
            HeaderValue::from_str(&config.developer_token)
                .map_err(|e| SourceError::Auth(e.to_string()))?,
        );
        if let Some(mcc) = &config.mcc_customer_id {
            headers.insert(
                "login-customer-id",
                HeaderValue::from_str(mcc).map_err(|e| SourceError::Auth(e.to_string()))?,
            );
        }

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| SourceError::Auth(e.to_string()))?;

        let limiter = RateLimiter::new(config.rate_limit, DAY);

        Ok(Self {
            http,
            config,
            limiter,
            cached_token: RwLock::new(None),
            base_url: API_BASE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
        })
    }

    #[cfg(test)]
    fn with_urls(
        config: GoogleAdsConfig,
        base_url: String,
        token_url: String,
    ) -> Result<Self, SourceError> {
        let mut client = Self::new(config)?;
        client.base_url = base_url;
        client.token_url = token_url;
        Ok(client)
    }

    /// Gets a valid access token, refreshing if necessary.
    async fn access_token(&self) -> Result<String, SourceError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + Duration::from_secs(60) {
                    return Ok(token.token.clone());
                }
            }
        }

        let refresh_token = self
            .config
            .refresh_token
            .as_deref()
            .ok_or_else(|| SourceError::Auth("no refresh token configured".to_string()))?;

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SourceError::Auth(format!(
                "token exchange failed ({status}): {text}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Auth(e.to_string()))?;

        let expires_at = SystemTime::now() + Duration::from_secs(token.expires_in);
        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(CachedToken {
                token: token.access_token.clone(),
                expires_at,
            });
        }

        Ok(token.access_token)
    }

    /// Run one query against an account, following `nextPageToken` until the
    /// full result set is collected.
    async fn search(&self, customer_id: &str, query: &str) -> Result<Vec<RawRow>, SourceError> {
        let token = self.access_token().await?;
        let url = format!("{}/customers/{}/googleAds:search", self.base_url, customer_id);

        let mut rows = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut body = serde_json::json!({ "query": query });
            if let Some(token) = &page_token {
                body["pageToken"] = serde_json::json!(token);
            }

            let response = self
                .http
                .post(&url)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await
                .map_err(|e| SourceError::Query(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(SourceError::Query(format!(
                    "search returned {status}: {text}"
                )));
            }

            let page: SearchResponse = response
                .json()
                .await
                .map_err(|e| SourceError::Query(e.to_string()))?;

            rows.extend(page.results);
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(rows)
    }
}

#[async_trait]
impl PerformanceSource for GoogleAdsApiClient {
    async fn pull_campaigns(
        &self,
        customer_id: &str,
        range: &DateRange,
    ) -> Result<Vec<Campaign>, SourceError> {
        self.limiter.acquire().await;
        tracing::info!(customer_id, ?range, "pulling campaign data");

        let rows = self.search(customer_id, &campaign_query(range)).await?;
        let campaigns = normalize::campaigns_from_rows(rows);

        tracing::info!(customer_id, count = campaigns.len(), "pulled campaigns");
        Ok(campaigns)
    }

    async fn pull_ad_groups(
        &self,
        customer_id: &str,
        campaign_id: &str,
        range: &DateRange,
    ) -> Result<Vec<AdGroup>, SourceError> {
        self.limiter.acquire().await;
        tracing::info!(customer_id, campaign_id, ?range, "pulling ad group data");

        let rows = self
            .search(customer_id, &ad_group_query(campaign_id, range))
            .await?;
        let ad_groups = normalize::ad_groups_from_rows(rows);

        tracing::info!(customer_id, campaign_id, count = ad_groups.len(), "pulled ad groups");
        Ok(ad_groups)
    }

    async fn pull_keywords(
        &self,
        customer_id: &str,
        ad_group_id: &str,
        range: &DateRange,
    ) -> Result<Vec<Keyword>, SourceError> {
        self.limiter.acquire().await;
        tracing::info!(customer_id, ad_group_id, ?range, "pulling keyword data");

        let rows = self
            .search(customer_id, &keyword_query(ad_group_id, range))
            .await?;
        let keywords = normalize::keywords_from_rows(rows);

        tracing::info!(customer_id, ad_group_id, count = keywords.len(), "pulled keywords");
        Ok(keywords)
    }

    async fn pull_ads(
        &self,
        customer_id: &str,
        ad_group_id: &str,
        range: &DateRange,
    ) -> Result<Vec<Ad>, SourceError> {
        self.limiter.acquire().await;
        tracing::info!(customer_id, ad_group_id, ?range, "pulling ad data");

        let rows = self
            .search(customer_id, &ad_query(ad_group_id, range))
            .await?;
        let ads = normalize::ads_from_rows(rows);

        tracing::info!(customer_id, ad_group_id, count = ads.len(), "pulled ads");
        Ok(ads)
    }

    async fn test_connection(&self) -> bool {
        match self.access_token().await {
            Ok(_) => true,
            Err(err) => {
                tracing::error!("Google Ads connection test failed: {err}");
                false
            }
        }
    }
}

fn campaign_query(range: &DateRange) -> String {
    format!(
        "SELECT \
           campaign.id, \
           campaign.name, \
           campaign.status, \
           campaign.advertising_channel_type, \
           campaign.start_date, \
           campaign.end_date, \
           metrics.impressions, \
           metrics.clicks, \
           metrics.ctr, \
           metrics.cost_micros, \
           metrics.conversions, \
           metrics.conversion_rate, \
           metrics.cost_per_conversion, \
           metrics.value_per_conversion \
         FROM campaign \
         WHERE segments.date BETWEEN '{start}' AND '{end}' \
         AND campaign.status = 'ENABLED'",
        start = range.start,
        end = range.end,
    )
}

fn ad_group_query(campaign_id: &str, range: &DateRange) -> String {
    format!(
        "SELECT \
           ad_group.id, \
           ad_group.name, \
           ad_group.status, \
           campaign.id, \
           campaign.name, \
           metrics.impressions, \
           metrics.clicks, \
           metrics.ctr, \
           metrics.cost_micros, \
           metrics.conversions, \
           metrics.conversion_rate, \
           metrics.cost_per_conversion, \
           metrics.value_per_conversion \
         FROM ad_group \
         WHERE segments.date BETWEEN '{start}' AND '{end}' \
         AND ad_group.status = 'ENABLED' \
         AND campaign.id = {campaign_id}",
        start = range.start,
        end = range.end,
    )
}

fn keyword_query(ad_group_id: &str, range: &DateRange) -> String {
    format!(
        "SELECT \
           ad_group_criterion.criterion_id, \
           ad_group_criterion.keyword.text, \
           ad_group_criterion.keyword.match_type, \
           ad_group_criterion.status, \
           ad_group.id, \
           ad_group.name, \
           campaign.id, \
           campaign.name, \
           metrics.impressions, \
           metrics.clicks, \
           metrics.ctr, \
           metrics.cost_micros, \
           metrics.conversions, \
           metrics.conversion_rate, \
           metrics.cost_per_conversion, \
           metrics.value_per_conversion, \
           metrics.quality_score \
         FROM keyword_view \
         WHERE segments.date BETWEEN '{start}' AND '{end}' \
         AND ad_group_criterion.status = 'ENABLED' \
         AND ad_group.id = {ad_group_id}",
        start = range.start,
        end = range.end,
    )
}

fn ad_query(ad_group_id: &str, range: &DateRange) -> String {
    format!(
        "SELECT \
           ad_group_ad.ad.id, \
           ad_group_ad.ad.responsive_search_ad.headlines, \
           ad_group_ad.ad.responsive_search_ad.descriptions, \
           ad_group_ad.ad.responsive_search_ad.path1, \
           ad_group_ad.ad.responsive_search_ad.path2, \
           ad_group_ad.ad.final_urls, \
           ad_group.id, \
           ad_group.name, \
           campaign.id, \
           campaign.name, \
           metrics.impressions, \
           metrics.clicks, \
           metrics.ctr, \
           metrics.cost_micros, \
           metrics.conversions, \
           metrics.conversion_rate, \
           metrics.cost_per_conversion, \
           metrics.value_per_conversion \
         FROM ad_group_ad \
         WHERE segments.date BETWEEN '{start}' AND '{end}' \
         AND ad_group_ad.status = 'ENABLED' \
         AND ad_group.id = {ad_group_id}",
        start = range.start,
        end = range.end,
    )
}
