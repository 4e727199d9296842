// Domain models for the performance pipeline.
// Notice how this module has NO HTTP or vendor-specific code (no reqwest,
// no axum imports). The infra layer adapts the real APIs to these types.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inclusive calendar date range used to scope every provider query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }
}

/// The shared block of performance numbers attached to every entity level.
///
/// Monetary fields (`cost`, `cpa`) are plain currency units: the provider's
/// micro-unit integers divided by 1,000,000, exactly once, at normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    pub impressions: i64,
    pub clicks: i64,
    pub ctr: f64,
    pub cost: f64,
    pub conversions: f64,
    pub conversion_rate: f64,
    pub cpa: f64,
    pub roas: f64,
}

/// Keyword match type. The provider documents EXACT/PHRASE/BROAD but can
/// emit other values; parsing is total and falls back to `Unspecified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    Phrase,
    Broad,
    Unspecified,
}

impl MatchType {
    pub fn from_raw(value: &str) -> Self {
        match value {
            "EXACT" => MatchType::Exact,
            "PHRASE" => MatchType::Phrase,
            "BROAD" => MatchType::Broad,
            _ => MatchType::Unspecified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "EXACT",
            MatchType::Phrase => "PHRASE",
            MatchType::Broad => "BROAD",
            MatchType::Unspecified => "UNSPECIFIED",
        }
    }
}

/// One campaign row for a pulled date range.
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub status: String,
    pub channel_type: String,
    pub start_date: String,
    pub end_date: String,
    pub metrics: Metrics,
    pub last_updated: DateTime<Utc>,
}

/// One ad group row. Campaign name is denormalized so store rows are
/// readable without joins.
#[derive(Debug, Clone, PartialEq)]
pub struct AdGroup {
    pub id: String,
    pub name: String,
    pub status: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub metrics: Metrics,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub id: String,
    pub text: String,
    pub match_type: MatchType,
    pub status: String,
    pub ad_group_id: String,
    pub ad_group_name: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub metrics: Metrics,
    pub quality_score: i64,
    pub last_updated: DateTime<Utc>,
}

/// One responsive search ad. Headlines, descriptions and final URLs stay as
/// serialized JSON text so the store column holds the full asset list.
#[derive(Debug, Clone, PartialEq)]
pub struct Ad {
    pub id: String,
    pub headlines: String,
    pub descriptions: String,
    pub path1: String,
    pub path2: String,
    pub final_urls: String,
    pub ad_group_id: String,
    pub ad_group_name: String,
    pub campaign_id: String,
    pub campaign_name: String,
    pub metrics: Metrics,
    pub last_updated: DateTime<Utc>,
}

/// A row as the store returned it after a create/read, keyed by the store's
/// own row identifier.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub fields: serde_json::Value,
}

/// Row counts per entity table, as reported by the progress endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCounts {
    pub campaigns: usize,
    pub ad_groups: usize,
    pub keywords: usize,
    pub ads: usize,
}

/// Minimum values a campaign must meet to count as a high performer.
/// All thresholds must hold together.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceThresholds {
    pub performance_score: f64,
    pub ctr: f64,
    pub conversion_rate: f64,
    pub roas: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            performance_score: 8.0,
            ctr: 5.0,
            conversion_rate: 7.0,
            roas: 4.0,
        }
    }
}

/// Analysis result written back onto a campaign row.
#[derive(Debug, Clone)]
pub struct CampaignScore {
    /// Store row id of the campaign record being scored.
    pub record_id: String,
    pub performance_score: f64,
    pub priority: String,
    pub meets_thresholds: bool,
}

/// Errors raised by the advertising-data side of the pipeline.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Google Ads auth error: {0}")]
    Auth(String),
    #[error("Google Ads query failed: {0}")]
    Query(String),
}

/// Errors raised by the datastore side of the pipeline. A failed batch is
/// failed as a whole; there is no partial-row retry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Airtable write failed: {0}")]
    Write(String),
    #[error("Airtable read failed: {0}")]
    Read(String),
}

/// Port for pulling performance records from the advertising-data provider.
///
/// Every pull is scoped to one account, an inclusive date range, and (below
/// campaign level) a parent entity id. Only ENABLED entities are returned;
/// paused/removed entities are excluded by policy.
#[async_trait]
pub trait PerformanceSource: Send + Sync {
    async fn pull_campaigns(
        &self,
        customer_id: &str,
        range: &DateRange,
    ) -> Result<Vec<Campaign>, SourceError>;

    async fn pull_ad_groups(
        &self,
        customer_id: &str,
        campaign_id: &str,
        range: &DateRange,
    ) -> Result<Vec<AdGroup>, SourceError>;

    async fn pull_keywords(
        &self,
        customer_id: &str,
        ad_group_id: &str,
        range: &DateRange,
    ) -> Result<Vec<Keyword>, SourceError>;

    async fn pull_ads(
        &self,
        customer_id: &str,
        ad_group_id: &str,
        range: &DateRange,
    ) -> Result<Vec<Ad>, SourceError>;

    /// Advisory connectivity probe for health checks. Never errors.
    async fn test_connection(&self) -> bool;
}

/// Port for persisting records into the row/column datastore.
///
/// Creates are append-only: repeated pulls for overlapping ranges produce
/// duplicate rows. That is the documented behavior of this pipeline, not a
/// bug (see DESIGN.md).
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_campaigns(
        &self,
        records: &[Campaign],
    ) -> Result<Vec<StoredRecord>, StoreError>;

    async fn create_ad_groups(&self, records: &[AdGroup])
        -> Result<Vec<StoredRecord>, StoreError>;

    async fn create_keywords(&self, records: &[Keyword])
        -> Result<Vec<StoredRecord>, StoreError>;

    async fn create_ads(&self, records: &[Ad]) -> Result<Vec<StoredRecord>, StoreError>;

    /// Advisory connectivity probe: one-row read, errors swallowed and
    /// logged. Never errors.
    async fn test_connection(&self) -> bool;

    /// Campaign rows whose score and metrics clear every threshold.
    async fn high_performers(
        &self,
        thresholds: &PerformanceThresholds,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// Batch update of score/priority/flag per campaign row, stamped with
    /// the current time.
    async fn update_performance_scores(
        &self,
        scores: &[CampaignScore],
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// Single-page row counts per entity table. Presence indicators, not
    /// exhaustive totals.
    async fn table_counts(&self) -> Result<TableCounts, StoreError>;

    /// Timestamp of the most recently updated campaign row, if any.
    async fn latest_campaign_update(&self) -> Result<Option<DateTime<Utc>>, StoreError>;
}
