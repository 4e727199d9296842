// Pull orchestration: campaigns per account, ad groups per campaign, then
// keywords and ads per ad group. Children need their parent's id as a query
// filter, so the stage order is a hard dependency.
//
// Partial failures are data, not exceptions: each failed sub-step becomes a
// `SyncFailure` entry in the report and the run moves on. Only an unusable
// input (zero accounts) errors the whole run.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::core::performance::{DateRange, PerformanceSource, RecordStore};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no customer IDs supplied")]
    NoAccounts,
}

/// Which tier of the pull hierarchy a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStage {
    Campaigns,
    AdGroups,
    Keywords,
    Ads,
}

/// One recorded sub-step failure. `parent_id` is the account for campaign
/// failures, the campaign for ad-group failures, and the ad group for
/// keyword/ad failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub stage: SyncStage,
    pub parent_id: String,
    pub error: String,
}

/// Aggregate outcome of one pull invocation: persisted record counts per
/// entity type plus every recorded failure.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub campaigns: usize,
    pub ad_groups: usize,
    pub keywords: usize,
    pub ads: usize,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    fn record_failure(
        &mut self,
        stage: SyncStage,
        parent_id: &str,
        error: impl std::fmt::Display,
    ) {
        tracing::warn!(?stage, parent_id, %error, "sync sub-step failed");
        self.failures.push(SyncFailure {
            stage,
            parent_id: parent_id.to_string(),
            error: error.to_string(),
        });
    }
}

/// Orchestrates one pull run across accounts.
///
/// Generic over the source and store ports so it can be tested with mock
/// implementations, exactly like the other core services.
pub struct SyncService<P: PerformanceSource, R: RecordStore> {
    source: Arc<P>,
    store: Arc<R>,
}

impl<P: PerformanceSource, R: RecordStore> SyncService<P, R> {
    pub fn new(source: Arc<P>, store: Arc<R>) -> Self {
        Self { source, store }
    }

    /// Run a full pull for the given accounts and date range.
    ///
    /// A failure at any sub-step is recorded in the report and never aborts
    /// sibling work: one account's broken query must not block the others.
    pub async fn run(
        &self,
        customer_ids: &[String],
        range: &DateRange,
    ) -> Result<SyncReport, SyncError> {
        if customer_ids.is_empty() {
            return Err(SyncError::NoAccounts);
        }

        let mut report = SyncReport::default();

        for customer_id in customer_ids {
            tracing::info!(customer_id, ?range, "starting account sync");

            let campaigns = match self.source.pull_campaigns(customer_id, range).await {
                Ok(campaigns) => campaigns,
                Err(err) => {
                    report.record_failure(SyncStage::Campaigns, customer_id, err);
                    continue;
                }
            };

            if campaigns.is_empty() {
                tracing::info!(customer_id, "no enabled campaigns in range");
                continue;
            }

            match self.store.create_campaigns(&campaigns).await {
                Ok(created) => report.campaigns += created.len(),
                Err(err) => {
                    report.record_failure(SyncStage::Campaigns, customer_id, err);
                    // Without persisted campaigns the children would be orphans
                    // of a failed write; skip to the next account.
                    continue;
                }
            }

            for campaign in &campaigns {
                self.sync_campaign_children(customer_id, &campaign.id, range, &mut report)
                    .await;
            }
        }

        tracing::info!(
            campaigns = report.campaigns,
            ad_groups = report.ad_groups,
            keywords = report.keywords,
            ads = report.ads,
            failures = report.failures.len(),
            "sync run finished"
        );

        Ok(report)
    }

    async fn sync_campaign_children(
        &self,
        customer_id: &str,
        campaign_id: &str,
        range: &DateRange,
        report: &mut SyncReport,
    ) {
        let ad_groups = match self
            .source
            .pull_ad_groups(customer_id, campaign_id, range)
            .await
        {
            Ok(ad_groups) => ad_groups,
            Err(err) => {
                report.record_failure(SyncStage::AdGroups, campaign_id, err);
                return;
            }
        };

        if ad_groups.is_empty() {
            return;
        }

        match self.store.create_ad_groups(&ad_groups).await {
            Ok(created) => report.ad_groups += created.len(),
            Err(err) => {
                report.record_failure(SyncStage::AdGroups, campaign_id, err);
                return;
            }
        }

        for ad_group in &ad_groups {
            self.sync_ad_group_children(customer_id, &ad_group.id, range, report)
                .await;
        }
    }

    async fn sync_ad_group_children(
        &self,
        customer_id: &str,
        ad_group_id: &str,
        range: &DateRange,
        report: &mut SyncReport,
    ) {
        // Keywords and ads are independent reads under the same parent; a
        // keyword failure must not block the ads pull.
        match self.source.pull_keywords(customer_id, ad_group_id, range).await {
            Ok(keywords) if keywords.is_empty() => {}
            Ok(keywords) => match self.store.create_keywords(&keywords).await {
                Ok(created) => report.keywords += created.len(),
                Err(err) => report.record_failure(SyncStage::Keywords, ad_group_id, err),
            },
            Err(err) => report.record_failure(SyncStage::Keywords, ad_group_id, err),
        }

        match self.source.pull_ads(customer_id, ad_group_id, range).await {
            Ok(ads) if ads.is_empty() => {}
            Ok(ads) => match self.store.create_ads(&ads).await {
                Ok(created) => report.ads += created.len(),
                Err(err) => report.record_failure(SyncStage::Ads, ad_group_id, err),
            },
            Err(err) => report.record_failure(SyncStage::Ads, ad_group_id, err),
        }
    }
}
