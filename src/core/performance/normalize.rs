// Pure mapping from raw provider rows to typed entity records.
//
// These functions are total: a malformed row produces a record full of
// defaults rather than aborting the batch. All numeric parsing goes through
// the helpers in `raw`, so the micro-unit division happens exactly once.

use chrono::Utc;

use super::models::{Ad, AdGroup, Campaign, Keyword, MatchType, Metrics};
use super::raw::{self, RawRow};

fn metrics_from_row(row: &RawRow) -> Metrics {
    let m = row.metrics.clone().unwrap_or_default();
    Metrics {
        impressions: raw::int(&m.impressions),
        clicks: raw::int(&m.clicks),
        ctr: raw::float(&m.ctr),
        cost: raw::micros(&m.cost_micros),
        conversions: raw::float(&m.conversions),
        conversion_rate: raw::float(&m.conversion_rate),
        cpa: raw::micros(&m.cost_per_conversion),
        roas: raw::float(&m.value_per_conversion),
    }
}

pub fn campaigns_from_rows(rows: Vec<RawRow>) -> Vec<Campaign> {
    let now = Utc::now();
    rows.into_iter()
        .map(|row| {
            let c = row.campaign.clone().unwrap_or_default();
            Campaign {
                id: raw::text(&c.id),
                name: raw::string(&c.name),
                status: raw::string(&c.status),
                channel_type: raw::string(&c.advertising_channel_type),
                start_date: raw::string(&c.start_date),
                end_date: raw::string(&c.end_date),
                metrics: metrics_from_row(&row),
                last_updated: now,
            }
        })
        .collect()
}

pub fn ad_groups_from_rows(rows: Vec<RawRow>) -> Vec<AdGroup> {
    let now = Utc::now();
    rows.into_iter()
        .map(|row| {
            let g = row.ad_group.clone().unwrap_or_default();
            let c = row.campaign.clone().unwrap_or_default();
            AdGroup {
                id: raw::text(&g.id),
                name: raw::string(&g.name),
                status: raw::string(&g.status),
                campaign_id: raw::text(&c.id),
                campaign_name: raw::string(&c.name),
                metrics: metrics_from_row(&row),
                last_updated: now,
            }
        })
        .collect()
}

pub fn keywords_from_rows(rows: Vec<RawRow>) -> Vec<Keyword> {
    let now = Utc::now();
    rows.into_iter()
        .map(|row| {
            let criterion = row.ad_group_criterion.clone().unwrap_or_default();
            let kw = criterion.keyword.unwrap_or_default();
            let g = row.ad_group.clone().unwrap_or_default();
            let c = row.campaign.clone().unwrap_or_default();
            let quality_score = row
                .metrics
                .as_ref()
                .map(|m| raw::int(&m.quality_score))
                .unwrap_or(0);
            Keyword {
                id: raw::text(&criterion.criterion_id),
                text: raw::string(&kw.text),
                match_type: MatchType::from_raw(&raw::string(&kw.match_type)),
                status: raw::string(&criterion.status),
                ad_group_id: raw::text(&g.id),
                ad_group_name: raw::string(&g.name),
                campaign_id: raw::text(&c.id),
                campaign_name: raw::string(&c.name),
                metrics: metrics_from_row(&row),
                quality_score,
                last_updated: now,
            }
        })
        .collect()
}

pub fn ads_from_rows(rows: Vec<RawRow>) -> Vec<Ad> {
    let now = Utc::now();
    rows.into_iter()
        .map(|row| {
            let ad_group_ad = row.ad_group_ad.clone().unwrap_or_default();
            let ad = ad_group_ad.ad.unwrap_or_default();
            let rsa = ad.responsive_search_ad.unwrap_or_default();
            let g = row.ad_group.clone().unwrap_or_default();
            let c = row.campaign.clone().unwrap_or_default();
            Ad {
                id: raw::text(&ad.id),
                headlines: raw::json_list(&rsa.headlines),
                descriptions: raw::json_list(&rsa.descriptions),
                path1: raw::string(&rsa.path1),
                path2: raw::string(&rsa.path2),
                final_urls: raw::json_list(&ad.final_urls),
                ad_group_id: raw::text(&g.id),
                ad_group_name: raw::string(&g.name),
                campaign_id: raw::text(&c.id),
                campaign_name: raw::string(&c.name),
                metrics: metrics_from_row(&row),
                last_updated: now,
            }
        })
        .collect()
}
