// Raw provider row schema.
//
// A query response row is a nested object with one sub-object per queried
// resource (campaign, adGroup, metrics, ...) and every field optional. The
// numeric fields arrive as stringified numbers or plain JSON numbers
// depending on the field, so everything is held as `serde_json::Value` and
// coerced through the total helpers below. Nothing in this module can fail:
// a malformed row yields defaulted values, never an error.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRow {
    pub campaign: Option<RawCampaign>,
    pub ad_group: Option<RawAdGroup>,
    pub ad_group_criterion: Option<RawCriterion>,
    pub ad_group_ad: Option<RawAdGroupAd>,
    pub metrics: Option<RawMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCampaign {
    pub id: Option<Value>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub advertising_channel_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAdGroup {
    pub id: Option<Value>,
    pub name: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCriterion {
    pub criterion_id: Option<Value>,
    pub status: Option<String>,
    pub keyword: Option<RawKeywordInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawKeywordInfo {
    pub text: Option<String>,
    pub match_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAdGroupAd {
    pub ad: Option<RawAd>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAd {
    pub id: Option<Value>,
    pub final_urls: Option<Value>,
    pub responsive_search_ad: Option<RawResponsiveSearchAd>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawResponsiveSearchAd {
    pub headlines: Option<Value>,
    pub descriptions: Option<Value>,
    pub path1: Option<String>,
    pub path2: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMetrics {
    pub impressions: Option<Value>,
    pub clicks: Option<Value>,
    pub ctr: Option<Value>,
    pub cost_micros: Option<Value>,
    pub conversions: Option<Value>,
    pub conversion_rate: Option<Value>,
    pub cost_per_conversion: Option<Value>,
    pub value_per_conversion: Option<Value>,
    pub quality_score: Option<Value>,
}

/// Coerce an identifier to text. Provider ids show up as either JSON
/// numbers or strings; the output is always text.
pub fn text(value: &Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Parse an integer field, defaulting to 0 on absence or junk. Fractional
/// input truncates toward zero.
pub fn int(value: &Option<Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

/// Parse a float field, defaulting to 0.0 on absence or junk.
pub fn float(value: &Option<Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Convert a micro-unit monetary field to currency units. This is the only
/// place the / 1,000,000 division happens.
pub fn micros(value: &Option<Value>) -> f64 {
    int(value) as f64 / 1_000_000.0
}

/// Serialize a JSON list field (headlines, final URLs) to text, defaulting
/// to an empty list.
pub fn json_list(value: &Option<Value>) -> String {
    match value {
        Some(v @ Value::Array(_)) => v.to_string(),
        _ => "[]".to_string(),
    }
}

/// Copy an optional string field, defaulting to empty text.
pub fn string(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}
