// Environment-driven configuration, validated once at startup.
//
// Missing required keys are collected and reported together so a bad deploy
// shows every gap in one error rather than one per restart.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingKeys(Vec<String>),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Debug, Clone)]
pub struct GoogleAdsConfig {
    pub developer_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: Option<String>,
    pub customer_id: Option<String>,
    pub mcc_customer_id: Option<String>,
    /// Requests allowed per 24-hour window.
    pub rate_limit: u32,
}

#[derive(Debug, Clone)]
pub struct AirtableConfig {
    pub api_key: String,
    pub base_id: String,
    /// Requests allowed per 1-minute window.
    pub rate_limit: u32,
}

#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub google_ads: GoogleAdsConfig,
    pub airtable: AirtableConfig,
    pub claude: ClaudeConfig,
    pub app: AppConfig,
}

const REQUIRED_KEYS: &[&str] = &[
    "GOOGLE_ADS_DEVELOPER_TOKEN",
    "GOOGLE_ADS_CLIENT_ID",
    "GOOGLE_ADS_CLIENT_SECRET",
    "AIRTABLE_API_KEY",
    "AIRTABLE_BASE_ID",
    "ANTHROPIC_API_KEY",
];

const DEFAULT_GOOGLE_ADS_RATE_LIMIT: u32 = 10_000;
const DEFAULT_AIRTABLE_RATE_LIMIT: u32 = 5;
const DEFAULT_PORT: u16 = 3000;

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup. Blank values count
    /// as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key).filter(|value| !value.trim().is_empty())
        };

        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }

        let parse_u32 = |key: &str, default: u32| -> Result<u32, ConfigError> {
            match get(key) {
                None => Ok(default),
                Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("expected an integer, got {raw:?}"),
                }),
            }
        };

        let port = match get("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("expected a port number, got {raw:?}"),
            })?,
        };

        Ok(Self {
            google_ads: GoogleAdsConfig {
                developer_token: get("GOOGLE_ADS_DEVELOPER_TOKEN").unwrap_or_default(),
                client_id: get("GOOGLE_ADS_CLIENT_ID").unwrap_or_default(),
                client_secret: get("GOOGLE_ADS_CLIENT_SECRET").unwrap_or_default(),
                refresh_token: get("GOOGLE_ADS_REFRESH_TOKEN"),
                customer_id: get("GOOGLE_ADS_CUSTOMER_ID"),
                mcc_customer_id: get("GOOGLE_ADS_MCC_CUSTOMER_ID"),
                rate_limit: parse_u32(
                    "GOOGLE_ADS_RATE_LIMIT",
                    DEFAULT_GOOGLE_ADS_RATE_LIMIT,
                )?,
            },
            airtable: AirtableConfig {
                api_key: get("AIRTABLE_API_KEY").unwrap_or_default(),
                base_id: get("AIRTABLE_BASE_ID").unwrap_or_default(),
                rate_limit: parse_u32("AIRTABLE_RATE_LIMIT", DEFAULT_AIRTABLE_RATE_LIMIT)?,
            },
            claude: ClaudeConfig {
                api_key: get("ANTHROPIC_API_KEY").unwrap_or_default(),
            },
            app: AppConfig {
                port,
                environment: get("APP_ENV").unwrap_or_else(|| "development".to_string()),
            },
        })
    }

    /// Customer ids the daily sync should pull, in priority order.
    pub fn sync_customer_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        if let Some(id) = &self.google_ads.customer_id {
            ids.push(id.clone());
        }
        if let Some(id) = &self.google_ads.mcc_customer_id {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}
