mod google_ads_client;

pub use google_ads_client::GoogleAdsApiClient;
