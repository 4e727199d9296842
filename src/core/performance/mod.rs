// Performance-data domain: entity records, the provider/store ports, and the
// normalization pipeline that turns raw provider rows into typed records.

mod models;
pub mod normalize;
pub mod raw;

pub use models::{
    Ad, AdGroup, Campaign, CampaignScore, DateRange, Keyword, MatchType, Metrics,
    PerformanceSource, PerformanceThresholds, RecordStore, SourceError, StoreError, StoredRecord,
    TableCounts,
};
