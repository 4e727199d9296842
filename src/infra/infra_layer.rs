// The infra module contains implementations of core traits.
// Each external client goes in its own submodule.

#[path = "rate_limit.rs"]
pub mod rate_limit;

#[path = "google_ads/mod.rs"]
pub mod google_ads;

#[path = "airtable/mod.rs"]
pub mod airtable;
