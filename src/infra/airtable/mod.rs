mod airtable_client;

pub use airtable_client::AirtableApiClient;
