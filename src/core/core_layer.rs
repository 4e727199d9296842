// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "performance/mod.rs"]
pub mod performance;

#[path = "sync/sync_service.rs"]
pub mod sync;
