// The api module exposes the HTTP surface. Handlers stay thin: request
// parsing and response shaping here, behavior in the core services.

#[path = "error.rs"]
pub mod error;

#[path = "state.rs"]
pub mod state;

#[path = "routes.rs"]
pub mod routes;

#[path = "system.rs"]
pub mod system;
