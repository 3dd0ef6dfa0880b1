// Implementations of the core API traits over Google's REST endpoints.

#[path = "auth/mod.rs"]
pub mod auth;

#[path = "google/mod.rs"]
pub mod google;
