//! HTTP API handlers for geotunes-vibe
//!
//! JSON only. Errors share the `{"error": {"code", "message"}}` body from
//! `ApiError`.

pub mod health;
pub mod recommendations;
pub mod vibe;

pub use health::health_routes;
pub use recommendations::recommendation_routes;
pub use vibe::vibe_routes;
