//! HTTP API handlers for pictor-at
//!
//! Microservices integration via HTTP REST + SSE.

pub mod health;
pub mod sse;
pub mod tagging;

pub use health::health_routes;
pub use sse::tagging_event_stream;
pub use tagging::tagging_routes;
