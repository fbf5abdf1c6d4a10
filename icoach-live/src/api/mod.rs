//! HTTP and WebSocket handlers for icoach-live

pub mod candidates;
pub mod health;
pub mod sessions;
pub mod ws;

pub use candidates::candidate_routes;
pub use health::health_routes;
pub use sessions::session_routes;
pub use ws::ws_routes;
