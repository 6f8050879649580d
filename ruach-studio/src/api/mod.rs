//! HTTP API handlers for ruach-studio
//!
//! One endpoint per engine operation. Success bodies carry the entity's JSON
//! state; failures go through [`ApiError`](crate::ApiError).

pub mod assets;
pub mod edl;
pub mod health;
pub mod render;
pub mod sessions;
pub mod settings;
pub mod sse;
pub mod sync;
pub mod transcript;

pub use assets::asset_routes;
pub use edl::edl_routes;
pub use health::health_routes;
pub use render::render_routes;
pub use sessions::session_routes;
pub use settings::settings_routes;
pub use sse::event_routes;
pub use sync::sync_routes;
pub use transcript::transcript_routes;
