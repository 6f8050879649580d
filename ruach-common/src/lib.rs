//! # Ruach Common Library
//!
//! Shared code for the Ruach studio services including:
//! - Error type shared by repository and service layers
//! - Root folder resolution and TOML configuration loading
//! - Event types (StudioEvent enum) and the broadcast EventBus
//! - Server-Sent Events helpers
//! - SQLite pool initialisation

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
