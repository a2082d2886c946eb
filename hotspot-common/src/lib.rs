//! # Hotspot Common Library
//!
//! Shared code for the hotspot clustering services:
//! - Error type and result alias
//! - Event types (HotspotEvent enum) and the broadcast EventBus
//! - Configuration loading (TOML, environment, defaults)
//! - SSE helpers
//! - Time utilities

pub mod config;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
