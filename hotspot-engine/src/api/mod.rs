//! HTTP API handlers for hotspot-engine
//!
//! REST endpoints plus an SSE stream of clustering events.

pub mod clustering;
pub mod features;
pub mod health;
pub mod hotspots;
pub mod signals;

pub use clustering::clustering_routes;
pub use features::feature_routes;
pub use health::health_routes;
pub use hotspots::hotspot_routes;
pub use signals::signal_routes;
