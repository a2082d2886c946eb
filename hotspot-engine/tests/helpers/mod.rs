//! Test Helper Utilities
//!
//! Shared utilities for testing hotspot-engine

#![allow(dead_code)]

pub mod db_utils;
pub mod embedders;
pub mod signals;

// Re-export commonly used items
pub use db_utils::{create_test_db, create_test_state, init_test_logging, wait_for_terminal};
pub use embedders::{CancellingEmbedder, FailingEmbedder, GatedEmbedder, GroupEmbedder};
pub use signals::{group_signals, seed_signals, GroupSpec, FOUR_GROUPS};
