//! State module for tracking crawl progress
//!
//! This module provides the per-item state machine the coordinator walks for
//! every frontier item, plus the reasons an item can be dropped.

mod item_state;

// Re-export main types
pub use item_state::{DropReason, ItemState};
