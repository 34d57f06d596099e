//! Robots.txt handling module
//!
//! This module provides fetching, parsing and per-host caching of robots.txt.
//! It is only consulted when `respect-robots-txt` is enabled.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::RobotsPolicy;
