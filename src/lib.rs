//! Open Beacon - records opens of a tracked message via a 1×1 pixel fetch,
//! filters out automated traffic, deduplicates repeats, and sends one alert
//! per genuine open.
//!
//! This library provides the core domain types and logic for the tracker.

pub mod classify;
pub mod config;
pub mod decode;
pub mod dedup;
pub mod log;
pub mod notify;
pub mod pipeline;
pub mod sendtime;
pub mod server;
pub mod types;
