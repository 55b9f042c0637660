//! Core domain types for the open tracker.
//!
//! This module contains the fundamental types used throughout the application,
//! designed to encode invariants via the type system.

pub mod event;
pub mod ids;

// Re-export commonly used types at the module level
pub use event::OpenEvent;
pub use ids::{DedupKey, Nonce, TrackId};
