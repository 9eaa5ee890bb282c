//! Common utilities and shared functionality
//!
//! Money, record types and the persistence contract shared across the crate.

pub mod types;
pub mod traits;
