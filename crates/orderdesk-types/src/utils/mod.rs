//! Utility functions for display formatting.
//!
//! This module provides helpers used by logging and by the operator CLI when
//! rendering orders.

pub mod formatting;

pub use formatting::{format_amount, format_timestamp, truncate_id};
