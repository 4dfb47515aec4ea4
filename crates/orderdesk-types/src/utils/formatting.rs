//! String formatting utilities.
//!
//! Provides functions for formatting orders for display, including id
//! truncation for log readability and amount/timestamp rendering.

use crate::Amount;
use chrono::{DateTime, Utc};

/// Truncates an identifier for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((cut, _)) => format!("{}..", &id[..cut]),
		None => id.to_string(),
	}
}

/// Formats an amount with two decimal places.
pub fn format_amount(amount: &Amount) -> String {
	format!("{:.2}", amount.value())
}

/// Formats a timestamp the way the order list shows it, e.g. `Mar 04, 2025 14:07`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
	timestamp.format("%b %d, %Y %H:%M").to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use rust_decimal::Decimal;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("abc"), "abc");
		assert_eq!(truncate_id("12345678"), "12345678");
		assert_eq!(
			truncate_id("8d1f6c2e-4b7a-4f43-9a65-0c1d2e3f4a5b"),
			"8d1f6c2e.."
		);
	}

	#[test]
	fn test_format_amount_pads_to_cents() {
		let amount = Amount::new(Decimal::new(45, 1)).unwrap();
		assert_eq!(format_amount(&amount), "4.50");
	}

	#[test]
	fn test_format_timestamp() {
		let ts = Utc.with_ymd_and_hms(2025, 3, 4, 14, 7, 0).unwrap();
		assert_eq!(format_timestamp(&ts), "Mar 04, 2025 14:07");
	}
}
