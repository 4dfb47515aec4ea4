//! Order types for the offline order desk.
//!
//! This module defines the order record tracked on the device, its sync
//! status, and the validated inputs (`Amount`, `OrderDraft`) an order is
//! built from. The JSON shape of [`Order`] is the durable storage format.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Longest title callers should accept from user input.
///
/// The core does not enforce this bound; see [`OrderDraft::check_title_length`].
pub const MAX_TITLE_LENGTH: usize = 30;

/// Field-level validation errors for order input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
	#[error("Title is required")]
	TitleRequired,
	#[error("Title must be at most {max} characters")]
	TitleTooLong { max: usize },
	#[error("Amount is required")]
	AmountRequired,
	#[error("Amount must be a valid positive number")]
	AmountNotPositive,
	#[error("Amount has more digits than can be stored")]
	AmountTooPrecise,
}

/// Validation errors collected per input field.
///
/// Forms report both fields at once instead of stopping at the first error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
	pub title: Option<ValidationError>,
	pub amount: Option<ValidationError>,
}

impl FieldErrors {
	pub fn is_empty(&self) -> bool {
		self.title.is_none() && self.amount.is_none()
	}
}

impl fmt::Display for FieldErrors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let messages: Vec<String> = [&self.title, &self.amount]
			.into_iter()
			.flatten()
			.map(ToString::to_string)
			.collect();
		write!(f, "{}", messages.join("; "))
	}
}

impl std::error::Error for FieldErrors {}

/// A strictly positive monetary amount.
///
/// The only ways to obtain an `Amount` are [`Amount::new`], [`Amount::parse`]
/// and deserialization, all of which reject zero and negative values. Every
/// `Amount` survives the JSON float it is stored as without change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
	pub fn new(value: Decimal) -> Result<Self, ValidationError> {
		if value <= Decimal::ZERO {
			return Err(ValidationError::AmountNotPositive);
		}
		// Must read back through the same path as `Deserialize`.
		let stored = value
			.to_f64()
			.and_then(|float| Decimal::from_str(&float.to_string()).ok());
		if stored != Some(value) {
			return Err(ValidationError::AmountTooPrecise);
		}
		Ok(Self(value))
	}

	/// Parses an amount from user-entered text.
	pub fn parse(input: &str) -> Result<Self, ValidationError> {
		let trimmed = input.trim();
		if trimmed.is_empty() {
			return Err(ValidationError::AmountRequired);
		}
		let value = Decimal::from_str(trimmed).map_err(|_| ValidationError::AmountNotPositive)?;
		Self::new(value)
	}

	pub fn value(&self) -> Decimal {
		self.0
	}
}

impl TryFrom<Decimal> for Amount {
	type Error = ValidationError;

	fn try_from(value: Decimal) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl fmt::Display for Amount {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

// Stored as a JSON number, matching what the mobile client has always written.
impl Serialize for Amount {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		rust_decimal::serde::float::serialize(&self.0, serializer)
	}
}

impl<'de> Deserialize<'de> for Amount {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = rust_decimal::serde::float::deserialize(deserializer)?;
		Amount::new(value).map_err(serde::de::Error::custom)
	}
}

/// Validated user input for creating or editing an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
	pub title: String,
	pub amount: Amount,
}

impl OrderDraft {
	/// Builds a draft from a title and a numeric amount.
	///
	/// The title is trimmed; an empty title or a non-positive amount is rejected.
	pub fn new(title: impl AsRef<str>, amount: Decimal) -> Result<Self, ValidationError> {
		let title = title.as_ref().trim();
		if title.is_empty() {
			return Err(ValidationError::TitleRequired);
		}
		Ok(Self {
			title: title.to_string(),
			amount: Amount::new(amount)?,
		})
	}

	/// Builds a draft from raw form text, reporting every invalid field.
	pub fn parse(title: &str, amount: &str) -> Result<Self, FieldErrors> {
		let mut errors = FieldErrors::default();
		let title = title.trim();
		if title.is_empty() {
			errors.title = Some(ValidationError::TitleRequired);
		}
		let amount = match Amount::parse(amount) {
			Ok(amount) => Some(amount),
			Err(e) => {
				errors.amount = Some(e);
				None
			},
		};
		match amount {
			Some(amount) if errors.is_empty() => Ok(Self {
				title: title.to_string(),
				amount,
			}),
			_ => Err(errors),
		}
	}

	/// Caller-side length check for titles typed into a form.
	pub fn check_title_length(title: &str) -> Result<(), ValidationError> {
		if title.trim().chars().count() > MAX_TITLE_LENGTH {
			return Err(ValidationError::TitleTooLong {
				max: MAX_TITLE_LENGTH,
			});
		}
		Ok(())
	}
}

/// Sync status of an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncStatus {
	/// Created or edited locally, not yet confirmed by the remote side.
	Pending,
	/// Confirmed by the remote side. Synced orders are never edited again.
	Synced,
	/// The last sync attempt failed; eligible for retry.
	Failed,
}

impl fmt::Display for SyncStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncStatus::Pending => write!(f, "PENDING"),
			SyncStatus::Synced => write!(f, "SYNCED"),
			SyncStatus::Failed => write!(f, "FAILED"),
		}
	}
}

/// An order tracked by the device.
///
/// Orders are created offline in [`SyncStatus::Pending`] and move to
/// `Synced` or `Failed` only as the result of a sync attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Unique identifier, assigned at creation.
	pub id: String,
	/// Short human-readable title.
	pub title: String,
	/// Order amount, always positive.
	pub amount: Amount,
	/// When the order was created on this device.
	pub created_at: DateTime<Utc>,
	/// Last successful local edit or sync confirmation.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_at: Option<DateTime<Utc>>,
	/// Current sync status.
	pub sync_status: SyncStatus,
}

impl Order {
	/// Creates a new pending order with a fresh id.
	pub fn new(draft: OrderDraft, created_at: DateTime<Utc>) -> Self {
		Self {
			id: Uuid::new_v4().to_string(),
			title: draft.title,
			amount: draft.amount,
			created_at,
			updated_at: None,
			sync_status: SyncStatus::Pending,
		}
	}

	pub fn is_pending(&self) -> bool {
		self.sync_status == SyncStatus::Pending
	}

	/// Whether local edits are still allowed.
	pub fn is_editable(&self) -> bool {
		self.sync_status != SyncStatus::Synced
	}
}
