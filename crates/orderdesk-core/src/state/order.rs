//! Order state machine implementation.
//!
//! Manages sync status transitions with validation, ensuring orders move through
//! valid lifecycle states: Pending -> Synced, or Pending -> Failed -> Pending.
//! Synced is terminal. Also handles local edits and remote confirmations.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use orderdesk_types::{Order, OrderDraft, SyncStatus};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during order state management.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderStateError {
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: SyncStatus, to: SyncStatus },
	#[error("Order {0} is synced and can no longer be edited")]
	Immutable(String),
	#[error("Confirmation mismatch: {0}")]
	ConfirmationMismatch(String),
}

/// Validates and applies order status changes.
///
/// Every function is pure: it takes the current record and returns the next
/// one, leaving publishing and persistence to the caller.
pub struct OrderStateMachine;

impl OrderStateMachine {
	/// Checks if a state transition is valid.
	pub fn is_valid_transition(from: SyncStatus, to: SyncStatus) -> bool {
		// Static transition table - each state maps to allowed next states
		static TRANSITIONS: Lazy<HashMap<SyncStatus, HashSet<SyncStatus>>> = Lazy::new(|| {
			let mut m = HashMap::new();
			m.insert(
				SyncStatus::Pending,
				HashSet::from([SyncStatus::Synced, SyncStatus::Failed]),
			);
			m.insert(SyncStatus::Failed, HashSet::from([SyncStatus::Pending]));
			m.insert(SyncStatus::Synced, HashSet::new()); // terminal
			m
		});

		TRANSITIONS.get(&from).is_some_and(|set| set.contains(&to))
	}

	/// Moves an order to a new status. `updated_at` is left untouched.
	pub fn transition(order: &Order, to: SyncStatus) -> Result<Order, OrderStateError> {
		if !Self::is_valid_transition(order.sync_status, to) {
			return Err(OrderStateError::InvalidTransition {
				from: order.sync_status,
				to,
			});
		}
		Ok(Order {
			sync_status: to,
			..order.clone()
		})
	}

	/// Records a failed sync attempt for a batch record.
	///
	/// Batch records are captured while `PENDING`, so the move to `FAILED`
	/// is always legal here.
	pub fn mark_failed(order: &Order) -> Order {
		Order {
			sync_status: SyncStatus::Failed,
			..order.clone()
		}
	}

	/// Applies a local edit, keeping the sync status.
	pub fn apply_edit(
		order: &Order,
		draft: OrderDraft,
		now: DateTime<Utc>,
	) -> Result<Order, OrderStateError> {
		if !order.is_editable() {
			return Err(OrderStateError::Immutable(order.id.clone()));
		}
		Ok(Order {
			title: draft.title,
			amount: draft.amount,
			updated_at: Some(now),
			..order.clone()
		})
	}

	/// Checks an adapter's confirmation against the record that was sent.
	///
	/// The confirmed copy must carry the same id and a `SYNCED` status. Title,
	/// amount and creation time are taken from the sent record.
	pub fn accept_confirmation(sent: &Order, confirmed: Order) -> Result<Order, OrderStateError> {
		if confirmed.id != sent.id {
			return Err(OrderStateError::ConfirmationMismatch(format!(
				"expected id {}, got {}",
				sent.id, confirmed.id
			)));
		}
		if confirmed.sync_status != SyncStatus::Synced {
			return Err(OrderStateError::ConfirmationMismatch(format!(
				"expected status {}, got {}",
				SyncStatus::Synced,
				confirmed.sync_status
			)));
		}
		let synced = Self::transition(sent, SyncStatus::Synced)?;
		Ok(Order {
			updated_at: Some(confirmed.updated_at.unwrap_or_else(Utc::now)),
			..synced
		})
	}
}
