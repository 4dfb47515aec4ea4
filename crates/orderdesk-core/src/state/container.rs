//! Observable in-memory order state.
//!
//! The live collection and its flags sit behind a `tokio::sync::watch`
//! channel. Every mutation produces a new snapshot that subscribers observe;
//! readers never see a partially applied change.

use chrono::{DateTime, Utc};
use orderdesk_types::Order;
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot of everything presentation needs to render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderState {
	/// Live collection, in creation order.
	pub items: Vec<Order>,
	/// A durable load is in progress.
	pub is_loading: bool,
	/// A sync batch is in flight.
	pub is_syncing: bool,
	/// When the last sync batch finished.
	pub last_sync_time: Option<DateTime<Utc>>,
}

impl OrderState {
	pub fn find(&self, id: &str) -> Option<&Order> {
		self.items.iter().find(|o| o.id == id)
	}

	pub fn has_pending(&self) -> bool {
		self.items.iter().any(Order::is_pending)
	}

	pub fn pending_count(&self) -> usize {
		self.items.iter().filter(|o| o.is_pending()).count()
	}
}

/// Result of trying to start a sync batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchStart {
	/// Another batch is already in flight.
	InFlight,
	/// No pending records to send.
	Empty,
	/// The batch was claimed; `is_syncing` is now set.
	Batch(Vec<Order>),
}

/// Shared handle to the observable order state.
#[derive(Clone)]
pub struct StateContainer {
	sender: Arc<watch::Sender<OrderState>>,
}

impl Default for StateContainer {
	fn default() -> Self {
		Self::new()
	}
}

impl StateContainer {
	pub fn new() -> Self {
		let (sender, _) = watch::channel(OrderState::default());
		Self {
			sender: Arc::new(sender),
		}
	}

	/// Returns a copy of the current state.
	pub fn snapshot(&self) -> OrderState {
		self.sender.borrow().clone()
	}

	/// Looks up one live record by id.
	pub fn find(&self, id: &str) -> Option<Order> {
		self.sender.borrow().find(id).cloned()
	}

	/// Subscribes to state changes.
	pub fn subscribe(&self) -> watch::Receiver<OrderState> {
		self.sender.subscribe()
	}

	/// Replaces the whole live collection.
	pub fn replace_all(&self, items: Vec<Order>) {
		self.sender.send_modify(|state| state.items = items);
	}

	/// Replaces the record with the same id, or appends it.
	pub fn upsert_one(&self, order: Order) {
		self.sender.send_modify(|state| {
			match state.items.iter_mut().find(|o| o.id == order.id) {
				Some(existing) => *existing = order,
				None => state.items.push(order),
			}
		});
	}

	pub fn set_loading(&self, loading: bool) {
		self.sender.send_if_modified(|state| {
			let changed = state.is_loading != loading;
			state.is_loading = loading;
			changed
		});
	}

	pub fn set_syncing(&self, syncing: bool) {
		self.sender.send_if_modified(|state| {
			let changed = state.is_syncing != syncing;
			state.is_syncing = syncing;
			changed
		});
	}

	pub fn set_last_sync_time(&self, time: DateTime<Utc>) {
		self.sender
			.send_modify(|state| state.last_sync_time = Some(time));
	}

	/// Claims the current pending records as a sync batch.
	///
	/// The in-flight check, the batch capture and setting `is_syncing` happen
	/// under one lock, so two callers can never both start a batch.
	pub fn begin_sync(&self) -> BatchStart {
		let mut start = BatchStart::Empty;
		self.sender.send_if_modified(|state| {
			if state.is_syncing {
				start = BatchStart::InFlight;
				return false;
			}
			let batch: Vec<Order> = state.items.iter().filter(|o| o.is_pending()).cloned().collect();
			if batch.is_empty() {
				return false;
			}
			state.is_syncing = true;
			start = BatchStart::Batch(batch);
			true
		});
		start
	}
}
