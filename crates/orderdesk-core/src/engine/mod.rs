//! Sync engine that orchestrates the order lifecycle on the device.
//!
//! This module contains the main SyncEngine struct which owns the durable
//! order store, the remote sync service, the observable state and the event
//! bus. Every mutation is published to the live state first and then written
//! through to the durable collection.

pub mod event_bus;

use crate::state::{BatchStart, OrderStateMachine, StateContainer};
use chrono::Utc;
use event_bus::EventBus;
use orderdesk_storage::{OrderStore, OrderStoreError};
use orderdesk_sync::SyncService;
use orderdesk_types::{truncate_id, Order, OrderDraft, OrderEvent, SyncStatus, ValidationError};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::instrument;

/// Errors returned to callers of `create` and `update`.
///
/// Storage and per-record sync failures are absorbed by the engine and never
/// surface here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
	#[error(transparent)]
	Validation(#[from] ValidationError),
	#[error("Order not found")]
	NotFound,
	#[error("Cannot edit synced orders")]
	SyncedImmutable,
}

/// Ids of the records a batch confirmed or failed, in batch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
	pub synced: Vec<String>,
	pub failed: Vec<String>,
}

/// What a call to [`SyncEngine::sync_pending`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
	/// A batch was already in flight; nothing was started.
	AlreadySyncing,
	/// There were no pending records; nothing changed.
	NothingPending,
	/// A batch ran to completion.
	Completed(SyncReport),
}

/// How changed records missing from the durable collection are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merge {
	Append,
	ReplaceOnly,
}

/// Main engine that owns the order lifecycle.
#[derive(Clone)]
pub struct SyncEngine {
	/// Durable order collection.
	store: OrderStore,
	/// Remote sync with bounded per-call time.
	sync: Arc<SyncService>,
	/// Live observable state.
	state: StateContainer,
	/// Event bus for lifecycle events.
	event_bus: EventBus,
	/// Whether reachability changes trigger a sync.
	auto_sync: bool,
	/// Serializes durable writes and holds ids whose last write failed.
	unpersisted: Arc<Mutex<HashSet<String>>>,
}

impl SyncEngine {
	/// Creates a new engine with the given services.
	pub fn new(
		store: OrderStore,
		sync: Arc<SyncService>,
		event_bus: EventBus,
		auto_sync: bool,
	) -> Self {
		Self {
			store,
			sync,
			state: StateContainer::new(),
			event_bus,
			auto_sync,
			unpersisted: Arc::new(Mutex::new(HashSet::new())),
		}
	}

	/// Returns the observable state.
	pub fn state(&self) -> &StateContainer {
		&self.state
	}

	/// Returns the event bus.
	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	/// Ids of live records whose durable write has not succeeded yet.
	pub async fn unpersisted_ids(&self) -> Vec<String> {
		let unpersisted = self.unpersisted.lock().await;
		let mut ids: Vec<String> = unpersisted.iter().cloned().collect();
		ids.sort();
		ids
	}

	/// Loads the durable collection into the live state.
	///
	/// Unpersisted records are written out first. On a read failure the
	/// previous live state is kept. The loading flag is cleared either way.
	#[instrument(skip_all)]
	pub async fn load_all(&self) {
		self.state.set_loading(true);
		{
			let mut unpersisted = self.unpersisted.lock().await;
			if !unpersisted.is_empty() {
				match self.write_through(&[], Merge::ReplaceOnly, &unpersisted).await {
					Ok(()) => {
						tracing::info!(count = unpersisted.len(), "Flushed unpersisted orders");
						unpersisted.clear();
					},
					Err(e) => {
						tracing::warn!(
							count = unpersisted.len(),
							error = %e,
							"Failed to flush unpersisted orders"
						);
					},
				}
			}

			match self.store.load().await {
				Ok(mut orders) => {
					if !unpersisted.is_empty() {
						let live = self.state.snapshot();
						for order in live
							.items
							.into_iter()
							.filter(|o| unpersisted.contains(&o.id))
						{
							upsert_into(&mut orders, order, true);
						}
					}
					let count = orders.len();
					self.state.replace_all(orders);
					tracing::info!(count, "Loaded orders");
					self.event_bus.publish(OrderEvent::Loaded { count }).ok();
				},
				Err(e) => {
					tracing::error!(error = %e, "Failed to load orders, keeping current state");
				},
			}
		}
		self.state.set_loading(false);
	}

	/// Creates a new pending order and writes it through to storage.
	///
	/// Fails only on invalid input. A failed durable write is logged and the
	/// live record stands.
	#[instrument(skip_all)]
	pub async fn create(&self, title: &str, amount: Decimal) -> Result<Order, OrderError> {
		let draft = OrderDraft::new(title, amount)?;
		let order = Order::new(draft, Utc::now());

		self.state.upsert_one(order.clone());
		tracing::info!(
			order_id = %truncate_id(&order.id),
			amount = %order.amount,
			"Created order"
		);
		self.event_bus
			.publish(OrderEvent::Created {
				order: order.clone(),
			})
			.ok();

		self.persist("create", vec![order.clone()], Merge::Append)
			.await;
		Ok(order)
	}

	/// Edits the title and amount of a pending or failed order.
	#[instrument(skip_all, fields(order_id = %truncate_id(id)))]
	pub async fn update(&self, id: &str, title: &str, amount: Decimal) -> Result<Order, OrderError> {
		let draft = OrderDraft::new(title, amount)?;
		let current = self.state.find(id).ok_or(OrderError::NotFound)?;
		let updated = OrderStateMachine::apply_edit(&current, draft, Utc::now())
			.map_err(|_| OrderError::SyncedImmutable)?;

		self.state.upsert_one(updated.clone());
		tracing::info!(status = %updated.sync_status, "Updated order");
		self.event_bus
			.publish(OrderEvent::Updated {
				order: updated.clone(),
			})
			.ok();

		self.persist("update", vec![updated.clone()], Merge::ReplaceOnly)
			.await;
		Ok(updated)
	}

	/// Sends every pending order to the remote side, one at a time.
	///
	/// The batch is fixed when it starts. Each result is published as soon as
	/// it arrives, a failure never stops the remaining records, and the
	/// durable collection is written once at the end.
	#[instrument(skip_all)]
	pub async fn sync_pending(&self) -> SyncOutcome {
		let batch = match self.state.begin_sync() {
			BatchStart::InFlight => {
				tracing::debug!("Sync already in progress");
				return SyncOutcome::AlreadySyncing;
			},
			BatchStart::Empty => {
				tracing::debug!("No pending orders to sync");
				return SyncOutcome::NothingPending;
			},
			BatchStart::Batch(batch) => batch,
		};

		tracing::info!(batch_size = batch.len(), "Starting sync");
		self.event_bus
			.publish(OrderEvent::SyncStarted {
				batch_size: batch.len(),
			})
			.ok();

		let mut report = SyncReport::default();
		let mut results = Vec::with_capacity(batch.len());
		for order in &batch {
			let next = self.sync_one(order).await;
			match next.sync_status {
				SyncStatus::Synced => report.synced.push(next.id.clone()),
				_ => report.failed.push(next.id.clone()),
			}

			self.state.upsert_one(next.clone());
			self.event_bus
				.publish(OrderEvent::StatusChanged {
					order_id: next.id.clone(),
					from: order.sync_status,
					to: next.sync_status,
				})
				.ok();
			results.push(next);
		}

		self.persist("sync", results.clone(), Merge::ReplaceOnly).await;

		// A reload during the batch puts back the stored pre-sync rows.
		for (sent, result) in batch.iter().zip(results) {
			if self.state.find(&sent.id).as_ref() == Some(sent) {
				tracing::debug!(order_id = %truncate_id(&sent.id), "Restoring sync result");
				self.state.upsert_one(result);
			}
		}
		self.state.set_last_sync_time(Utc::now());
		self.state.set_syncing(false);

		tracing::info!(
			synced = report.synced.len(),
			failed = report.failed.len(),
			"Sync completed"
		);
		self.event_bus
			.publish(OrderEvent::SyncCompleted {
				synced: report.synced.len(),
				failed: report.failed.len(),
			})
			.ok();
		SyncOutcome::Completed(report)
	}

	/// Puts a failed order back to pending and runs a sync.
	///
	/// Returns `None` when the order does not exist or is not failed. The
	/// sync covers every pending order, not only this one.
	#[instrument(skip_all, fields(order_id = %truncate_id(id)))]
	pub async fn retry_sync(&self, id: &str) -> Option<SyncOutcome> {
		let current = self.state.find(id)?;
		let pending = match OrderStateMachine::transition(&current, SyncStatus::Pending) {
			Ok(pending) => pending,
			Err(e) => {
				tracing::debug!(error = %e, "Order is not eligible for retry");
				return None;
			},
		};

		self.state.upsert_one(pending.clone());
		tracing::info!("Retrying sync");
		self.event_bus
			.publish(OrderEvent::StatusChanged {
				order_id: pending.id.clone(),
				from: current.sync_status,
				to: pending.sync_status,
			})
			.ok();
		self.persist("retry", vec![pending], Merge::ReplaceOnly)
			.await;

		Some(self.sync_pending().await)
	}

	/// Reacts to a reachability reading.
	///
	/// Only a confirmed online reading with pending orders starts a sync, and
	/// only when auto sync is enabled.
	pub async fn on_connectivity_change(&self, online: Option<bool>) -> Option<SyncOutcome> {
		if !self.auto_sync || online != Some(true) {
			return None;
		}
		if !self.state.snapshot().has_pending() {
			return None;
		}
		Some(self.sync_pending().await)
	}

	/// Reloads from storage and, when online, syncs pending orders.
	pub async fn refresh(&self, online: bool) -> Option<SyncOutcome> {
		self.load_all().await;
		if online {
			Some(self.sync_pending().await)
		} else {
			None
		}
	}

	/// Removes every order from storage and from the live state.
	#[instrument(skip_all)]
	pub async fn clear_all(&self) -> Result<(), OrderStoreError> {
		let mut unpersisted = self.unpersisted.lock().await;
		self.store.clear().await?;
		unpersisted.clear();
		self.state.replace_all(Vec::new());
		tracing::info!("Cleared all orders");
		self.event_bus.publish(OrderEvent::Loaded { count: 0 }).ok();
		Ok(())
	}

	/// Runs auto sync until the connectivity sender is dropped.
	///
	/// A sync starts when the device comes online with pending orders, and
	/// again whenever new pending orders appear while online.
	pub async fn run(&self, mut connectivity: watch::Receiver<Option<bool>>) {
		let mut state_rx = self.state.subscribe();
		let mut online = *connectivity.borrow_and_update();
		self.on_connectivity_change(online).await;

		loop {
			tokio::select! {
				changed = connectivity.changed() => {
					if changed.is_err() {
						tracing::debug!("Connectivity source closed");
						break;
					}
					let reading = *connectivity.borrow_and_update();
					if reading != online {
						online = reading;
						tracing::info!(online = ?online, "Connectivity changed");
						self.on_connectivity_change(online).await;
					}
				}
				changed = state_rx.changed() => {
					if changed.is_err() {
						break;
					}
					let ready = {
						let state = state_rx.borrow_and_update();
						!state.is_syncing && !state.is_loading && state.has_pending()
					};
					if ready {
						self.on_connectivity_change(online).await;
					}
				}
			}
		}
	}

	#[instrument(skip_all, fields(order_id = %truncate_id(&order.id)))]
	async fn sync_one(&self, order: &Order) -> Order {
		let confirmed = match self.sync.attempt_sync(order).await {
			Ok(confirmed) => confirmed,
			Err(e) => {
				tracing::warn!(error = %e, "Sync attempt failed");
				return OrderStateMachine::mark_failed(order);
			},
		};
		match OrderStateMachine::accept_confirmation(order, confirmed) {
			Ok(synced) => {
				tracing::debug!("Order synced");
				synced
			},
			Err(e) => {
				tracing::warn!(error = %e, "Rejected sync confirmation");
				OrderStateMachine::mark_failed(order)
			},
		}
	}

	/// Writes changed records through to the durable collection.
	///
	/// Runs under the persistence lock. On failure the changed ids are
	/// remembered so a later write can carry them.
	async fn persist(&self, operation: &'static str, changed: Vec<Order>, merge: Merge) -> bool {
		let mut unpersisted = self.unpersisted.lock().await;
		match self.write_through(&changed, merge, &unpersisted).await {
			Ok(()) => {
				if !unpersisted.is_empty() {
					tracing::info!(count = unpersisted.len(), "Recovered unpersisted orders");
				}
				unpersisted.clear();
				true
			},
			Err(e) => {
				tracing::error!(operation, error = %e, "Failed to persist orders");
				unpersisted.extend(changed.iter().map(|o| o.id.clone()));
				self.event_bus
					.publish(OrderEvent::PersistFailed {
						operation: operation.to_string(),
						error: e.to_string(),
					})
					.ok();
				false
			},
		}
	}

	/// Loads the durable collection, merges the changes, and saves it back.
	async fn write_through(
		&self,
		changed: &[Order],
		merge: Merge,
		unpersisted: &HashSet<String>,
	) -> Result<(), OrderStoreError> {
		let mut durable = self.store.load().await?;
		for order in changed {
			let append = merge == Merge::Append || unpersisted.contains(&order.id);
			upsert_into(&mut durable, order.clone(), append);
		}

		if !unpersisted.is_empty() {
			let live = self.state.snapshot();
			for order in live.items.into_iter().filter(|o| {
				unpersisted.contains(&o.id) && !changed.iter().any(|c| c.id == o.id)
			}) {
				upsert_into(&mut durable, order, true);
			}
		}

		self.store.save(&durable).await
	}
}

/// Replaces the record with the same id; appends it only when `append` is set.
fn upsert_into(orders: &mut Vec<Order>, order: Order, append: bool) {
	match orders.iter_mut().find(|o| o.id == order.id) {
		Some(existing) => *existing = order,
		None if append => orders.push(order),
		None => {},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use orderdesk_storage::implementations::memory::MemoryStorage;
	use orderdesk_storage::{StorageError, StorageInterface, StorageService};
	use orderdesk_sync::{SyncError, SyncInterface};
	use orderdesk_types::ConfigSchema;
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	use std::time::Duration;

	/// Switches and counters shared with [`FaultyStorage`].
	#[derive(Clone, Default)]
	struct Faults {
		fail_reads: Arc<AtomicBool>,
		fail_writes: Arc<AtomicBool>,
		writes: Arc<AtomicUsize>,
	}

	/// Memory backend with injectable read and write failures.
	struct FaultyStorage {
		inner: MemoryStorage,
		faults: Faults,
	}

	#[async_trait]
	impl StorageInterface for FaultyStorage {
		async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
			if self.faults.fail_reads.load(Ordering::SeqCst) {
				return Err(StorageError::Backend("disk unavailable".into()));
			}
			self.inner.get_bytes(key).await
		}

		async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
			if self.faults.fail_writes.load(Ordering::SeqCst) {
				return Err(StorageError::Backend("disk full".into()));
			}
			self.faults.writes.fetch_add(1, Ordering::SeqCst);
			self.inner.set_bytes(key, value).await
		}

		async fn delete(&self, key: &str) -> Result<(), StorageError> {
			self.inner.delete(key).await
		}

		async fn exists(&self, key: &str) -> Result<bool, StorageError> {
			self.inner.exists(key).await
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			self.inner.config_schema()
		}
	}

	#[derive(Debug, Clone, PartialEq)]
	enum Behavior {
		Succeed,
		Fail,
		FailTitle(&'static str),
		/// Answers without marking the order synced.
		Unconfirmed,
	}

	/// Adapter controlled by the test, recording every call.
	#[derive(Clone)]
	struct ScriptedSync {
		behavior: Arc<std::sync::Mutex<Behavior>>,
		delay: Duration,
		calls: Arc<std::sync::Mutex<Vec<String>>>,
		in_flight: Arc<AtomicUsize>,
		max_in_flight: Arc<AtomicUsize>,
	}

	impl ScriptedSync {
		fn new(behavior: Behavior, delay: Duration) -> Self {
			Self {
				behavior: Arc::new(std::sync::Mutex::new(behavior)),
				delay,
				calls: Arc::default(),
				in_flight: Arc::default(),
				max_in_flight: Arc::default(),
			}
		}

		fn set(&self, behavior: Behavior) {
			*self.behavior.lock().unwrap() = behavior;
		}

		fn calls(&self) -> Vec<String> {
			self.calls.lock().unwrap().clone()
		}
	}

	#[async_trait]
	impl SyncInterface for ScriptedSync {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			orderdesk_sync::implementations::simulated::SimulatedSync::new(Duration::ZERO, 0.0)
				.config_schema()
		}

		async fn attempt_sync(&self, order: &Order) -> Result<Order, SyncError> {
			let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
			self.max_in_flight.fetch_max(now, Ordering::SeqCst);
			self.calls.lock().unwrap().push(order.title.clone());

			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}
			self.in_flight.fetch_sub(1, Ordering::SeqCst);

			let behavior = self.behavior.lock().unwrap().clone();
			match behavior {
				Behavior::Fail => Err(SyncError::Network("Failed to sync order".into())),
				Behavior::FailTitle(title) if order.title == title => {
					Err(SyncError::Network("Failed to sync order".into()))
				},
				Behavior::Unconfirmed => Ok(order.clone()),
				_ => Ok(Order {
					sync_status: SyncStatus::Synced,
					updated_at: Some(Utc::now()),
					..order.clone()
				}),
			}
		}
	}

	struct Harness {
		engine: SyncEngine,
		store: OrderStore,
		faults: Faults,
		adapter: ScriptedSync,
	}

	fn harness_with(behavior: Behavior, delay: Duration, auto_sync: bool) -> Harness {
		let faults = Faults::default();
		let backend = FaultyStorage {
			inner: MemoryStorage::new(),
			faults: faults.clone(),
		};
		let store = OrderStore::new(Arc::new(StorageService::new(Box::new(backend))));
		let adapter = ScriptedSync::new(behavior, delay);
		let sync = Arc::new(SyncService::new(
			Box::new(adapter.clone()),
			Duration::from_secs(30),
		));
		let engine = SyncEngine::new(store.clone(), sync, EventBus::new(64), auto_sync);
		Harness {
			engine,
			store,
			faults,
			adapter,
		}
	}

	fn harness(behavior: Behavior) -> Harness {
		harness_with(behavior, Duration::ZERO, true)
	}

	fn dec(s: &str) -> Decimal {
		s.parse().unwrap()
	}

	#[tokio::test]
	async fn test_create_persists_pending_order() {
		let h = harness(Behavior::Succeed);
		let first = h.engine.create("Widget", dec("9.99")).await.unwrap();
		let second = h.engine.create("Widget", dec("9.99")).await.unwrap();

		assert_ne!(first.id, second.id);
		assert_eq!(first.sync_status, SyncStatus::Pending);
		assert_eq!(first.amount.value(), dec("9.99"));
		assert!(first.updated_at.is_none());

		let live = h.engine.state().snapshot().items;
		let durable = h.store.load().await.unwrap();
		assert_eq!(live, vec![first.clone(), second.clone()]);
		assert_eq!(durable, live);
	}

	#[tokio::test]
	async fn test_create_rejects_invalid_input() {
		let h = harness(Behavior::Succeed);
		assert_eq!(
			h.engine.create("   ", dec("5")).await,
			Err(OrderError::Validation(ValidationError::TitleRequired))
		);
		assert_eq!(
			h.engine.create("Widget", dec("0")).await,
			Err(OrderError::Validation(ValidationError::AmountNotPositive))
		);
		assert_eq!(
			h.engine.create("Widget", dec("-1")).await,
			Err(OrderError::Validation(ValidationError::AmountNotPositive))
		);

		assert!(h.engine.state().snapshot().items.is_empty());
		assert_eq!(h.faults.writes.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_update_edits_pending_order() {
		let h = harness(Behavior::Succeed);
		let order = h.engine.create("Widget", dec("9.99")).await.unwrap();

		let updated = h
			.engine
			.update(&order.id, " Gadget ", dec("12.50"))
			.await
			.unwrap();
		assert_eq!(updated.title, "Gadget");
		assert_eq!(updated.amount.value(), dec("12.50"));
		assert_eq!(updated.sync_status, SyncStatus::Pending);
		assert_eq!(updated.created_at, order.created_at);
		assert!(updated.updated_at.is_some());

		assert_eq!(h.engine.state().find(&order.id), Some(updated.clone()));
		assert_eq!(h.store.load().await.unwrap(), vec![updated]);
	}

	#[tokio::test]
	async fn test_update_with_invalid_input_leaves_record() {
		let h = harness(Behavior::Succeed);
		let order = h.engine.create("Widget", dec("9.99")).await.unwrap();
		let writes = h.faults.writes.load(Ordering::SeqCst);

		assert_eq!(
			h.engine.update(&order.id, "", dec("5")).await,
			Err(OrderError::Validation(ValidationError::TitleRequired))
		);
		assert_eq!(h.engine.state().find(&order.id), Some(order.clone()));
		assert_eq!(h.store.load().await.unwrap(), vec![order]);
		assert_eq!(h.faults.writes.load(Ordering::SeqCst), writes);
	}

	#[tokio::test]
	async fn test_update_missing_order() {
		let h = harness(Behavior::Succeed);
		assert_eq!(
			h.engine.update("missing", "Widget", dec("1")).await,
			Err(OrderError::NotFound)
		);
		assert_eq!(OrderError::NotFound.to_string(), "Order not found");
	}

	#[tokio::test]
	async fn test_synced_order_is_immutable() {
		let h = harness(Behavior::Succeed);
		let order = h.engine.create("Widget", dec("9.99")).await.unwrap();
		h.engine.sync_pending().await;

		let synced = h.engine.state().find(&order.id).unwrap();
		assert_eq!(synced.sync_status, SyncStatus::Synced);
		let durable_before = h.store.load().await.unwrap();
		let writes = h.faults.writes.load(Ordering::SeqCst);

		let err = h
			.engine
			.update(&order.id, "Changed", dec("1"))
			.await
			.unwrap_err();
		assert_eq!(err, OrderError::SyncedImmutable);
		assert_eq!(err.to_string(), "Cannot edit synced orders");

		assert_eq!(h.engine.state().find(&order.id), Some(synced));
		assert_eq!(h.store.load().await.unwrap(), durable_before);
		assert_eq!(h.faults.writes.load(Ordering::SeqCst), writes);
	}

	#[tokio::test]
	async fn test_widget_syncs() {
		let h = harness(Behavior::Succeed);
		let order = h.engine.create("Widget", dec("9.99")).await.unwrap();

		let outcome = h.engine.sync_pending().await;
		assert_eq!(
			outcome,
			SyncOutcome::Completed(SyncReport {
				synced: vec![order.id.clone()],
				failed: vec![],
			})
		);

		let state = h.engine.state().snapshot();
		let synced = state.find(&order.id).unwrap();
		assert_eq!(synced.sync_status, SyncStatus::Synced);
		assert!(synced.updated_at.is_some());
		assert!(state.last_sync_time.is_some());
		assert!(!state.is_syncing);

		assert_eq!(h.store.load().await.unwrap(), vec![synced.clone()]);
	}

	#[tokio::test]
	async fn test_gadget_fails_then_retries() {
		let h = harness(Behavior::Fail);
		let order = h.engine.create("Gadget", dec("4.5")).await.unwrap();

		let outcome = h.engine.sync_pending().await;
		assert_eq!(
			outcome,
			SyncOutcome::Completed(SyncReport {
				synced: vec![],
				failed: vec![order.id.clone()],
			})
		);
		assert_eq!(
			h.engine.state().find(&order.id).unwrap().sync_status,
			SyncStatus::Failed
		);
		assert_eq!(
			h.store.load().await.unwrap()[0].sync_status,
			SyncStatus::Failed
		);

		h.adapter.set(Behavior::Succeed);
		let outcome = h.engine.retry_sync(&order.id).await;
		assert_eq!(
			outcome,
			Some(SyncOutcome::Completed(SyncReport {
				synced: vec![order.id.clone()],
				failed: vec![],
			}))
		);
		assert_eq!(
			h.engine.state().find(&order.id).unwrap().sync_status,
			SyncStatus::Synced
		);
		assert_eq!(
			h.store.load().await.unwrap()[0].sync_status,
			SyncStatus::Synced
		);
	}

	#[tokio::test]
	async fn test_retry_that_fails_again() {
		let h = harness(Behavior::Fail);
		let order = h.engine.create("Gadget", dec("4.5")).await.unwrap();
		h.engine.sync_pending().await;

		let outcome = h.engine.retry_sync(&order.id).await;
		assert!(matches!(outcome, Some(SyncOutcome::Completed(ref r)) if r.failed == vec![order.id.clone()]));
		assert_eq!(
			h.engine.state().find(&order.id).unwrap().sync_status,
			SyncStatus::Failed
		);
		assert_eq!(h.adapter.calls().len(), 2);
	}

	#[tokio::test]
	async fn test_retry_ignores_ineligible_orders() {
		let h = harness(Behavior::Succeed);
		assert_eq!(h.engine.retry_sync("missing").await, None);

		let pending = h.engine.create("Widget", dec("1")).await.unwrap();
		assert_eq!(h.engine.retry_sync(&pending.id).await, None);
		assert!(h.adapter.calls().is_empty());

		h.engine.sync_pending().await;
		assert_eq!(h.engine.retry_sync(&pending.id).await, None);
		assert_eq!(h.adapter.calls().len(), 1);
	}

	#[tokio::test]
	async fn test_batch_only_touches_pending_records() {
		let h = harness(Behavior::FailTitle("bad"));
		let bad = h.engine.create("bad", dec("1")).await.unwrap();
		h.engine.sync_pending().await;

		h.adapter.set(Behavior::Succeed);
		let done = h.engine.create("done", dec("2")).await.unwrap();
		h.engine.sync_pending().await;

		h.adapter.set(Behavior::Fail);
		let fresh = h.engine.create("fresh", dec("3")).await.unwrap();
		h.engine.sync_pending().await;

		let state = h.engine.state().snapshot();
		assert_eq!(state.find(&bad.id).unwrap().sync_status, SyncStatus::Failed);
		assert_eq!(state.find(&done.id).unwrap().sync_status, SyncStatus::Synced);
		assert_eq!(state.find(&fresh.id).unwrap().sync_status, SyncStatus::Failed);
		assert_eq!(h.adapter.calls(), vec!["bad", "done", "fresh"]);
	}

	#[tokio::test]
	async fn test_failure_does_not_stop_batch() {
		let h = harness(Behavior::FailTitle("second"));
		let first = h.engine.create("first", dec("1")).await.unwrap();
		let second = h.engine.create("second", dec("2")).await.unwrap();
		let third = h.engine.create("third", dec("3")).await.unwrap();

		let outcome = h.engine.sync_pending().await;
		assert_eq!(
			outcome,
			SyncOutcome::Completed(SyncReport {
				synced: vec![first.id.clone(), third.id.clone()],
				failed: vec![second.id.clone()],
			})
		);
		assert_eq!(h.adapter.calls(), vec!["first", "second", "third"]);

		let statuses: Vec<SyncStatus> = h
			.store
			.load()
			.await
			.unwrap()
			.iter()
			.map(|o| o.sync_status)
			.collect();
		assert_eq!(
			statuses,
			vec![SyncStatus::Synced, SyncStatus::Failed, SyncStatus::Synced]
		);
	}

	#[tokio::test]
	async fn test_unconfirmed_result_marks_failed() {
		let h = harness(Behavior::Unconfirmed);
		let order = h.engine.create("Widget", dec("1")).await.unwrap();
		h.engine.sync_pending().await;
		assert_eq!(
			h.engine.state().find(&order.id).unwrap().sync_status,
			SyncStatus::Failed
		);
	}

	#[tokio::test]
	async fn test_sync_with_nothing_pending_is_noop() {
		let h = harness(Behavior::Succeed);
		assert_eq!(h.engine.sync_pending().await, SyncOutcome::NothingPending);

		h.engine.create("Widget", dec("1")).await.unwrap();
		h.engine.sync_pending().await;

		let before = h.engine.state().snapshot();
		let writes = h.faults.writes.load(Ordering::SeqCst);
		let mut rx = h.engine.state().subscribe();

		assert_eq!(h.engine.sync_pending().await, SyncOutcome::NothingPending);
		assert_eq!(h.engine.state().snapshot(), before);
		assert_eq!(h.faults.writes.load(Ordering::SeqCst), writes);
		assert!(!rx.has_changed().unwrap());
	}

	#[tokio::test(start_paused = true)]
	async fn test_second_sync_while_in_flight_is_noop() {
		let h = harness_with(Behavior::Succeed, Duration::from_millis(500), true);
		h.engine.create("first", dec("1")).await.unwrap();
		h.engine.create("second", dec("2")).await.unwrap();

		let engine = h.engine.clone();
		let batch = tokio::spawn(async move { engine.sync_pending().await });
		tokio::task::yield_now().await;

		assert!(h.engine.state().snapshot().is_syncing);
		assert_eq!(h.engine.sync_pending().await, SyncOutcome::AlreadySyncing);

		let outcome = batch.await.unwrap();
		assert!(matches!(outcome, SyncOutcome::Completed(ref r) if r.synced.len() == 2));
		assert_eq!(h.adapter.calls(), vec!["first", "second"]);
		assert_eq!(h.adapter.max_in_flight.load(Ordering::SeqCst), 1);
		assert!(!h.engine.state().snapshot().is_syncing);
	}

	#[tokio::test(start_paused = true)]
	async fn test_records_created_mid_batch_wait_for_next_batch() {
		let h = harness_with(Behavior::Succeed, Duration::from_millis(500), true);
		let first = h.engine.create("first", dec("1")).await.unwrap();

		let engine = h.engine.clone();
		let batch = tokio::spawn(async move { engine.sync_pending().await });
		tokio::task::yield_now().await;

		let late = h.engine.create("late", dec("2")).await.unwrap();
		let outcome = batch.await.unwrap();
		assert_eq!(
			outcome,
			SyncOutcome::Completed(SyncReport {
				synced: vec![first.id.clone()],
				failed: vec![],
			})
		);

		let durable = h.store.load().await.unwrap();
		assert_eq!(durable.len(), 2);
		assert_eq!(durable[0].sync_status, SyncStatus::Synced);
		assert_eq!(durable[1].id, late.id);
		assert_eq!(durable[1].sync_status, SyncStatus::Pending);
	}

	#[tokio::test(start_paused = true)]
	async fn test_reload_mid_batch_keeps_sync_results() {
		let h = harness_with(Behavior::Succeed, Duration::from_millis(500), true);
		h.engine.create("a", dec("1")).await.unwrap();
		h.engine.create("b", dec("2")).await.unwrap();

		let engine = h.engine.clone();
		let batch = tokio::spawn(async move { engine.sync_pending().await });
		tokio::time::sleep(Duration::from_millis(600)).await;

		// "a" is confirmed in memory but still pending on disk.
		h.engine.load_all().await;
		assert!(matches!(batch.await.unwrap(), SyncOutcome::Completed(ref r) if r.synced.len() == 2));

		let live = h.engine.state().snapshot().items;
		assert!(live.iter().all(|o| o.sync_status == SyncStatus::Synced));
		assert_eq!(h.store.load().await.unwrap(), live);
	}

	#[tokio::test(start_paused = true)]
	async fn test_edit_during_batch_is_not_restored_over() {
		let h = harness_with(Behavior::Fail, Duration::from_millis(500), true);
		let order = h.engine.create("a", dec("1")).await.unwrap();
		h.engine.create("b", dec("2")).await.unwrap();

		let engine = h.engine.clone();
		let batch = tokio::spawn(async move { engine.sync_pending().await });
		tokio::time::sleep(Duration::from_millis(600)).await;

		let edited = h.engine.update(&order.id, "a2", dec("3")).await.unwrap();
		batch.await.unwrap();

		assert_eq!(h.engine.state().find(&order.id), Some(edited));
	}

	#[tokio::test]
	async fn test_amounts_that_cannot_be_stored_are_rejected() {
		let h = harness(Behavior::Succeed);
		assert_eq!(
			h.engine.create("Big", Decimal::MAX).await,
			Err(OrderError::Validation(ValidationError::AmountTooPrecise))
		);
		assert_eq!(
			h.engine.create("Widget", dec("0.1234567890123456789")).await,
			Err(OrderError::Validation(ValidationError::AmountTooPrecise))
		);

		let order = h.engine.create("Widget", dec("1234567.89")).await.unwrap();
		assert_eq!(h.store.load().await.unwrap(), vec![order]);
		assert!(h.engine.unpersisted_ids().await.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_hanging_adapter_times_out_as_failure() {
		let h = harness_with(Behavior::Succeed, Duration::from_secs(3600), true);
		let order = h.engine.create("Widget", dec("1")).await.unwrap();

		let outcome = h.engine.sync_pending().await;
		assert_eq!(
			outcome,
			SyncOutcome::Completed(SyncReport {
				synced: vec![],
				failed: vec![order.id.clone()],
			})
		);
	}

	#[tokio::test]
	async fn test_concurrent_creates_are_all_persisted() {
		let h = harness(Behavior::Succeed);
		let (a, b, c, d) = tokio::join!(
			h.engine.create("a", dec("1")),
			h.engine.create("b", dec("2")),
			h.engine.create("c", dec("3")),
			h.engine.create("d", dec("4")),
		);
		let mut ids: Vec<String> = [a, b, c, d].into_iter().map(|r| r.unwrap().id).collect();
		ids.sort();

		let mut durable: Vec<String> = h
			.store
			.load()
			.await
			.unwrap()
			.into_iter()
			.map(|o| o.id)
			.collect();
		durable.sort();
		assert_eq!(durable, ids);
	}

	#[tokio::test]
	async fn test_failed_write_keeps_live_record_and_recovers() {
		let h = harness(Behavior::Succeed);
		let mut events = h.engine.event_bus().subscribe();

		h.faults.fail_writes.store(true, Ordering::SeqCst);
		let lost = h.engine.create("lost", dec("1")).await.unwrap();
		assert_eq!(h.engine.state().find(&lost.id), Some(lost.clone()));
		assert_eq!(h.engine.unpersisted_ids().await, vec![lost.id.clone()]);
		assert!(h.store.load().await.unwrap().is_empty());

		assert!(matches!(events.recv().await.unwrap(), OrderEvent::Created { .. }));
		assert!(matches!(
			events.recv().await.unwrap(),
			OrderEvent::PersistFailed { ref operation, .. } if operation == "create"
		));

		h.faults.fail_writes.store(false, Ordering::SeqCst);
		let next = h.engine.create("next", dec("2")).await.unwrap();
		let durable: Vec<String> = h
			.store
			.load()
			.await
			.unwrap()
			.into_iter()
			.map(|o| o.id)
			.collect();
		assert_eq!(durable, vec![next.id, lost.id]);
		assert!(h.engine.unpersisted_ids().await.is_empty());
	}

	#[tokio::test]
	async fn test_failed_edit_is_carried_by_next_write() {
		let h = harness(Behavior::Succeed);
		let order = h.engine.create("Widget", dec("1")).await.unwrap();

		h.faults.fail_writes.store(true, Ordering::SeqCst);
		let edited = h
			.engine
			.update(&order.id, "Edited", dec("2"))
			.await
			.unwrap();
		assert_eq!(h.store.load().await.unwrap(), vec![order.clone()]);

		h.faults.fail_writes.store(false, Ordering::SeqCst);
		let other = h.engine.create("Other", dec("3")).await.unwrap();
		assert_eq!(h.store.load().await.unwrap(), vec![edited, other]);
	}

	#[tokio::test]
	async fn test_failed_sync_write_still_records_sync_time() {
		let h = harness(Behavior::Succeed);
		let order = h.engine.create("Widget", dec("1")).await.unwrap();

		h.faults.fail_writes.store(true, Ordering::SeqCst);
		h.engine.sync_pending().await;

		let state = h.engine.state().snapshot();
		assert_eq!(state.find(&order.id).unwrap().sync_status, SyncStatus::Synced);
		assert!(state.last_sync_time.is_some());
		assert!(!state.is_syncing);
		assert_eq!(h.engine.unpersisted_ids().await, vec![order.id.clone()]);
		assert_eq!(
			h.store.load().await.unwrap()[0].sync_status,
			SyncStatus::Pending
		);
	}

	#[tokio::test]
	async fn test_load_all_replaces_live_state() {
		let h = harness(Behavior::Succeed);
		let order = h.engine.create("Widget", dec("1")).await.unwrap();

		let other = SyncEngine::new(
			h.store.clone(),
			Arc::new(SyncService::new(
				Box::new(h.adapter.clone()),
				Duration::from_secs(30),
			)),
			EventBus::new(8),
			true,
		);
		other.load_all().await;

		let state = other.state().snapshot();
		assert_eq!(state.items, vec![order]);
		assert!(!state.is_loading);
	}

	#[tokio::test]
	async fn test_load_failure_keeps_prior_state() {
		let h = harness(Behavior::Succeed);
		let order = h.engine.create("Widget", dec("1")).await.unwrap();

		h.faults.fail_reads.store(true, Ordering::SeqCst);
		h.engine.load_all().await;

		let state = h.engine.state().snapshot();
		assert_eq!(state.items, vec![order]);
		assert!(!state.is_loading);
	}

	#[tokio::test]
	async fn test_load_all_flushes_unpersisted_records() {
		let h = harness(Behavior::Succeed);
		h.faults.fail_writes.store(true, Ordering::SeqCst);
		let order = h.engine.create("Widget", dec("1")).await.unwrap();

		// Flush fails too: the live record survives the reload.
		h.engine.load_all().await;
		assert_eq!(h.engine.state().snapshot().items, vec![order.clone()]);
		assert_eq!(h.engine.unpersisted_ids().await, vec![order.id.clone()]);

		h.faults.fail_writes.store(false, Ordering::SeqCst);
		h.engine.load_all().await;
		assert_eq!(h.store.load().await.unwrap(), vec![order.clone()]);
		assert_eq!(h.engine.state().snapshot().items, vec![order]);
		assert!(h.engine.unpersisted_ids().await.is_empty());
	}

	#[tokio::test]
	async fn test_clear_all() {
		let h = harness(Behavior::Succeed);
		h.engine.create("Widget", dec("1")).await.unwrap();
		h.engine.clear_all().await.unwrap();
		assert!(h.engine.state().snapshot().items.is_empty());
		assert!(h.store.load().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_connectivity_triggers_sync() {
		let h = harness(Behavior::Succeed);
		assert_eq!(h.engine.on_connectivity_change(Some(true)).await, None);

		h.engine.create("Widget", dec("1")).await.unwrap();
		assert_eq!(h.engine.on_connectivity_change(None).await, None);
		assert_eq!(h.engine.on_connectivity_change(Some(false)).await, None);
		assert!(h.adapter.calls().is_empty());

		assert!(matches!(
			h.engine.on_connectivity_change(Some(true)).await,
			Some(SyncOutcome::Completed(_))
		));
	}

	#[tokio::test]
	async fn test_auto_sync_disabled() {
		let h = harness_with(Behavior::Succeed, Duration::ZERO, false);
		h.engine.create("Widget", dec("1")).await.unwrap();
		assert_eq!(h.engine.on_connectivity_change(Some(true)).await, None);
		assert!(h.adapter.calls().is_empty());
	}

	#[tokio::test]
	async fn test_refresh() {
		let h = harness(Behavior::Succeed);
		let order = h.engine.create("Widget", dec("1")).await.unwrap();

		assert_eq!(h.engine.refresh(false).await, None);
		assert!(h.adapter.calls().is_empty());

		let outcome = h.engine.refresh(true).await;
		assert!(matches!(outcome, Some(SyncOutcome::Completed(ref r)) if r.synced == vec![order.id.clone()]));
	}

	#[tokio::test]
	async fn test_run_syncs_when_online() {
		let h = harness(Behavior::Succeed);
		let (tx, rx) = watch::channel(Some(false));
		let engine = h.engine.clone();
		let runner = tokio::spawn(async move { engine.run(rx).await });

		let first = h.engine.create("first", dec("1")).await.unwrap();
		tokio::task::yield_now().await;
		assert!(h.adapter.calls().is_empty());

		let mut state = h.engine.state().subscribe();
		tx.send(Some(true)).unwrap();
		tokio::time::timeout(
			Duration::from_secs(5),
			state.wait_for(|s| s.find(&first.id).is_some_and(|o| o.sync_status == SyncStatus::Synced)),
		)
		.await
		.unwrap()
		.unwrap();

		// New pending records are picked up while online.
		let second = h.engine.create("second", dec("2")).await.unwrap();
		tokio::time::timeout(
			Duration::from_secs(5),
			state.wait_for(|s| s.find(&second.id).is_some_and(|o| o.sync_status == SyncStatus::Synced)),
		)
		.await
		.unwrap()
		.unwrap();

		drop(tx);
		tokio::time::timeout(Duration::from_secs(5), runner)
			.await
			.unwrap()
			.unwrap();
	}

	#[tokio::test]
	async fn test_events_follow_lifecycle() {
		let h = harness(Behavior::Succeed);
		let mut events = h.engine.event_bus().subscribe();
		let order = h.engine.create("Widget", dec("1")).await.unwrap();
		h.engine.sync_pending().await;

		assert!(matches!(events.recv().await.unwrap(), OrderEvent::Created { .. }));
		assert_eq!(
			events.recv().await.unwrap(),
			OrderEvent::SyncStarted { batch_size: 1 }
		);
		assert_eq!(
			events.recv().await.unwrap(),
			OrderEvent::StatusChanged {
				order_id: order.id.clone(),
				from: SyncStatus::Pending,
				to: SyncStatus::Synced,
			}
		);
		assert_eq!(
			events.recv().await.unwrap(),
			OrderEvent::SyncCompleted {
				synced: 1,
				failed: 0
			}
		);
	}
}
