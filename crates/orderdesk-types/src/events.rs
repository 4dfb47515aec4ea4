//! Event types published by the sync engine.
//!
//! Events describe state transitions as they happen so that presentation
//! code can react without polling the state container.

use crate::{Order, SyncStatus};
use serde::{Deserialize, Serialize};

/// Events emitted by the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OrderEvent {
	/// The durable collection has been loaded into memory.
	Loaded { count: usize },
	/// A new order has been created locally.
	Created { order: Order },
	/// An order has been edited locally.
	Updated { order: Order },
	/// An order's sync status changed.
	StatusChanged {
		order_id: String,
		from: SyncStatus,
		to: SyncStatus,
	},
	/// A sync batch has started.
	SyncStarted { batch_size: usize },
	/// A sync batch has finished.
	SyncCompleted { synced: usize, failed: usize },
	/// Writing the durable collection failed; the live state is ahead of storage.
	PersistFailed { operation: String, error: String },
}
