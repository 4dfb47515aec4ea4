//! Durable order collection.
//!
//! All orders live in a single slot as one JSON array. Every operation works
//! on the whole collection: callers load it, change it, and save it back.

use crate::{StorageError, StorageService};
use orderdesk_types::{Order, StorageKey};
use std::sync::Arc;
use thiserror::Error;

/// Slot under the orders namespace that holds the collection.
const COLLECTION_SLOT: &str = "collection";

/// Errors from the durable order collection.
#[derive(Debug, Error)]
pub enum OrderStoreError {
	#[error("Failed to load orders from storage: {0}")]
	Read(String),
	#[error("Failed to save orders to storage: {0}")]
	Write(String),
	#[error("Failed to clear orders from storage: {0}")]
	Clear(String),
}

/// Whole-collection store for orders.
#[derive(Clone)]
pub struct OrderStore {
	storage: Arc<StorageService>,
}

impl OrderStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Loads every persisted order in stored order.
	///
	/// Returns an empty collection if nothing has been saved yet.
	pub async fn load(&self) -> Result<Vec<Order>, OrderStoreError> {
		match self
			.storage
			.retrieve(StorageKey::Orders.as_str(), COLLECTION_SLOT)
			.await
		{
			Ok(orders) => Ok(orders),
			Err(StorageError::NotFound) => Ok(Vec::new()),
			Err(e) => Err(OrderStoreError::Read(e.to_string())),
		}
	}

	/// Replaces the persisted collection.
	pub async fn save(&self, orders: &[Order]) -> Result<(), OrderStoreError> {
		self.storage
			.store(StorageKey::Orders.as_str(), COLLECTION_SLOT, orders)
			.await
			.map_err(|e| OrderStoreError::Write(e.to_string()))
	}

	/// Removes every persisted order.
	pub async fn clear(&self) -> Result<(), OrderStoreError> {
		self.storage
			.remove(StorageKey::Orders.as_str(), COLLECTION_SLOT)
			.await
			.map_err(|e| OrderStoreError::Clear(e.to_string()))
	}
}
