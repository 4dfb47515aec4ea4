//! Remote sync module for the order desk.
//!
//! This module handles confirming locally created orders with the remote
//! order service. The transport is abstracted behind [`SyncInterface`]; the
//! [`SyncService`] wraps the configured implementation and guarantees every
//! call resolves in bounded time.

use async_trait::async_trait;
use orderdesk_types::{truncate_id, ConfigSchema, ImplementationRegistry, Order};
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod simulated;
}

/// Errors that can occur while syncing an order.
#[derive(Debug, Error)]
pub enum SyncError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The remote side did not answer within the configured timeout.
	#[error("Sync timed out after {0:?}")]
	Timeout(Duration),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for remote sync adapters.
///
/// An adapter takes an order in any status and either confirms it with the
/// remote side, returning a copy marked `SYNCED` with a refreshed
/// `updated_at`, or fails. Every call is independently fallible.
#[async_trait]
pub trait SyncInterface: Send + Sync {
	/// Returns the configuration schema for this adapter.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Attempts to confirm one order with the remote side.
	async fn attempt_sync(&self, order: &Order) -> Result<Order, SyncError>;
}

/// Type alias for sync adapter factory functions.
pub type SyncFactory = fn(&toml::Value) -> Result<Box<dyn SyncInterface>, SyncError>;

/// Registry trait for sync adapter implementations.
pub trait SyncRegistry: ImplementationRegistry<Factory = SyncFactory> {}

/// Get all registered sync adapter implementations.
pub fn get_all_implementations() -> Vec<(&'static str, SyncFactory)> {
	use implementations::simulated;

	vec![(simulated::Registry::NAME, simulated::Registry::factory())]
}

/// Service that sends orders to the remote side through the configured adapter.
pub struct SyncService {
	/// The adapter performing the remote call.
	adapter: Box<dyn SyncInterface>,
	/// Upper bound for a single call.
	timeout: Duration,
}

impl SyncService {
	/// Creates a new SyncService with the given adapter and per-call timeout.
	pub fn new(adapter: Box<dyn SyncInterface>, timeout: Duration) -> Self {
		Self { adapter, timeout }
	}

	/// Syncs one order, failing with [`SyncError::Timeout`] if the adapter
	/// does not resolve within the configured timeout.
	pub async fn attempt_sync(&self, order: &Order) -> Result<Order, SyncError> {
		match tokio::time::timeout(self.timeout, self.adapter.attempt_sync(order)).await {
			Ok(result) => result,
			Err(_) => {
				tracing::warn!(
					order_id = %truncate_id(&order.id),
					timeout = ?self.timeout,
					"Sync attempt timed out"
				);
				Err(SyncError::Timeout(self.timeout))
			},
		}
	}
}
