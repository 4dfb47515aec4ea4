//! Simulated remote sync adapter.
//!
//! Stands in for the remote order service during development and testing.
//! Each call waits a fixed delay and then either confirms the order or fails
//! with a network error, with a configurable failure probability that can
//! also be changed at runtime.

use crate::{SyncError, SyncFactory, SyncInterface, SyncRegistry};
use async_trait::async_trait;
use chrono::Utc;
use orderdesk_types::{
	truncate_id, ConfigSchema, Field, FieldType, ImplementationRegistry, Order, Schema,
	SchemaError, SyncStatus,
};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const DEFAULT_DELAY_MS: u64 = 1000;

/// Simulated adapter with artificial latency and random failures.
pub struct SimulatedSync {
	delay: Duration,
	/// Failure probability stored as `f64` bits so it can be swapped at runtime.
	failure_rate: AtomicU64,
}

impl SimulatedSync {
	/// Creates a simulated adapter. `failure_rate` is clamped to `[0, 1]`.
	pub fn new(delay: Duration, failure_rate: f64) -> Self {
		Self {
			delay,
			failure_rate: AtomicU64::new(clamp_rate(failure_rate).to_bits()),
		}
	}

	pub fn failure_rate(&self) -> f64 {
		f64::from_bits(self.failure_rate.load(Ordering::Relaxed))
	}

	/// Changes the failure probability for subsequent calls.
	pub fn set_failure_rate(&self, failure_rate: f64) {
		self.failure_rate
			.store(clamp_rate(failure_rate).to_bits(), Ordering::Relaxed);
	}

	fn should_fail(&self) -> bool {
		let rate = self.failure_rate();
		rate > 0.0 && rand::thread_rng().gen_bool(rate)
	}
}

fn clamp_rate(rate: f64) -> f64 {
	if rate.is_nan() {
		0.0
	} else {
		rate.clamp(0.0, 1.0)
	}
}

#[async_trait]
impl SyncInterface for SimulatedSync {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(SimulatedSyncSchema)
	}

	async fn attempt_sync(&self, order: &Order) -> Result<Order, SyncError> {
		if !self.delay.is_zero() {
			tokio::time::sleep(self.delay).await;
		}

		if self.should_fail() {
			tracing::debug!(order_id = %truncate_id(&order.id), "Simulated sync failure");
			return Err(SyncError::Network("Failed to sync order".to_string()));
		}

		Ok(Order {
			sync_status: SyncStatus::Synced,
			updated_at: Some(Utc::now()),
			..order.clone()
		})
	}
}

/// Configuration schema for the simulated adapter.
pub struct SimulatedSyncSchema;

impl ConfigSchema for SimulatedSyncSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new(
					"delay_ms",
					FieldType::Integer {
						min: Some(0),
						max: Some(60_000),
					},
				),
				Field::new(
					"failure_rate",
					FieldType::Float {
						min: Some(0.0),
						max: Some(1.0),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create the simulated adapter from configuration.
///
/// Configuration parameters:
/// - `delay_ms`: Artificial latency per call (default: 1000)
/// - `failure_rate`: Probability in `[0, 1]` that a call fails (default: 0)
pub fn create_sync(config: &toml::Value) -> Result<Box<dyn SyncInterface>, SyncError> {
	SimulatedSyncSchema
		.validate(config)
		.map_err(|e| SyncError::Configuration(e.to_string()))?;

	let delay_ms = config
		.get("delay_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_DELAY_MS);
	let failure_rate = config
		.get("failure_rate")
		.and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
		.unwrap_or(0.0);

	Ok(Box::new(SimulatedSync::new(
		Duration::from_millis(delay_ms),
		failure_rate,
	)))
}

/// Registry for the simulated adapter.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "simulated";
	type Factory = SyncFactory;

	fn factory() -> Self::Factory {
		create_sync
	}
}

impl SyncRegistry for Registry {}
