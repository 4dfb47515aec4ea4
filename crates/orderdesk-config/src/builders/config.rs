//! Configuration builder for creating test and development configurations.
//!
//! This module provides utilities for constructing Config instances with
//! sensible defaults, particularly useful for testing scenarios.

use crate::{AppConfig, Config, StorageConfig, SyncConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to in-memory storage and an instant, never-failing simulated
/// adapter so tests stay fast and deterministic.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	app_id: String,
	storage_primary: String,
	storage_config: toml::Value,
	sync_primary: String,
	sync_config: toml::Value,
	timeout_seconds: u64,
	auto_sync: bool,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		let mut simulated = toml::map::Map::new();
		simulated.insert("delay_ms".to_string(), toml::Value::Integer(0));
		simulated.insert("failure_rate".to_string(), toml::Value::Float(0.0));

		Self {
			app_id: "test-desk".to_string(),
			storage_primary: "memory".to_string(),
			storage_config: toml::Value::Table(toml::map::Map::new()),
			sync_primary: "simulated".to_string(),
			sync_config: toml::Value::Table(simulated),
			timeout_seconds: 30,
			auto_sync: true,
		}
	}

	/// Sets the app ID.
	pub fn app_id(mut self, id: impl Into<String>) -> Self {
		self.app_id = id.into();
		self
	}

	/// Sets the primary storage implementation and its configuration.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.storage_primary = primary.into();
		self.storage_config = config;
		self
	}

	/// Sets the primary sync adapter and its configuration.
	pub fn sync(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.sync_primary = primary.into();
		self.sync_config = config;
		self
	}

	/// Sets the per-attempt sync timeout in seconds.
	pub fn timeout_seconds(mut self, timeout: u64) -> Self {
		self.timeout_seconds = timeout;
		self
	}

	/// Enables or disables automatic sync on connectivity changes.
	pub fn auto_sync(mut self, enabled: bool) -> Self {
		self.auto_sync = enabled;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		Config {
			app: AppConfig { id: self.app_id },
			storage: StorageConfig {
				implementations: HashMap::from([(
					self.storage_primary.clone(),
					self.storage_config,
				)]),
				primary: self.storage_primary,
			},
			sync: SyncConfig {
				implementations: HashMap::from([(self.sync_primary.clone(), self.sync_config)]),
				primary: self.sync_primary,
				timeout_seconds: self.timeout_seconds,
				auto_sync: self.auto_sync,
			},
		}
	}
}
