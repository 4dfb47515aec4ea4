//! Builder pattern for constructing sync engines.
//!
//! Provides a flexible way to compose a SyncEngine from the configured
//! storage backend and sync adapter using factory functions.

use crate::engine::{event_bus::EventBus, SyncEngine};
use orderdesk_config::Config;
use orderdesk_storage::{OrderStore, StorageError, StorageInterface, StorageService};
use orderdesk_sync::{SyncError, SyncInterface, SyncService};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Number of unread events each event bus subscriber can fall behind by.
const EVENT_BUS_CAPACITY: usize = 1000;

/// Errors that can occur during sync engine construction.
///
/// These errors indicate problems with configuration or missing required components
/// when building a sync engine instance.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for the factory functions needed to build a SyncEngine.
///
/// Each factory takes the TOML table of one implementation and returns the
/// corresponding service implementation.
pub struct EngineFactories<SF, YF> {
	pub storage_factories: HashMap<String, SF>,
	pub sync_factories: HashMap<String, YF>,
}

/// Builder for constructing a SyncEngine with pluggable implementations.
pub struct SyncEngineBuilder {
	config: Config,
}

impl SyncEngineBuilder {
	/// Creates a new SyncEngineBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the SyncEngine using the primary storage and sync factories.
	pub fn build<SF, YF>(self, factories: EngineFactories<SF, YF>) -> Result<SyncEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		YF: Fn(&toml::Value) -> Result<Box<dyn SyncInterface>, SyncError>,
	{
		let storage_backend = create_primary(
			"storage",
			&self.config.storage.primary,
			&self.config.storage.implementations,
			&factories.storage_factories,
		)?;
		let store = OrderStore::new(Arc::new(StorageService::new(storage_backend)));

		let adapter = create_primary(
			"sync",
			&self.config.sync.primary,
			&self.config.sync.implementations,
			&factories.sync_factories,
		)?;
		let timeout = Duration::from_secs(self.config.sync.timeout_seconds);
		let sync = Arc::new(SyncService::new(adapter, timeout));

		tracing::info!(
			app_id = %self.config.app.id,
			timeout = ?timeout,
			auto_sync = self.config.sync.auto_sync,
			"Sync engine ready"
		);

		Ok(SyncEngine::new(
			store,
			sync,
			EventBus::new(EVENT_BUS_CAPACITY),
			self.config.sync.auto_sync,
		))
	}
}

/// Creates the primary implementation of one component.
///
/// Only the primary is instantiated; the others stay configured but unused.
fn create_primary<T: ?Sized, E: std::fmt::Display, F>(
	component: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
	factories: &HashMap<String, F>,
) -> Result<Box<T>, BuilderError>
where
	F: Fn(&toml::Value) -> Result<Box<T>, E>,
{
	let config = implementations.get(primary).ok_or_else(|| {
		BuilderError::Config(format!(
			"Primary {} '{}' has no configuration",
			component, primary
		))
	})?;
	let factory = factories.get(primary).ok_or_else(|| {
		BuilderError::MissingComponent(format!(
			"No {} implementation named '{}'",
			component, primary
		))
	})?;

	match factory(config) {
		Ok(implementation) => {
			tracing::info!(component, implementation = %primary, "Loaded");
			Ok(implementation)
		},
		Err(e) => {
			tracing::error!(
				component,
				implementation = %primary,
				error = %e,
				"Failed to create implementation"
			);
			Err(BuilderError::Config(format!(
				"Failed to create {} implementation '{}': {}",
				component, primary, e
			)))
		},
	}
}
