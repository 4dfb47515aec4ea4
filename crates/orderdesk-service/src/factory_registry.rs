//! Factory registry for order desk implementations.
//!
//! Collects every storage backend and sync adapter the workspace ships so the
//! engine can be built from whichever names the configuration selects.

use orderdesk_config::Config;
use orderdesk_core::{EngineFactories, SyncEngine, SyncEngineBuilder};
use orderdesk_storage::StorageFactory;
use orderdesk_sync::SyncFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub sync: HashMap<String, SyncFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			sync: HashMap::new(),
		}
	}

	/// Register a storage implementation
	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	/// Register a sync adapter implementation
	pub fn register_sync(&mut self, name: impl Into<String>, factory: SyncFactory) {
		self.sync.insert(name.into(), factory);
	}
}

// Global registry instance
static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Get the global factory registry, registering every implementation on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in orderdesk_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in orderdesk_sync::get_all_implementations() {
			tracing::debug!("Registering sync implementation: {}", name);
			registry.register_sync(name, factory);
		}

		registry
	})
}

/// Macro to build factories from config implementations
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Build the sync engine using the registry and config
pub fn build_engine_from_config(config: Config) -> Result<SyncEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories =
		build_factories!(registry, config.storage.implementations, storage, "storage");
	let sync_factories = build_factories!(registry, config.sync.implementations, sync, "sync");

	let factories = EngineFactories {
		storage_factories,
		sync_factories,
	};

	Ok(SyncEngineBuilder::new(config).build(factories)?)
}
