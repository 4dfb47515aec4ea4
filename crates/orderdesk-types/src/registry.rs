//! Registry trait for self-registering implementations.
//!
//! This module provides the base trait that pluggable backends implement to
//! register themselves with their configuration name and factory function.

/// Base trait for implementation registries.
///
/// Each implementation module (storage backends, sync adapters) provides a
/// Registry struct that implements this trait, declaring the name it is
/// configured under and the factory that builds it.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This should match the key used in the TOML configuration, for example:
	/// - "file" for storage.implementations.file
	/// - "simulated" for sync.implementations.simulated
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
