//! Configuration module for the order desk.
//!
//! This module provides structures and utilities for managing order desk
//! configuration. It supports loading configuration from TOML files and
//! validates that every referenced implementation is actually configured.

#[cfg(any(test, feature = "testing"))]
pub mod builders {
	pub mod config;
}

#[cfg(any(test, feature = "testing"))]
pub use builders::config::ConfigBuilder;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		let message = err.message().to_string();
		ConfigError::Parse(message)
	}
}

/// Main configuration structure for the order desk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Application identity.
	pub app: AppConfig,
	/// Configuration for the durable order store.
	pub storage: StorageConfig,
	/// Configuration for the remote sync adapter.
	pub sync: SyncConfig,
}

/// Configuration specific to the application instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
	/// Identifier of this installation, used in logs.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the remote sync adapter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
	/// Which adapter implementation to use.
	pub primary: String,
	/// Upper bound in seconds for a single sync attempt.
	/// Defaults to 30 seconds if not specified.
	#[serde(default = "default_sync_timeout_seconds")]
	pub timeout_seconds: u64,
	/// Whether pending orders are synced automatically when the device is online.
	#[serde(default = "default_auto_sync")]
	pub auto_sync: bool,
	/// Map of adapter implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

fn default_sync_timeout_seconds() -> u64 {
	30
}

fn default_auto_sync() -> bool {
	true
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024; // 1MB
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)));
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}

	result.push_str(&input[last_end..]);
	Ok(result)
}

impl Config {
	/// Loads configuration from a file, resolving environment variables.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path.as_ref()).await?;
		content.parse()
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// - Ensures the app id is not empty
	/// - Checks that the primary storage and sync implementations are configured
	/// - Keeps the sync timeout within sane bounds
	fn validate(&self) -> Result<(), ConfigError> {
		if self.app.id.trim().is_empty() {
			return Err(ConfigError::Validation("App ID cannot be empty".into()));
		}

		validate_primary("storage", &self.storage.primary, &self.storage.implementations)?;
		validate_primary("sync", &self.sync.primary, &self.sync.implementations)?;

		if self.sync.timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"Sync timeout_seconds must be greater than 0".into(),
			));
		}
		if self.sync.timeout_seconds > 3600 {
			return Err(ConfigError::Validation(
				"Sync timeout_seconds cannot exceed 3600 (1 hour)".into(),
			));
		}

		Ok(())
	}
}

fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
