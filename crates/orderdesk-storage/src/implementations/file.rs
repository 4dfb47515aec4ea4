//! File-based storage backend.
//!
//! Each key is stored as one file under a base directory. Writes go to a
//! temporary file that is then renamed over the target, so a reader never
//! observes a partially written value.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use orderdesk_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SchemaError};
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

/// Directory used when `storage_path` is not configured.
const DEFAULT_STORAGE_PATH: &str = "./data/storage";

/// File-based storage implementation.
///
/// This implementation stores data as JSON files on the filesystem,
/// providing simple persistence without requiring external dependencies.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage instance rooted at the given directory.
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Converts a storage key to a filesystem-safe file path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', '\\', ':'], "_");
		self.base_path.join(format!("{}.json", safe_key))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);

		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		// Write atomically by writing to temp file then renaming.
		// Each writer gets its own temp file, even across processes.
		let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		if let Err(e) = fs::rename(&temp_path, &path).await {
			if let Err(cleanup) = fs::remove_file(&temp_path).await {
				tracing::debug!("Failed to remove temp file {:?}: {}", temp_path, cleanup);
			}
			return Err(StorageError::Backend(e.to_string()));
		}

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		fs::try_exists(self.get_file_path(key))
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(path) if path.trim().is_empty() => {
							Err("storage_path cannot be empty".to_string())
						},
						_ => Ok(()),
					}
				}),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_set_get_delete() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().join("nested"));

		let key = "orders:collection";
		assert!(matches!(
			storage.get_bytes(key).await,
			Err(StorageError::NotFound)
		));
		assert!(!storage.exists(key).await.unwrap());

		storage.set_bytes(key, b"[1]".to_vec()).await.unwrap();
		assert_eq!(storage.get_bytes(key).await.unwrap(), b"[1]".to_vec());
		assert!(dir.path().join("nested/orders_collection.json").exists());

		storage.set_bytes(key, b"[1,2]".to_vec()).await.unwrap();
		assert_eq!(storage.get_bytes(key).await.unwrap(), b"[1,2]".to_vec());
		assert_eq!(std::fs::read_dir(dir.path().join("nested")).unwrap().count(), 1);

		storage.delete(key).await.unwrap();
		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());
	}

	#[tokio::test]
	async fn test_concurrent_writers_do_not_share_temp_file() {
		let dir = TempDir::new().unwrap();
		let first = FileStorage::new(dir.path().to_path_buf());
		let second = FileStorage::new(dir.path().to_path_buf());
		let key = "orders:collection";

		for _ in 0..20 {
			let (a, b) = tokio::join!(
				first.set_bytes(key, b"[1]".to_vec()),
				second.set_bytes(key, b"[2]".to_vec()),
			);
			a.unwrap();
			b.unwrap();
			let stored = first.get_bytes(key).await.unwrap();
			assert!(stored == b"[1]".to_vec() || stored == b"[2]".to_vec());
		}
		assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
	}

	#[tokio::test]
	async fn test_data_survives_new_instance() {
		let dir = TempDir::new().unwrap();
		FileStorage::new(dir.path().to_path_buf())
			.set_bytes("orders:collection", b"[]".to_vec())
			.await
			.unwrap();

		let reopened = FileStorage::new(dir.path().to_path_buf());
		assert_eq!(
			reopened.get_bytes("orders:collection").await.unwrap(),
			b"[]".to_vec()
		);
	}

	#[test]
	fn test_factory_validates_config() {
		let config: toml::Value = toml::from_str("storage_path = \"\"").unwrap();
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));

		let config: toml::Value = toml::from_str("storage_path = 7").unwrap();
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));

		let config: toml::Value = toml::from_str("storage_path = \"/tmp/orders\"").unwrap();
		assert!(create_storage(&config).is_ok());
	}
}
