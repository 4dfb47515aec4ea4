//! Configuration schema validation.
//!
//! Storage backends and sync adapters receive their settings as raw TOML
//! tables. Each one describes the table it accepts with a [`Schema`], and the
//! factory validates the table before constructing the implementation.

use thiserror::Error;

/// Errors produced when a TOML table does not match its schema.
#[derive(Debug, Error)]
pub enum SchemaError {
	/// Error that occurs when a required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// Error that occurs when a field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// Error that occurs when field type is incorrect.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Represents the type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	/// A string value.
	String,
	/// An integer value with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	/// A float value with optional inclusive bounds. Integers are accepted.
	Float { min: Option<f64>, max: Option<f64> },
	/// A boolean value (true/false).
	Boolean,
}

/// Type alias for field validator functions.
///
/// Validators run after the type check and return an error message if the
/// value is unacceptable.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// Represents a field in a configuration schema.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	/// Creates a new field with the given name and type.
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a custom validator to this field.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}
}

/// Defines a validation schema for a TOML table.
///
/// A schema consists of required fields that must be present and optional
/// fields that may be present. Unknown keys are ignored.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	/// Creates a new schema with required and optional fields.
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	///
	/// Fails if the value is not a table, if a required field is missing, if
	/// any present field has the wrong type or is out of bounds, or if a
	/// custom validator rejects it.
	pub fn validate(&self, config: &toml::Value) -> Result<(), SchemaError> {
		let table = config.as_table().ok_or_else(|| SchemaError::TypeMismatch {
			field: "root".to_string(),
			expected: "table".to_string(),
			actual: config.type_str().to_string(),
		})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| SchemaError::MissingField(field.name.clone()))?;
			check_field(field, value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				check_field(field, value)?;
			}
		}

		Ok(())
	}
}

fn check_field(field: &Field, value: &toml::Value) -> Result<(), SchemaError> {
	validate_field_type(&field.name, value, &field.field_type)?;

	if let Some(validator) = &field.validator {
		validator(value).map_err(|message| SchemaError::InvalidValue {
			field: field.name.clone(),
			message,
		})?;
	}

	Ok(())
}

fn type_mismatch(field_name: &str, expected: &str, value: &toml::Value) -> SchemaError {
	SchemaError::TypeMismatch {
		field: field_name.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn out_of_range(field_name: &str, message: String) -> SchemaError {
	SchemaError::InvalidValue {
		field: field_name.to_string(),
		message,
	}
}

/// Validates that a value matches the expected field type and bounds.
fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), SchemaError> {
	match expected_type {
		FieldType::String => {
			if !value.is_str() {
				return Err(type_mismatch(field_name, "string", value));
			}
		},
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| type_mismatch(field_name, "integer", value))?;

			if let Some(min_val) = min {
				if int_val < *min_val {
					return Err(out_of_range(
						field_name,
						format!("Value {} is less than minimum {}", int_val, min_val),
					));
				}
			}
			if let Some(max_val) = max {
				if int_val > *max_val {
					return Err(out_of_range(
						field_name,
						format!("Value {} is greater than maximum {}", int_val, max_val),
					));
				}
			}
		},
		FieldType::Float { min, max } => {
			let float_val = value
				.as_float()
				.or_else(|| value.as_integer().map(|i| i as f64))
				.ok_or_else(|| type_mismatch(field_name, "float", value))?;

			if let Some(min_val) = min {
				if float_val < *min_val {
					return Err(out_of_range(
						field_name,
						format!("Value {} is less than minimum {}", float_val, min_val),
					));
				}
			}
			if let Some(max_val) = max {
				if float_val > *max_val {
					return Err(out_of_range(
						field_name,
						format!("Value {} is greater than maximum {}", float_val, max_val),
					));
				}
			}
		},
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(type_mismatch(field_name, "boolean", value));
			}
		},
	}

	Ok(())
}

/// Trait defining a configuration schema that can validate TOML values.
///
/// Every storage backend and sync adapter exposes one so that configuration
/// can be checked before anything is constructed.
pub trait ConfigSchema: Send + Sync {
	/// Validates a TOML configuration value against this schema.
	fn validate(&self, config: &toml::Value) -> Result<(), SchemaError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(input: &str) -> toml::Value {
		toml::from_str(input).unwrap()
	}

	#[test]
	fn test_required_field_missing() {
		let schema = Schema::new(vec![Field::new("storage_path", FieldType::String)], vec![]);
		let result = schema.validate(&parse(""));
		assert!(matches!(result, Err(SchemaError::MissingField(f)) if f == "storage_path"));
	}

	#[test]
	fn test_type_mismatch() {
		let schema = Schema::new(vec![], vec![Field::new("delay_ms", FieldType::Integer {
			min: Some(0),
			max: None,
		})]);
		let result = schema.validate(&parse("delay_ms = \"slow\""));
		assert!(matches!(result, Err(SchemaError::TypeMismatch { .. })));
	}

	#[test]
	fn test_float_bounds_accept_integers() {
		let schema = Schema::new(vec![], vec![Field::new("failure_rate", FieldType::Float {
			min: Some(0.0),
			max: Some(1.0),
		})]);
		assert!(schema.validate(&parse("failure_rate = 0.25")).is_ok());
		assert!(schema.validate(&parse("failure_rate = 1")).is_ok());
		let result = schema.validate(&parse("failure_rate = 1.5"));
		assert!(matches!(result, Err(SchemaError::InvalidValue { field, .. }) if field == "failure_rate"));
	}

	#[test]
	fn test_custom_validator() {
		let schema = Schema::new(vec![Field::new("storage_path", FieldType::String)
			.with_validator(|v| match v.as_str() {
				Some("") => Err("must not be empty".to_string()),
				_ => Ok(()),
			})], vec![]);
		let result = schema.validate(&parse("storage_path = \"\""));
		assert!(
			matches!(result, Err(SchemaError::InvalidValue { message, .. }) if message == "must not be empty")
		);
	}
}
