// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::adapter::SecretAdapter;
use crate::error::AdapterError;
use crate::record::SecretRecord;

pub const DEFAULT_ID_FIELD: &str = "id";

type Generator<T> = Arc<dyn Fn() -> Result<T, AdapterError> + Send + Sync>;

/// Stores any JSON object, using one of its fields as the version id.
///
/// Without a generator, `persist(None)` stores nothing and rotation is a no-op.
pub struct JsonAdapter<T = Value> {
	id_field: String,
	generator: Option<Generator<T>>,
	_value: PhantomData<fn() -> T>,
}

impl<T> JsonAdapter<T> {
	pub fn new(id_field: impl Into<String>) -> Self {
		Self {
			id_field: id_field.into(),
			generator: None,
			_value: PhantomData,
		}
	}

	/// Produce fresh values for rotation.
	pub fn with_generator<F>(mut self, generator: F) -> Self
	where
		F: Fn() -> Result<T, AdapterError> + Send + Sync + 'static,
	{
		self.generator = Some(Arc::new(generator));
		self
	}

	pub fn id_field(&self) -> &str {
		&self.id_field
	}
}

impl<T> Default for JsonAdapter<T> {
	fn default() -> Self {
		Self::new(DEFAULT_ID_FIELD)
	}
}

impl<T> fmt::Debug for JsonAdapter<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("JsonAdapter")
			.field("id_field", &self.id_field)
			.field("has_generator", &self.generator.is_some())
			.finish()
	}
}

#[async_trait]
impl<T> SecretAdapter for JsonAdapter<T>
where
	T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
	type Value = T;

	async fn persist(&self, value: Option<T>) -> Result<Option<SecretRecord>, AdapterError> {
		let value = match (value, &self.generator) {
			(Some(value), _) => value,
			(None, Some(generate)) => generate()?,
			(None, None) => return Ok(None),
		};

		let json = serde_json::to_value(&value).map_err(|e| AdapterError::Serialization(e.to_string()))?;
		let id = match json.get(&self.id_field) {
			Some(Value::String(id)) => id.clone(),
			Some(Value::Number(id)) => id.to_string(),
			_ => {
				return Err(AdapterError::Serialization(format!(
					"value has no string or numeric `{}` field",
					self.id_field
				)))
			}
		};

		let payload = serde_json::to_vec(&json).map_err(|e| AdapterError::Serialization(e.to_string()))?;
		Ok(Some(SecretRecord::new(id, payload)))
	}

	async fn hydrate(&self, payload: &[u8]) -> Result<T, AdapterError> {
		serde_json::from_slice(payload).map_err(|e| AdapterError::Hydration(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::Deserialize;
	use serde_json::json;

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	struct Account {
		address: String,
		private_key: String,
	}

	#[tokio::test]
	async fn reads_id_from_configured_field() {
		let adapter = JsonAdapter::<Account>::new("address");
		let account = Account {
			address: "0xabc".to_string(),
			private_key: "0x01".to_string(),
		};

		let record = adapter.persist(Some(account.clone())).await.unwrap().unwrap();
		assert_eq!(record.id, "0xabc");
		assert_eq!(adapter.hydrate(&record.payload).await.unwrap(), account);
	}

	#[tokio::test]
	async fn numeric_ids_are_stringified() {
		let adapter = JsonAdapter::<Value>::default();
		let record = adapter.persist(Some(json!({"id": 42}))).await.unwrap().unwrap();
		assert_eq!(record.id, "42");
	}

	#[tokio::test]
	async fn missing_id_field_is_rejected() {
		let adapter = JsonAdapter::<Value>::default();
		let err = adapter.persist(Some(json!({"name": "x"}))).await.unwrap_err();
		assert!(matches!(err, AdapterError::Serialization(_)));
	}

	#[tokio::test]
	async fn generate_without_generator_stores_nothing() {
		let adapter = JsonAdapter::<Value>::default();
		assert!(adapter.persist(None).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn generator_errors_propagate() {
		let adapter = JsonAdapter::<Value>::default()
			.with_generator(|| Err(AdapterError::Generation("upstream down".to_string())));
		assert_eq!(
			adapter.persist(None).await.unwrap_err(),
			AdapterError::Generation("upstream down".to_string())
		);
	}

	#[tokio::test]
	async fn corrupt_payload_fails_hydration() {
		let adapter = JsonAdapter::<Value>::default();
		assert!(matches!(
			adapter.hydrate(b"{not json").await,
			Err(AdapterError::Hydration(_))
		));
	}
}
