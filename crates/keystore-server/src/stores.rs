// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Building the store registry from configuration.

use std::sync::Arc;

use keystore_core::{
	Ed25519Adapter, JsonAdapter, KeyStore, MemoryStore, MemoryStoreOptions, Retention, SecretAdapter,
	StoreRegistry, SymmetricKeyAdapter,
};
use keystore_server_config::{AdapterKind, ConfigError, StoreConfig};
use serde_json::Value;
use tracing::info;

use crate::error::Result;

/// One [`MemoryStore`] per configured store, in configuration order.
pub fn build_registry(stores: &[StoreConfig]) -> Result<StoreRegistry> {
	let mut registry = StoreRegistry::new();
	for config in stores {
		let store: Arc<dyn KeyStore> = match config.adapter {
			AdapterKind::Json => memory_store(JsonAdapter::<Value>::new(&config.id_field), config)?,
			AdapterKind::Ed25519 => memory_store(Ed25519Adapter::new(), config)?,
			AdapterKind::Symmetric => memory_store(SymmetricKeyAdapter::new(), config)?,
		};
		info!(
			name = %config.name,
			adapter = ?config.adapter,
			ttl_secs = config.ttl_secs,
			"registered secret store"
		);
		registry.insert(config.name.clone(), store);
	}
	Ok(registry)
}

fn memory_store<A: SecretAdapter>(adapter: A, config: &StoreConfig) -> Result<Arc<dyn KeyStore>> {
	let mut options = MemoryStoreOptions::default().with_ttl(Retention::from_ttl_secs(config.ttl_secs));
	if let Some(initial) = &config.initial {
		let initial = serde_json::from_value::<A::Value>(initial.clone()).map_err(|e| ConfigError::InvalidValue {
			key: format!("stores.{}.initial", config.name),
			message: e.to_string(),
		})?;
		options = options.with_initial(initial);
	}
	Ok(Arc::new(MemoryStore::new(adapter, options)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ServerError;
	use serde_json::json;

	fn config(name: &str, adapter: AdapterKind, initial: Option<Value>) -> StoreConfig {
		StoreConfig {
			name: name.to_string(),
			adapter,
			ttl_secs: 0,
			initial,
			id_field: "address".to_string(),
		}
	}

	#[tokio::test]
	async fn builds_each_adapter_kind() {
		let registry = build_registry(&[
			config("ACCOUNT1", AdapterKind::Json, Some(json!({ "address": "0xabc" }))),
			config("KEYPAIR1", AdapterKind::Ed25519, None),
			config("AES1", AdapterKind::Symmetric, None),
		])
		.unwrap();

		registry.initialize_all().await.unwrap();
		assert_eq!(registry.names().collect::<Vec<_>>(), vec!["ACCOUNT1", "KEYPAIR1", "AES1"]);
		assert_eq!(
			registry.get("ACCOUNT1").unwrap().secret().await.unwrap(),
			json!({ "address": "0xabc" })
		);
	}

	#[test]
	fn initial_of_wrong_shape_is_a_config_error() {
		let err = build_registry(&[config("KEYPAIR1", AdapterKind::Ed25519, Some(json!("nope")))]).unwrap_err();
		assert!(matches!(
			err,
			ServerError::Config(ConfigError::InvalidValue { ref key, .. }) if key == "stores.KEYPAIR1.initial"
		));
	}
}
