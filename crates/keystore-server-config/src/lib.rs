// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the keystore sync server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`KEYSTORE_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use keystore_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Serving {} stores on {}", config.stores.len(), config.socket_addr());
//! ```

pub mod env;
pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use env::{load_secret_env, SecretEnvError};
pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{debug, info, warn};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub logging: LoggingConfig,
	pub stores: Vec<StoreConfig>,
	pub auth: AuthConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`KEYSTORE_SERVER_*`)
/// 2. Config file (`/etc/keystore/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let auth = layer.auth.unwrap_or_default().finalize();
	let stores = layer
		.stores
		.unwrap_or_default()
		.into_iter()
		.enumerate()
		.map(|(index, store)| store.finalize(index))
		.collect::<Result<Vec<_>, _>>()?;

	validate_stores(&stores)?;

	if auth.credentials.is_empty() {
		warn!("no credentials configured; every request will be denied");
	}

	info!(
		host = %http.host,
		port = http.port,
		stores = stores.len(),
		credentials = auth.credentials.len(),
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		logging,
		stores,
		auth,
	})
}

/// Validate cross-store rules.
fn validate_stores(stores: &[StoreConfig]) -> Result<(), ConfigError> {
	if stores.is_empty() {
		return Err(ConfigError::Validation(
			"at least one [[stores]] entry is required".to_string(),
		));
	}

	let mut seen = HashSet::new();
	for store in stores {
		if !seen.insert(store.name.as_str()) {
			return Err(ConfigError::Validation(format!(
				"store name {} is configured more than once",
				store.name
			)));
		}
		if !store.adapter.can_generate() && store.initial.is_none() {
			return Err(ConfigError::Validation(format!(
				"store {} uses the json adapter and needs an initial value",
				store.name
			)));
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn store(name: &str, adapter: AdapterKind) -> StoreConfigLayer {
		StoreConfigLayer {
			name: Some(name.to_string()),
			adapter: Some(adapter),
			..Default::default()
		}
	}

	#[test]
	fn test_no_stores_is_rejected() {
		let err = finalize(ServerConfigLayer::default()).unwrap_err();
		assert!(err.to_string().contains("at least one"));
	}

	#[test]
	fn test_duplicate_names_are_rejected() {
		let layer = ServerConfigLayer {
			stores: Some(vec![
				store("KEYPAIR1", AdapterKind::Ed25519),
				store("KEYPAIR1", AdapterKind::Symmetric),
			]),
			..Default::default()
		};
		let err = finalize(layer).unwrap_err();
		assert!(err.to_string().contains("more than once"));
	}

	#[test]
	fn test_json_store_without_initial_is_rejected() {
		let layer = ServerConfigLayer {
			stores: Some(vec![store("ACCOUNT1", AdapterKind::Json)]),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_socket_addr() {
		let config = ServerConfig {
			http: HttpConfig {
				host: "127.0.0.1".to_string(),
				port: 9000,
			},
			..Default::default()
		};
		assert_eq!(config.socket_addr(), "127.0.0.1:9000");
	}
}
