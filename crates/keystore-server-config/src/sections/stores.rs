// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Named secret stores served by the sync server.
//!
//! ```toml
//! [[stores]]
//! name = "KEYPAIR1"
//! adapter = "ed25519"
//! ttl_secs = 86400
//!
//! [[stores]]
//! name = "ACCOUNT1"
//! adapter = "json"
//! id_field = "address"
//! initial = { address = "0xabc", private_key = "0x01" }
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;

pub const DEFAULT_ID_FIELD: &str = "id";

/// Which built-in adapter backs a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
	/// Arbitrary JSON objects. Cannot generate, so needs an initial value.
	Json,
	Ed25519,
	Symmetric,
}

impl AdapterKind {
	pub fn can_generate(&self) -> bool {
		!matches!(self, AdapterKind::Json)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
	pub name: String,
	pub adapter: AdapterKind,
	/// Signed retention in seconds: `0` keeps nothing, negative keeps forever.
	pub ttl_secs: i64,
	pub initial: Option<Value>,
	pub id_field: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfigLayer {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub adapter: Option<AdapterKind>,
	#[serde(default)]
	pub ttl_secs: Option<i64>,
	#[serde(default)]
	pub initial: Option<Value>,
	#[serde(default)]
	pub id_field: Option<String>,
}

impl StoreConfigLayer {
	pub fn finalize(self, index: usize) -> Result<StoreConfig, ConfigError> {
		let name = self
			.name
			.map(|n| n.trim().to_string())
			.filter(|n| !n.is_empty())
			.ok_or_else(|| ConfigError::Validation(format!("stores[{index}]: name is required")))?;

		let adapter = self
			.adapter
			.ok_or_else(|| ConfigError::Validation(format!("store {name}: adapter is required")))?;

		Ok(StoreConfig {
			name,
			adapter,
			ttl_secs: self.ttl_secs.unwrap_or(0),
			initial: self.initial,
			id_field: self.id_field.unwrap_or_else(|| DEFAULT_ID_FIELD.to_string()),
		})
	}
}
