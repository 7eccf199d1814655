// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::fingerprint;
use crate::adapter::SecretAdapter;
use crate::error::AdapterError;
use crate::record::SecretRecord;

/// Length in bytes of generated keys.
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// A random key, base64 encoded, identified by its SHA-256.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
	pub id: String,
	pub key: String,
}

impl SymmetricKey {
	fn from_bytes(bytes: &[u8]) -> Self {
		Self {
			id: fingerprint(bytes),
			key: STANDARD.encode(bytes),
		}
	}

	/// The raw key bytes.
	pub fn bytes(&self) -> Result<Zeroizing<Vec<u8>>, AdapterError> {
		STANDARD
			.decode(&self.key)
			.map(Zeroizing::new)
			.map_err(|e| AdapterError::Serialization(format!("key: {e}")))
	}
}

impl std::fmt::Debug for SymmetricKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SymmetricKey")
			.field("id", &self.id)
			.field("key", &"[REDACTED]")
			.finish()
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SymmetricKeyAdapter;

impl SymmetricKeyAdapter {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl SecretAdapter for SymmetricKeyAdapter {
	type Value = SymmetricKey;

	async fn persist(&self, value: Option<SymmetricKey>) -> Result<Option<SecretRecord>, AdapterError> {
		let bytes = match value {
			Some(key) => {
				let bytes = key.bytes()?;
				if bytes.is_empty() {
					return Err(AdapterError::Serialization("key is empty".to_string()));
				}
				if fingerprint(&bytes) != key.id {
					return Err(AdapterError::Serialization(
						"key id does not match key material".to_string(),
					));
				}
				bytes
			}
			None => {
				let mut bytes = Zeroizing::new(vec![0u8; SYMMETRIC_KEY_LEN]);
				OsRng.fill_bytes(bytes.as_mut_slice());
				bytes
			}
		};

		Ok(Some(SecretRecord::new(fingerprint(&bytes), bytes.to_vec())))
	}

	async fn hydrate(&self, payload: &[u8]) -> Result<SymmetricKey, AdapterError> {
		if payload.is_empty() {
			return Err(AdapterError::Hydration("empty key payload".to_string()));
		}
		Ok(SymmetricKey::from_bytes(payload))
	}
}
