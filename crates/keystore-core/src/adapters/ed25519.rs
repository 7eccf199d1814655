// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ed25519 key pairs identified by the SHA-256 of their public key.

use async_trait::async_trait;
use ed25519_dalek::{SigningKey, SECRET_KEY_LENGTH};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::fingerprint;
use crate::adapter::SecretAdapter;
use crate::error::AdapterError;
use crate::record::SecretRecord;

/// A hex-encoded Ed25519 key pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
	pub id: String,
	pub public_key: String,
	pub private_key: String,
}

impl KeyPair {
	fn from_signing_key(signing_key: &SigningKey) -> Self {
		let public_key = signing_key.verifying_key().to_bytes();
		Self {
			id: fingerprint(&public_key),
			public_key: hex::encode(public_key),
			private_key: hex::encode(signing_key.to_bytes()),
		}
	}

	/// Reconstruct the signing key. Fails if the private key is not 32 hex bytes.
	pub fn signing_key(&self) -> Result<SigningKey, AdapterError> {
		let bytes = Zeroizing::new(
			hex::decode(&self.private_key).map_err(|e| AdapterError::Serialization(format!("private key: {e}")))?,
		);
		let seed: &[u8; SECRET_KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
			AdapterError::Serialization(format!("private key must be {SECRET_KEY_LENGTH} bytes"))
		})?;
		Ok(SigningKey::from_bytes(seed))
	}
}

impl std::fmt::Debug for KeyPair {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KeyPair")
			.field("id", &self.id)
			.field("public_key", &self.public_key)
			.field("private_key", &"[REDACTED]")
			.finish()
	}
}

/// Generates Ed25519 key pairs and stores the 32-byte secret key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Adapter;

impl Ed25519Adapter {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl SecretAdapter for Ed25519Adapter {
	type Value = KeyPair;

	async fn persist(&self, value: Option<KeyPair>) -> Result<Option<SecretRecord>, AdapterError> {
		let signing_key = match value {
			Some(pair) => {
				let signing_key = pair.signing_key()?;
				let derived = KeyPair::from_signing_key(&signing_key);
				if derived.id != pair.id {
					return Err(AdapterError::Serialization(
						"key pair id does not match its public key".to_string(),
					));
				}
				signing_key
			}
			None => {
				let mut seed = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
				OsRng.fill_bytes(&mut seed[..]);
				SigningKey::from_bytes(&seed)
			}
		};

		let id = fingerprint(&signing_key.verifying_key().to_bytes());
		Ok(Some(SecretRecord::new(id, signing_key.to_bytes().to_vec())))
	}

	async fn hydrate(&self, payload: &[u8]) -> Result<KeyPair, AdapterError> {
		let seed: &[u8; SECRET_KEY_LENGTH] = payload.try_into().map_err(|_| {
			AdapterError::Hydration(format!(
				"expected {SECRET_KEY_LENGTH} byte key, got {} bytes",
				payload.len()
			))
		})?;
		Ok(KeyPair::from_signing_key(&SigningKey::from_bytes(seed)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ed25519_dalek::{Signer, Verifier};

	#[tokio::test]
	async fn generated_pair_id_is_public_key_hash() {
		let adapter = Ed25519Adapter::new();
		let record = adapter.persist(None).await.unwrap().unwrap();
		let pair = adapter.hydrate(&record.payload).await.unwrap();

		let public_key = hex::decode(&pair.public_key).unwrap();
		assert_eq!(pair.id, fingerprint(&public_key));
		assert_eq!(pair.id, record.id);
	}

	#[tokio::test]
	async fn hydrated_pair_signs_and_verifies() {
		let adapter = Ed25519Adapter::new();
		let record = adapter.persist(None).await.unwrap().unwrap();
		let pair = adapter.hydrate(&record.payload).await.unwrap();

		let signing_key = pair.signing_key().unwrap();
		let signature = signing_key.sign(b"rotate me");
		assert!(signing_key.verifying_key().verify(b"rotate me", &signature).is_ok());
	}

	#[tokio::test]
	async fn tampered_id_is_rejected() {
		let adapter = Ed25519Adapter::new();
		let record = adapter.persist(None).await.unwrap().unwrap();
		let mut pair = adapter.hydrate(&record.payload).await.unwrap();
		pair.id = "0".repeat(64);

		assert!(matches!(
			adapter.persist(Some(pair)).await,
			Err(AdapterError::Serialization(_))
		));
	}

	#[tokio::test]
	async fn short_payload_fails_hydration() {
		assert!(matches!(
			Ed25519Adapter::new().hydrate(&[1, 2, 3]).await,
			Err(AdapterError::Hydration(_))
		));
	}

	#[test]
	fn debug_redacts_private_key() {
		let pair = KeyPair::from_signing_key(&SigningKey::from_bytes(&[7u8; 32]));
		let debug = format!("{pair:?}");
		assert!(!debug.contains(&pair.private_key));
		assert!(debug.contains("[REDACTED]"));
	}
}
