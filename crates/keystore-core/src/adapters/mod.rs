// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Built-in [`SecretAdapter`](crate::SecretAdapter) implementations.

mod ed25519;
mod json;
mod symmetric;

pub use ed25519::{Ed25519Adapter, KeyPair};
pub use json::{JsonAdapter, DEFAULT_ID_FIELD};
pub use symmetric::{SymmetricKey, SymmetricKeyAdapter, SYMMETRIC_KEY_LEN};

use sha2::{Digest, Sha256};

/// Hex SHA-256, the content-derived version id used by the key adapters.
pub(crate) fn fingerprint(bytes: &[u8]) -> String {
	hex::encode(Sha256::digest(bytes))
}
