// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use zeroize::Zeroizing;

/// One persisted version of a secret.
///
/// `id` is chosen by the adapter (content hash, remote version id, domain
/// identifier). The payload is the adapter's serialized form and is only ever
/// handed back to the same adapter's hydrator.
#[derive(Debug, Clone)]
pub struct SecretRecord {
	pub id: String,
	pub payload: Zeroizing<Vec<u8>>,
}

impl SecretRecord {
	pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
		Self {
			id: id.into(),
			payload: Zeroizing::new(payload.into()),
		}
	}
}
