// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Every built-in adapter hydrates what it persists.

use keystore_core::{Ed25519Adapter, JsonAdapter, SecretAdapter, SymmetricKeyAdapter};
use proptest::prelude::*;
use serde_json::{json, Value};

#[tokio::test]
async fn ed25519_generated_pairs_roundtrip() {
	let adapter = Ed25519Adapter::new();
	for _ in 0..8 {
		let record = adapter.persist(None).await.unwrap().unwrap();
		let pair = adapter.hydrate(&record.payload).await.unwrap();

		let again = adapter.persist(Some(pair.clone())).await.unwrap().unwrap();
		assert_eq!(again.id, record.id);
		assert_eq!(adapter.hydrate(&again.payload).await.unwrap(), pair);
	}
}

#[tokio::test]
async fn symmetric_generated_keys_roundtrip() {
	let adapter = SymmetricKeyAdapter::new();
	for _ in 0..8 {
		let record = adapter.persist(None).await.unwrap().unwrap();
		let key = adapter.hydrate(&record.payload).await.unwrap();

		let again = adapter.persist(Some(key.clone())).await.unwrap().unwrap();
		assert_eq!(again.id, record.id);
		assert_eq!(adapter.hydrate(&again.payload).await.unwrap(), key);
	}
}

proptest! {
	#[test]
	fn json_values_roundtrip(
		id in "[a-zA-Z0-9_-]{1,24}",
		address in "0x[0-9a-f]{40}",
		nonce in any::<u32>(),
		tags in proptest::collection::vec("[a-z]{1,8}", 0..4),
	) {
		let value = json!({
			"id": id,
			"address": address,
			"nonce": nonce,
			"tags": tags,
		});

		let rt = tokio::runtime::Runtime::new().unwrap();
		rt.block_on(async {
			let adapter = JsonAdapter::<Value>::default();
			let record = adapter.persist(Some(value.clone())).await.unwrap().unwrap();
			assert_eq!(record.id, id);
			assert_eq!(adapter.hydrate(&record.payload).await.unwrap(), value);
		});
	}

	#[test]
	fn symmetric_keys_from_any_material_roundtrip(material in proptest::collection::vec(any::<u8>(), 1..64)) {
		let rt = tokio::runtime::Runtime::new().unwrap();
		rt.block_on(async {
			let adapter = SymmetricKeyAdapter::new();
			let key = adapter.hydrate(&material).await.unwrap();
			let record = adapter.persist(Some(key.clone())).await.unwrap().unwrap();
			assert_eq!(record.payload.as_slice(), material.as_slice());
			assert_eq!(adapter.hydrate(&record.payload).await.unwrap(), key);
		});
	}
}
