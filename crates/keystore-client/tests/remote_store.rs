// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed handles against a real keystore server.

use std::net::SocketAddr;
use std::time::Duration;

use keystore_client::{ClientConfig, ClientError, ConnectionState, KeyStoreClient};
use keystore_common_secret::SecretString;
use keystore_core::{
	Ed25519Adapter, JsonAdapter, KeyPair, MemoryStore, MemoryStoreOptions, Retention, StoreRegistry,
};
use keystore_server::{KeyStoreServer, StaticAuthenticator};
use keystore_server_config::CredentialRule;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::time::timeout;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Account {
	address: String,
}

struct Harness {
	addr: SocketAddr,
	_server: KeyStoreServer,
}

impl Harness {
	async fn start() -> Self {
		let registry = StoreRegistry::new()
			.with_store(
				"ACCOUNT1",
				MemoryStore::new(
					JsonAdapter::<Value>::new("address"),
					MemoryStoreOptions::default()
						.with_ttl(Retention::For(Duration::from_secs(86_400)))
						.with_initial(json!({ "address": "0x1" })),
				),
			)
			.with_store(
				"KEYPAIR1",
				MemoryStore::new(
					Ed25519Adapter::new(),
					MemoryStoreOptions::default().with_ttl(Retention::For(Duration::from_secs(86_400))),
				),
			);
		registry.initialize_all().await.unwrap();

		let authenticator = StaticAuthenticator::new(vec![CredentialRule::full_access(SecretString::from("AUTH_KEY"))]);
		let server = KeyStoreServer::new(registry, authenticator);
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let app = server.router();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});

		Self { addr, _server: server }
	}

	fn client(&self, credential: &str) -> KeyStoreClient {
		KeyStoreClient::new(ClientConfig::new(format!("ws://{}", self.addr), credential))
	}
}

#[tokio::test]
async fn rotate_then_restore_returns_original() {
	let harness = Harness::start().await;
	let client = harness.client("AUTH_KEY");
	let key_pair = client.key_store::<KeyPair>("KEYPAIR1");

	let original = key_pair.secret().await.unwrap();
	let rotated = key_pair.rotate_secret().await.unwrap();
	assert_ne!(rotated.id, original.id);
	assert!(key_pair.secret().await.unwrap() == rotated);

	let restored = key_pair.restore_secret(&original.id).await.unwrap();
	assert!(restored == original);
	assert!(key_pair.secret().await.unwrap() == original);

	client.disconnect();
}

#[tokio::test]
async fn handle_follows_changes_from_other_clients() {
	let harness = Harness::start().await;
	let writer = harness.client("AUTH_KEY");
	let reader = harness.client("AUTH_KEY");
	let writer_account = writer.key_store::<Account>("ACCOUNT1");
	let reader_account = reader.key_store::<Account>("ACCOUNT1");

	assert_eq!(reader_account.secret().await.unwrap().address, "0x1");
	let mut updates = reader_account.subscribe();

	let written = writer_account
		.set_secret(Account {
			address: "0x2".to_string(),
		})
		.await
		.unwrap();
	assert_eq!(written.address, "0x2");

	timeout(Duration::from_secs(5), async {
		loop {
			if updates.recv().await.unwrap() == written {
				break;
			}
		}
	})
	.await
	.unwrap();
	assert_eq!(reader_account.secret().await.unwrap(), written);
}

#[tokio::test]
async fn denied_credential_gets_forbidden() {
	let harness = Harness::start().await;
	let client = harness.client("WRONG");

	assert_eq!(client.get("ACCOUNT1").await, Err(ClientError::Forbidden));
	assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn unknown_store_is_not_found() {
	let harness = Harness::start().await;
	let client = harness.client("AUTH_KEY");
	let missing = client.key_store::<Value>("NOPE");

	assert_eq!(missing.secret().await, Err(ClientError::NotFound));
	// Failures are not memoized.
	assert_eq!(missing.secret().await, Err(ClientError::NotFound));
}

#[tokio::test]
async fn restore_of_unknown_version_is_a_remote_error() {
	let harness = Harness::start().await;
	let client = harness.client("AUTH_KEY");

	assert_eq!(
		client.restore("KEYPAIR1", "missing").await,
		Err(ClientError::Remote("secret missing not found".to_string()))
	);
}

#[tokio::test]
async fn wrong_type_is_a_decode_error() {
	let harness = Harness::start().await;
	let client = harness.client("AUTH_KEY");
	let as_account = client.key_store::<Account>("KEYPAIR1");

	assert!(matches!(as_account.secret().await, Err(ClientError::Decode(_))));
}
