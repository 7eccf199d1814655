// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read a key pair, rotate it, then restore the original.
//!
//! Expects a running `keystore-server` with a `KEYPAIR1` ed25519 store whose
//! ttl is non-zero:
//!
//! ```text
//! KEYSTORE_URL=ws://localhost:3000 KEYSTORE_CREDENTIAL=AUTH_KEY \
//!     cargo run -p keystore-client --example rotate_restore
//! ```

use anyhow::Context;
use keystore_client::{ClientConfig, KeyStoreClient};
use keystore_core::KeyPair;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
		.with(tracing_subscriber::fmt::layer())
		.init();

	let url = std::env::var("KEYSTORE_URL").unwrap_or_else(|_| "ws://localhost:3000".to_string());
	let credential = std::env::var("KEYSTORE_CREDENTIAL").context("KEYSTORE_CREDENTIAL must be set")?;

	let client = KeyStoreClient::new(ClientConfig::new(url, credential));
	let key_pair = client.key_store::<KeyPair>("KEYPAIR1");

	let mut updates = key_pair.subscribe();
	tokio::spawn(async move {
		while let Ok(secret) = updates.recv().await {
			tracing::info!(id = %secret.id, "KEYPAIR1 updated");
		}
	});

	let original = key_pair.secret().await?;
	tracing::info!(id = %original.id, "KEYPAIR1");

	let rotated = key_pair.rotate_secret().await?;
	tracing::info!(id = %rotated.id, "KEYPAIR1 after rotate");

	let restored = key_pair.restore_secret(&original.id).await?;
	tracing::info!(id = %restored.id, "KEYPAIR1 after restore");

	anyhow::ensure!(
		key_pair.secret().await? == original,
		"restored key pair does not match the original"
	);

	client.disconnect();
	Ok(())
}
