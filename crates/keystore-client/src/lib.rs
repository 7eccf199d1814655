// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client for the keystore sync server.
//!
//! A [`KeyStoreClient`] keeps one WebSocket open to the server, reconnecting
//! on failure and queueing requests while the socket is down.
//! [`RemoteKeyStore`] handles present each remote secret as a typed value
//! kept current by server pushes.
//!
//! ```no_run
//! use keystore_client::{ClientConfig, KeyStoreClient};
//! use keystore_core::KeyPair;
//!
//! # async fn example() -> keystore_client::Result<()> {
//! let client = KeyStoreClient::new(ClientConfig::new("ws://localhost:3000", "AUTH_KEY"));
//! let key_pair = client.key_store::<KeyPair>("KEYPAIR1");
//!
//! let original = key_pair.secret().await?;
//! key_pair.rotate_secret().await?;
//! key_pair.restore_secret(&original.id).await?;
//! assert!(key_pair.secret().await? == original);
//!
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handle;

pub use client::{ConnectionState, KeyStoreClient};
pub use config::{ClientConfig, ReconnectPolicy, DEFAULT_QUEUE_CAPACITY};
pub use error::{ClientError, Result};
pub use handle::RemoteKeyStore;
