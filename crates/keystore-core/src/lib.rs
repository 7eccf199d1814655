// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Versioned secret stores for the keystore sync service.
//!
//! A secret is any domain value put under rotation. A [`SecretAdapter`] turns
//! the value into a [`SecretRecord`] (adapter-chosen id plus opaque bytes) and
//! back; a [`MemoryStore`] keeps the current record and a retention-bounded
//! history of superseded ones so they can be restored by id.
//!
//! # Example
//!
//! ```no_run
//! use keystore_core::{Ed25519Adapter, MemoryStore, MemoryStoreOptions, Retention};
//! use std::time::Duration;
//!
//! # async fn example() -> keystore_core::Result<()> {
//! let store = MemoryStore::new(
//! 	Ed25519Adapter::new(),
//! 	MemoryStoreOptions::default().with_ttl(Retention::For(Duration::from_secs(86_400))),
//! );
//!
//! let original = store.get().await?;
//! store.rotate().await?;
//! let restored = store.restore(&original.id).await?;
//! assert_eq!(restored, original);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod adapters;
pub mod error;
pub mod hub;
pub mod memory;
pub mod protocol;
pub mod record;
pub mod retention;
pub mod store;

pub use adapter::SecretAdapter;
pub use adapters::{Ed25519Adapter, JsonAdapter, KeyPair, SymmetricKey, SymmetricKeyAdapter};
pub use error::{AdapterError, KeyStoreError, ProtocolError, Result};
pub use hub::UpdateHub;
pub use memory::{MemoryStore, MemoryStoreOptions};
pub use protocol::{Method, Notification, Request, Response, ServerFrame};
pub use record::SecretRecord;
pub use retention::Retention;
pub use store::{KeyStore, StoreRegistry};
