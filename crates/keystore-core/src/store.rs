// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Type-erased store interface and the name → store registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

use crate::adapter::SecretAdapter;
use crate::error::Result;
use crate::memory::MemoryStore;

/// A secret store seen through JSON values.
///
/// This is the view the registry and the sync server work with; each
/// implementation converts to and from its adapter's typed value.
#[async_trait]
pub trait KeyStore: Send + Sync {
	/// Bring the store to its first version. Idempotent.
	async fn initialize(&self) -> Result<()> {
		self.secret().await.map(|_| ())
	}

	async fn secret(&self) -> Result<Value>;

	/// Store `secret`, or generate a fresh value when `None`.
	async fn set_secret(&self, secret: Option<Value>) -> Result<Value>;

	async fn rotate_secret(&self) -> Result<Value> {
		self.set_secret(None).await
	}

	async fn restore_secret(&self, id: &str) -> Result<Value>;

	/// Every value activated from now on, in activation order. No update is
	/// skipped however slowly the stream is consumed.
	fn updates(&self) -> BoxStream<'static, Value>;

	/// Release timers and other resources owned by the store.
	async fn close(&self) {}
}

#[async_trait]
impl<A: SecretAdapter> KeyStore for MemoryStore<A> {
	async fn initialize(&self) -> Result<()> {
		MemoryStore::initialize(self).await
	}

	async fn secret(&self) -> Result<Value> {
		Ok(serde_json::to_value(self.get().await?)?)
	}

	async fn set_secret(&self, secret: Option<Value>) -> Result<Value> {
		let secret = secret
			.map(serde_json::from_value::<A::Value>)
			.transpose()?;
		Ok(serde_json::to_value(self.set(secret).await?)?)
	}

	async fn rotate_secret(&self) -> Result<Value> {
		Ok(serde_json::to_value(self.rotate().await?)?)
	}

	async fn restore_secret(&self, id: &str) -> Result<Value> {
		Ok(serde_json::to_value(self.restore(id).await?)?)
	}

	fn updates(&self) -> BoxStream<'static, Value> {
		UnboundedReceiverStream::new(self.listen())
			.filter_map(|secret| async move {
				match serde_json::to_value(secret) {
					Ok(value) => Some(value),
					Err(e) => {
						warn!(error = %e, "failed to encode secret update");
						None
					}
				}
			})
			.boxed()
	}

	async fn close(&self) {
		MemoryStore::close(self).await;
	}
}

/// Named stores, fixed once the server starts.
#[derive(Default)]
pub struct StoreRegistry {
	stores: Vec<(String, Arc<dyn KeyStore>)>,
	index: HashMap<String, usize>,
}

impl StoreRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_store(mut self, name: impl Into<String>, store: impl KeyStore + 'static) -> Self {
		self.insert(name, Arc::new(store));
		self
	}

	/// Register `store` under `name`, replacing any previous registration.
	pub fn insert(&mut self, name: impl Into<String>, store: Arc<dyn KeyStore>) {
		let name = name.into();
		match self.index.get(&name) {
			Some(&slot) => {
				warn!(name = %name, "replacing registered secret store");
				self.stores[slot].1 = store;
			}
			None => {
				self.index.insert(name.clone(), self.stores.len());
				self.stores.push((name, store));
			}
		}
	}

	pub fn get(&self, name: &str) -> Option<Arc<dyn KeyStore>> {
		self
			.index
			.get(name)
			.map(|&slot| Arc::clone(&self.stores[slot].1))
	}

	/// Stores in registration order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn KeyStore>)> {
		self
			.stores
			.iter()
			.map(|(name, store)| (name.as_str(), store))
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.stores.iter().map(|(name, _)| name.as_str())
	}

	pub fn len(&self) -> usize {
		self.stores.len()
	}

	pub fn is_empty(&self) -> bool {
		self.stores.is_empty()
	}

	/// Initialize every store, failing on the first error.
	pub async fn initialize_all(&self) -> Result<()> {
		for (name, store) in &self.stores {
			store.initialize().await?;
			info!(name = %name, "secret store ready");
		}
		Ok(())
	}

	pub async fn close_all(&self) {
		for (_, store) in &self.stores {
			store.close().await;
		}
	}
}

impl fmt::Debug for StoreRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("StoreRegistry")
			.field("names", &self.names().collect::<Vec<_>>())
			.finish()
	}
}
