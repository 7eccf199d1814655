// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed, memoizing handle for one remote secret.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{self, BoxFuture, FutureExt, Shared};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::KeyStoreClient;
use crate::error::Result;

const UPDATE_CHANNEL_CAPACITY: usize = 16;

type SecretFuture<T> = Shared<BoxFuture<'static, Result<T>>>;
type Slot<T> = Arc<Mutex<Memo<T>>>;

struct Memo<T> {
	current: Option<SecretFuture<T>>,
	/// Bumped by every local set/rotate/restore.
	calls: u64,
}

/// One remote secret, decoded as `T`.
///
/// The first [`secret`](Self::secret) call fetches the value; later calls
/// share that result. Pushes from the server and this handle's own
/// `set`/`rotate`/`restore` calls replace it, so once primed the handle
/// answers without a round trip. A local call that succeeds becomes the
/// current value unless a newer local call has started since. A failed fetch
/// is forgotten and retried on the next call.
pub struct RemoteKeyStore<T> {
	name: String,
	client: KeyStoreClient,
	secret: Slot<T>,
	updates: broadcast::Sender<T>,
	listener: JoinHandle<()>,
}

impl<T> RemoteKeyStore<T>
where
	T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
	pub(crate) fn new(client: KeyStoreClient, name: impl Into<String>) -> Self {
		let name = name.into();
		let secret: Slot<T> = Arc::new(Mutex::new(Memo { current: None, calls: 0 }));
		let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

		let listener = tokio::spawn(listen(
			name.clone(),
			client.subscribe(&name),
			Arc::clone(&secret),
			updates.clone(),
		));

		Self {
			name,
			client,
			secret,
			updates,
			listener,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub async fn secret(&self) -> Result<T> {
		let pending = {
			let mut memo = lock(&self.secret);
			match memo.current.as_ref() {
				Some(pending) => pending.clone(),
				None => {
					let client = self.client.clone();
					let name = self.name.clone();
					let pending = async move { decode(client.get(&name).await?) }.boxed().shared();
					memo.current = Some(pending.clone());
					pending
				}
			}
		};
		self.settle(pending, None).await
	}

	pub async fn set_secret(&self, secret: T) -> Result<T> {
		let value = serde_json::to_value(secret)?;
		let client = self.client.clone();
		let name = self.name.clone();
		self
			.replace(async move { decode(client.set(&name, Some(value)).await?) })
			.await
	}

	pub async fn rotate_secret(&self) -> Result<T> {
		let client = self.client.clone();
		let name = self.name.clone();
		self
			.replace(async move { decode(client.rotate(&name).await?) })
			.await
	}

	/// Make version `id` current again and return it.
	///
	/// The server only acknowledges a restore, so the value is fetched
	/// afterwards.
	pub async fn restore_secret(&self, id: &str) -> Result<T> {
		let client = self.client.clone();
		let name = self.name.clone();
		let id = id.to_string();
		self
			.replace(async move {
				client.restore(&name, &id).await?;
				decode(client.get(&name).await?)
			})
			.await
	}

	/// Every new value of this secret, whoever changed it.
	pub fn subscribe(&self) -> broadcast::Receiver<T> {
		self.updates.subscribe()
	}

	async fn replace<F>(&self, call: F) -> Result<T>
	where
		F: Future<Output = Result<T>> + Send + 'static,
	{
		let pending = call.boxed().shared();
		let call_id = {
			let mut memo = lock(&self.secret);
			memo.calls += 1;
			memo.current = Some(pending.clone());
			memo.calls
		};
		self.settle(pending, Some(call_id)).await
	}

	async fn settle(&self, pending: SecretFuture<T>, call_id: Option<u64>) -> Result<T> {
		let result = pending.clone().await;
		let mut memo = lock(&self.secret);
		match &result {
			Ok(secret) => {
				if call_id.is_some_and(|id| id == memo.calls) {
					memo.current = Some(ready(secret.clone()));
				}
			}
			Err(e) => {
				debug!(name = %self.name, error = %e, "forgetting failed secret");
				if memo.current.as_ref().is_some_and(|current| current.ptr_eq(&pending)) {
					memo.current = None;
				}
			}
		}
		result
	}
}

impl<T> Drop for RemoteKeyStore<T> {
	fn drop(&mut self) {
		self.listener.abort();
	}
}

impl<T> fmt::Debug for RemoteKeyStore<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RemoteKeyStore").field("name", &self.name).finish()
	}
}

fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
	slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn ready<T: Clone + Send + Sync + 'static>(secret: T) -> SecretFuture<T> {
	future::ready(Ok(secret)).boxed().shared()
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
	Ok(serde_json::from_value(value)?)
}

/// Keep the memoized value current with the server's pushes.
async fn listen<T>(name: String, mut pushes: broadcast::Receiver<Value>, slot: Slot<T>, updates: broadcast::Sender<T>)
where
	T: DeserializeOwned + Clone + Send + Sync + 'static,
{
	loop {
		match pushes.recv().await {
			Ok(value) => match decode::<T>(value) {
				Ok(secret) => {
					lock(&slot).current = Some(ready(secret.clone()));
					let _ = updates.send(secret);
				}
				Err(e) => warn!(name = %name, error = %e, "failed to decode pushed secret"),
			},
			Err(RecvError::Lagged(skipped)) => warn!(name = %name, skipped, "secret listener lagged"),
			Err(RecvError::Closed) => break,
		}
	}
}
