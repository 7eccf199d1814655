// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory versioned secret store.
//!
//! A [`MemoryStore`] owns the current version of one secret plus every
//! superseded version that is still inside its retention window. All
//! state-changing operations (the implicit initialization, `set`, `rotate`,
//! `restore`) are serialized on a transition lock, so version bookkeeping is
//! never observed half-applied. Reads only wait for initialization; while a
//! later transition is in flight they see the previous current value.
//!
//! ```text
//!   Uninitialized ──init──▶ Active(current_id, history)
//!                              │  ▲
//!                set/rotate/   │  │ hydrate → commit → emit update
//!                restore       └──┘
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::adapter::SecretAdapter;
use crate::error::{KeyStoreError, Result};
use crate::record::SecretRecord;
use crate::retention::Retention;

/// Capacity of the per-store update channel.
const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Options for a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryStoreOptions<T> {
	/// Retention of superseded versions.
	pub ttl: Retention,
	/// Seeds the first version instead of generating one.
	pub initial: Option<T>,
}

impl<T> Default for MemoryStoreOptions<T> {
	fn default() -> Self {
		Self {
			ttl: Retention::default(),
			initial: None,
		}
	}
}

impl<T> MemoryStoreOptions<T> {
	pub fn with_ttl(mut self, ttl: Retention) -> Self {
		self.ttl = ttl;
		self
	}

	pub fn with_initial(mut self, initial: T) -> Self {
		self.initial = Some(initial);
		self
	}
}

/// Versioned secret store backed by process memory.
pub struct MemoryStore<A: SecretAdapter> {
	inner: Arc<Inner<A>>,
}

impl<A: SecretAdapter> Clone for MemoryStore<A> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

struct Inner<A: SecretAdapter> {
	adapter: A,
	retention: Retention,
	initial: Option<A::Value>,
	transition: Mutex<()>,
	state: Mutex<State<A::Value>>,
	updates: broadcast::Sender<A::Value>,
	listeners: std::sync::Mutex<Vec<mpsc::UnboundedSender<A::Value>>>,
	closed: AtomicBool,
}

enum Lifecycle<T> {
	Uninitialized,
	Active { current_id: String, secret: T },
}

struct State<T> {
	lifecycle: Lifecycle<T>,
	history: HashMap<String, Version>,
	next_token: u64,
}

struct Version {
	payload: Zeroizing<Vec<u8>>,
	expiry: Option<Expiry>,
}

struct Expiry {
	token: u64,
	handle: JoinHandle<()>,
}

impl Version {
	fn new(payload: Zeroizing<Vec<u8>>) -> Self {
		Self {
			payload,
			expiry: None,
		}
	}

	fn cancel_expiry(&mut self) {
		if let Some(expiry) = self.expiry.take() {
			expiry.handle.abort();
		}
	}
}

impl<T> State<T> {
	fn current_id(&self) -> Option<&str> {
		match &self.lifecycle {
			Lifecycle::Active { current_id, .. } => Some(current_id),
			Lifecycle::Uninitialized => None,
		}
	}

	fn cancel_all(&mut self) {
		for version in self.history.values_mut() {
			version.cancel_expiry();
		}
	}
}

impl<A: SecretAdapter> MemoryStore<A> {
	/// Create a store. The first version is produced on first use or by an
	/// explicit [`initialize`](Self::initialize).
	pub fn new(adapter: A, options: MemoryStoreOptions<A::Value>) -> Self {
		let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
		Self {
			inner: Arc::new(Inner {
				adapter,
				retention: options.ttl,
				initial: options.initial,
				transition: Mutex::new(()),
				state: Mutex::new(State {
					lifecycle: Lifecycle::Uninitialized,
					history: HashMap::new(),
					next_token: 0,
				}),
				updates,
				listeners: std::sync::Mutex::new(Vec::new()),
				closed: AtomicBool::new(false),
			}),
		}
	}

	pub fn adapter(&self) -> &A {
		&self.inner.adapter
	}

	pub fn retention(&self) -> Retention {
		self.inner.retention
	}

	/// Persist the configured initial value, or generate one, unless the store
	/// is already active. Concurrent callers wait on the same initialization.
	pub async fn initialize(&self) -> Result<()> {
		self.check_open()?;
		if self.is_active().await {
			return Ok(());
		}

		let _transition = self.inner.transition.lock().await;
		self.check_open()?;
		if self.is_active().await {
			return Ok(());
		}

		let record = self
			.inner
			.adapter
			.persist(self.inner.initial.clone())
			.await?
			.ok_or(KeyStoreError::NoInitialSecret)?;
		let id = record.id.clone();
		self.apply_locked(record).await?;
		info!(id = %id, "secret store initialized");
		Ok(())
	}

	/// The current value, hydrated once per version.
	pub async fn get(&self) -> Result<A::Value> {
		self.initialize().await?;
		self.current().await
	}

	/// Store `secret` as the new current version, or generate one when `None`.
	pub async fn set(&self, secret: Option<A::Value>) -> Result<A::Value> {
		self.initialize().await?;
		let _transition = self.inner.transition.lock().await;
		self.check_open()?;

		match self.inner.adapter.persist(secret).await? {
			Some(record) => self.apply_locked(record).await,
			None => {
				debug!("adapter produced nothing to store");
				self.current().await
			}
		}
	}

	/// Generate and activate a brand-new version.
	pub async fn rotate(&self) -> Result<A::Value> {
		self.set(None).await
	}

	/// Reactivate a retained version by id.
	pub async fn restore(&self, id: &str) -> Result<A::Value> {
		self.initialize().await?;
		let _transition = self.inner.transition.lock().await;
		self.check_open()?;

		let payload = {
			let state = self.inner.state.lock().await;
			state.history.get(id).map(|version| version.payload.clone())
		};
		let payload = payload.ok_or_else(|| KeyStoreError::VersionNotFound { id: id.to_string() })?;

		self
			.apply_locked(SecretRecord {
				id: id.to_string(),
				payload,
			})
			.await
	}

	/// Id of the current version, if initialized.
	pub async fn current_id(&self) -> Option<String> {
		self.inner.state.lock().await.current_id().map(str::to_owned)
	}

	/// Ids of every retained version, including the current one.
	pub async fn versions(&self) -> Vec<String> {
		let state = self.inner.state.lock().await;
		let mut ids: Vec<String> = state.history.keys().cloned().collect();
		ids.sort();
		ids
	}

	/// Receive newly activated values. A receiver that falls more than a few
	/// updates behind lags and skips the oldest.
	pub fn subscribe(&self) -> broadcast::Receiver<A::Value> {
		self.inner.updates.subscribe()
	}

	/// Receive every newly activated value, in activation order, without
	/// dropping any. The listener is removed once its receiver is dropped.
	pub fn listen(&self) -> mpsc::UnboundedReceiver<A::Value> {
		let (tx, rx) = mpsc::unbounded_channel();
		self
			.inner
			.listeners
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push(tx);
		rx
	}

	/// Cancel every retention timer. Operations after close fail with
	/// [`KeyStoreError::Closed`].
	pub async fn close(&self) {
		let _transition = self.inner.transition.lock().await;
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		self.inner.state.lock().await.cancel_all();
		debug!("secret store closed");
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	fn check_open(&self) -> Result<()> {
		if self.is_closed() {
			return Err(KeyStoreError::Closed);
		}
		Ok(())
	}

	async fn is_active(&self) -> bool {
		self.inner.state.lock().await.current_id().is_some()
	}

	async fn current(&self) -> Result<A::Value> {
		match &self.inner.state.lock().await.lifecycle {
			Lifecycle::Active { secret, .. } => Ok(secret.clone()),
			Lifecycle::Uninitialized => Err(KeyStoreError::NoInitialSecret),
		}
	}

	/// Make `record` current. Caller holds the transition lock.
	async fn apply_locked(&self, record: SecretRecord) -> Result<A::Value> {
		// Hydrate first so an adapter failure leaves the state untouched.
		let secret = self.inner.adapter.hydrate(&record.payload).await?;
		let SecretRecord { id, payload } = record;

		let mut state = self.inner.state.lock().await;
		let previous = state.current_id().map(str::to_owned);

		let version = state
			.history
			.entry(id.clone())
			.or_insert_with(|| Version::new(Zeroizing::new(Vec::new())));
		version.cancel_expiry();
		version.payload = payload;

		if previous.as_deref() == Some(id.as_str()) {
			debug!(id = %id, "current secret version re-affirmed");
			state.lifecycle = Lifecycle::Active {
				current_id: id,
				secret: secret.clone(),
			};
			return Ok(secret);
		}

		if let Some(previous) = previous {
			self.retire(&mut state, previous);
		}
		state.lifecycle = Lifecycle::Active {
			current_id: id.clone(),
			secret: secret.clone(),
		};
		drop(state);

		debug!(id = %id, "secret version activated");
		self
			.inner
			.listeners
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.retain(|listener| listener.send(secret.clone()).is_ok());
		// Err only means there are no subscribers.
		let _ = self.inner.updates.send(secret.clone());
		Ok(secret)
	}

	/// Apply the retention policy to a version that just stopped being current.
	fn retire(&self, state: &mut State<A::Value>, id: String) {
		match self.inner.retention {
			Retention::Discard => {
				state.history.remove(&id);
				debug!(id = %id, "superseded secret version discarded");
			}
			Retention::Forever => {}
			Retention::For(ttl) => {
				let token = state.next_token;
				state.next_token += 1;

				let inner = Arc::downgrade(&self.inner);
				let evict_id = id.clone();
				let handle = tokio::spawn(async move {
					tokio::time::sleep(ttl).await;
					if let Some(inner) = inner.upgrade() {
						inner.evict(&evict_id, token).await;
					}
				});

				match state.history.get_mut(&id) {
					Some(version) => {
						version.cancel_expiry();
						version.expiry = Some(Expiry { token, handle });
					}
					None => handle.abort(),
				}
			}
		}
	}
}

impl<A: SecretAdapter> Inner<A> {
	async fn evict(&self, id: &str, token: u64) {
		let mut state = self.state.lock().await;
		if state.current_id() == Some(id) {
			return;
		}

		let armed = state
			.history
			.get(id)
			.and_then(|version| version.expiry.as_ref())
			.is_some_and(|expiry| expiry.token == token);
		if armed {
			state.history.remove(id);
			debug!(id = %id, "retained secret version expired");
		}
	}
}

impl<A: SecretAdapter> Drop for Inner<A> {
	fn drop(&mut self) {
		self.state.get_mut().cancel_all();
	}
}
