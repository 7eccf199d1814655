// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Live connections, keyed by a server-assigned id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use keystore_common_secret::SecretString;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub type ConnectionId = u64;

/// Outbound text frames queued per connection before the socket writer drops
/// it as a slow consumer.
pub const OUTBOUND_QUEUE_SIZE: usize = 256;

/// Cheap handle to one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
	id: ConnectionId,
	credential: Arc<SecretString>,
	tx: mpsc::Sender<String>,
	close: CancellationToken,
}

impl ConnectionHandle {
	pub fn id(&self) -> ConnectionId {
		self.id
	}

	pub fn credential(&self) -> &str {
		self.credential.expose()
	}

	/// Queue a frame, waiting for room. Returns false once the connection is gone.
	pub async fn send<T: Serialize>(&self, frame: &T) -> bool {
		let Some(text) = self.encode(frame) else {
			return false;
		};
		debug!(connection_id = self.id, "tx: {text}");
		self.tx.send(text).await.is_ok()
	}

	/// Queue a push without waiting. A connection that cannot keep up is closed.
	pub fn push(&self, text: &str) {
		match self.tx.try_send(text.to_string()) {
			Ok(()) => debug!(connection_id = self.id, "tx: {text}"),
			Err(mpsc::error::TrySendError::Full(_)) => {
				warn!(connection_id = self.id, "outbound queue full, closing connection");
				self.close();
			}
			Err(mpsc::error::TrySendError::Closed(_)) => {}
		}
	}

	pub fn close(&self) {
		self.close.cancel();
	}

	pub fn is_closed(&self) -> bool {
		self.close.is_cancelled()
	}

	/// Resolves once [`close`](Self::close) has been called on any clone.
	pub async fn closed(&self) {
		self.close.cancelled().await;
	}

	fn encode<T: Serialize>(&self, frame: &T) -> Option<String> {
		match serde_json::to_string(frame) {
			Ok(text) => Some(text),
			Err(e) => {
				error!(connection_id = self.id, error = %e, "failed to encode frame");
				None
			}
		}
	}
}

/// The active connection set.
///
/// Fan-out works on a [`snapshot`](Self::snapshot), so connections may come
/// and go while a notification is being delivered.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
	next_id: AtomicU64,
	connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&self, credential: SecretString, tx: mpsc::Sender<String>) -> ConnectionHandle {
		let handle = ConnectionHandle {
			id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
			credential: Arc::new(credential),
			tx,
			close: CancellationToken::new(),
		};
		self
			.connections
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(handle.id, handle.clone());
		handle
	}

	pub fn remove(&self, id: ConnectionId) -> Option<ConnectionHandle> {
		self
			.connections
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(&id)
	}

	pub fn snapshot(&self) -> Vec<ConnectionHandle> {
		self
			.connections
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.values()
			.cloned()
			.collect()
	}

	pub fn len(&self) -> usize {
		self.connections.read().unwrap_or_else(PoisonError::into_inner).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Ask every connection to close.
	pub fn close_all(&self) {
		for handle in self.snapshot() {
			handle.close();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn register_assigns_unique_ids() {
		let registry = ConnectionRegistry::new();
		let (tx, _rx) = mpsc::channel(4);
		let a = registry.register(SecretString::from("a"), tx.clone());
		let b = registry.register(SecretString::from("a"), tx);

		assert_ne!(a.id(), b.id());
		assert_eq!(registry.len(), 2);
	}

	#[test]
	fn remove_only_drops_that_connection() {
		let registry = ConnectionRegistry::new();
		let (tx, _rx) = mpsc::channel(4);
		let a = registry.register(SecretString::from("a"), tx.clone());
		let b = registry.register(SecretString::from("b"), tx);

		assert!(registry.remove(a.id()).is_some());
		assert!(registry.remove(a.id()).is_none());

		let remaining: Vec<_> = registry.snapshot().iter().map(ConnectionHandle::id).collect();
		assert_eq!(remaining, vec![b.id()]);
	}

	#[test]
	fn snapshot_survives_concurrent_removal() {
		let registry = ConnectionRegistry::new();
		let (tx, _rx) = mpsc::channel(4);
		let a = registry.register(SecretString::from("a"), tx);

		let snapshot = registry.snapshot();
		registry.remove(a.id());
		assert_eq!(snapshot.len(), 1);
		assert!(registry.is_empty());
	}

	#[tokio::test]
	async fn full_queue_closes_connection() {
		let registry = ConnectionRegistry::new();
		let (tx, _rx) = mpsc::channel(1);
		let handle = registry.register(SecretString::from("a"), tx);

		handle.push("one");
		assert!(!handle.is_closed());
		handle.push("two");
		assert!(handle.is_closed());
	}

	#[tokio::test]
	async fn send_fails_after_receiver_dropped() {
		let registry = ConnectionRegistry::new();
		let (tx, rx) = mpsc::channel(1);
		let handle = registry.register(SecretString::from("a"), tx);
		drop(rx);
		assert!(!handle.send(&serde_json::json!({"id": 1})).await);
	}

	#[test]
	fn debug_hides_credential() {
		let registry = ConnectionRegistry::new();
		let (tx, _rx) = mpsc::channel(1);
		let handle = registry.register(SecretString::from("AUTH_KEY"), tx);
		assert!(!format!("{handle:?}").contains("AUTH_KEY"));
	}
}
