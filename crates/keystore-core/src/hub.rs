// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Publish/subscribe registry keyed by secret name.
//!
//! Each name gets its own broadcast channel, created on first subscribe.
//! Publishing to a name nobody subscribed to is a no-op.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::debug;

/// Default capacity of each per-name channel.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct UpdateHub<T> {
	capacity: usize,
	channels: RwLock<HashMap<String, broadcast::Sender<T>>>,
}

impl<T: Clone + Send + 'static> UpdateHub<T> {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			capacity,
			channels: RwLock::new(HashMap::new()),
		}
	}

	/// Subscribe to every value published under `name`.
	pub fn subscribe(&self, name: &str) -> broadcast::Receiver<T> {
		{
			let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
			if let Some(sender) = channels.get(name) {
				return sender.subscribe();
			}
		}

		let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
		channels
			.entry(name.to_string())
			.or_insert_with(|| {
				debug!(name = %name, "created update channel");
				broadcast::channel(self.capacity).0
			})
			.subscribe()
	}

	/// Deliver `value` to every subscriber of `name`.
	///
	/// Returns the number of receivers that got it.
	pub fn publish(&self, name: &str, value: T) -> usize {
		let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
		match channels.get(name) {
			Some(sender) => sender.send(value).unwrap_or(0),
			None => 0,
		}
	}

	/// Number of live subscribers for `name`.
	pub fn subscriber_count(&self, name: &str) -> usize {
		let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
		channels.get(name).map_or(0, broadcast::Sender::receiver_count)
	}
}

impl<T: Clone + Send + 'static> Default for UpdateHub<T> {
	fn default() -> Self {
		Self::new()
	}
}
