// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Router construction and the per-store notify fan-out.

use std::sync::Arc;

use axum::{routing::get, Router};
use futures::future::join_all;
use futures::stream::{BoxStream, StreamExt};
use keystore_core::{Notification, StoreRegistry};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::auth::Authenticator;
use crate::connection::ConnectionRegistry;
use crate::handler::{push_authorized, ws_upgrade_handler};
use crate::AppState;

/// A running sync server: shared state plus one notifier task per store.
///
/// Dropping the server stops fan-out; connections already accepted by a
/// router keep serving requests until they close.
pub struct KeyStoreServer {
	state: AppState,
	notifiers: Vec<JoinHandle<()>>,
}

impl KeyStoreServer {
	/// Build the server and start listening for store updates.
	///
	/// Must be called inside a Tokio runtime.
	pub fn new(registry: StoreRegistry, authenticator: impl Authenticator) -> Self {
		Self::with_state(AppState {
			registry: Arc::new(registry),
			authenticator: Arc::new(authenticator),
			connections: Arc::new(ConnectionRegistry::new()),
		})
	}

	pub fn with_state(state: AppState) -> Self {
		let notifiers = state
			.registry
			.iter()
			.map(|(name, store)| {
				tokio::spawn(notify_loop(
					name.to_string(),
					store.updates(),
					state.clone(),
				))
			})
			.collect();

		Self { state, notifiers }
	}

	pub fn state(&self) -> &AppState {
		&self.state
	}

	pub fn router(&self) -> Router {
		create_router(self.state.clone())
	}

	/// Serve until the listener fails.
	pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
		if let Ok(addr) = listener.local_addr() {
			info!(%addr, "keystore server listening");
		}
		axum::serve(listener, self.router()).await
	}

	/// Stop fan-out, close every connection and release store timers.
	pub async fn shutdown(&self) {
		for notifier in &self.notifiers {
			notifier.abort();
		}
		self.state.connections.close_all();
		self.state.registry.close_all().await;
		info!("keystore server shut down");
	}
}

impl Drop for KeyStoreServer {
	fn drop(&mut self) {
		for notifier in &self.notifiers {
			notifier.abort();
		}
	}
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/", get(ws_upgrade_handler))
		.route("/{*credential}", get(ws_upgrade_handler))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Forward every update of one store to every connection authorized to see it.
async fn notify_loop(name: String, mut updates: BoxStream<'static, Value>, state: AppState) {
	while let Some(secret) = updates.next().await {
		let text = match serde_json::to_string(&Notification::new(&name, secret)) {
			Ok(text) => text,
			Err(e) => {
				warn!(name = %name, error = %e, "failed to encode notification");
				continue;
			}
		};

		let targets = state.connections.snapshot();
		debug!(name = %name, connections = targets.len(), "fanning out update");
		join_all(
			targets
				.iter()
				.map(|conn| push_authorized(&state.authenticator, conn, &name, &text)),
		)
		.await;
	}
	debug!(name = %name, "update stream ended");
}
