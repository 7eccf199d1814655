// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Connection driver: one socket, reconnected until the client is shut down.
//!
//! Every request is queued, then written by the driver task once a socket is
//! open, so frames leave in the order they were issued no matter how many
//! reconnects happen in between. Requests already written stay pending across
//! a reconnect; they are not replayed.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use keystore_core::{Request, Response, ServerFrame, UpdateHub};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::handle::RemoteKeyStore;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Responder = oneshot::Sender<Result<Option<Value>>>;

/// How long a disconnecting client waits for the server to finish the close
/// handshake while draining late responses.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	Disconnected,
	Connecting,
	Connected,
	/// Terminal: [`KeyStoreClient::disconnect`] was called.
	ShuttingDown,
}

#[derive(Default)]
struct Outbox {
	queue: VecDeque<String>,
	pending: HashMap<u64, Responder>,
	driver: Option<JoinHandle<()>>,
}

struct Inner {
	config: ClientConfig,
	next_id: AtomicU64,
	outbox: Mutex<Outbox>,
	wake: Notify,
	state: watch::Sender<ConnectionState>,
	updates: UpdateHub<Value>,
	shutdown: CancellationToken,
}

/// Client for a keystore sync server.
///
/// Cheap to clone; clones share one connection. The connection is opened
/// lazily by the first request and dropped once every clone is gone or
/// [`disconnect`](Self::disconnect) is called. Must be used inside a Tokio
/// runtime.
#[derive(Clone)]
pub struct KeyStoreClient {
	inner: Arc<Inner>,
	_shutdown_on_drop: Arc<DropGuard>,
}

impl KeyStoreClient {
	pub fn new(config: ClientConfig) -> Self {
		let shutdown = CancellationToken::new();
		let (state, _) = watch::channel(ConnectionState::Disconnected);
		Self {
			inner: Arc::new(Inner {
				config,
				next_id: AtomicU64::new(0),
				outbox: Mutex::new(Outbox::default()),
				wake: Notify::new(),
				state,
				updates: UpdateHub::new(),
				shutdown: shutdown.clone(),
			}),
			_shutdown_on_drop: Arc::new(shutdown.drop_guard()),
		}
	}

	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	pub fn state(&self) -> ConnectionState {
		*self.inner.state.borrow()
	}

	/// Observe connection state changes.
	pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.inner.state.subscribe()
	}

	/// Open the connection now instead of on the first request.
	pub fn connect(&self) -> Result<()> {
		if self.inner.shutdown.is_cancelled() {
			return Err(ClientError::ShutDown);
		}
		self.inner.ensure_driver(&mut self.inner.outbox());
		Ok(())
	}

	/// Stop for good: close the socket and never reconnect.
	///
	/// Responses that arrive while the socket closes still resolve their
	/// requests. Anything left pending afterwards fails with
	/// [`ClientError::ShutDown`].
	pub fn disconnect(&self) {
		if self.inner.shutdown.is_cancelled() {
			return;
		}
		info!(url = %self.inner.config.url, "disconnecting from keystore server");
		self.inner.shutdown.cancel();
		self.inner.state.send_replace(ConnectionState::ShuttingDown);

		let driver_running = self
			.inner
			.outbox()
			.driver
			.as_ref()
			.is_some_and(|driver| !driver.is_finished());
		if !driver_running {
			self.inner.fail_pending(ClientError::ShutDown);
		}
	}

	pub async fn get(&self, name: &str) -> Result<Value> {
		let request = Request::get(self.inner.next_id(), name);
		expect_payload(self.call(request).await?)
	}

	/// Store `secret`, or have the server generate a new value for `None`.
	pub async fn set(&self, name: &str, secret: Option<Value>) -> Result<Value> {
		let request = Request::set(self.inner.next_id(), name, secret);
		expect_payload(self.call(request).await?)
	}

	pub async fn rotate(&self, name: &str) -> Result<Value> {
		let request = Request::rotate(self.inner.next_id(), name);
		expect_payload(self.call(request).await?)
	}

	/// Make a retained version current again. The server only acknowledges.
	pub async fn restore(&self, name: &str, version: &str) -> Result<()> {
		let request = Request::restore(self.inner.next_id(), name, version);
		self.call(request).await.map(|_| ())
	}

	/// Raw pushes for `name`.
	pub fn subscribe(&self, name: &str) -> broadcast::Receiver<Value> {
		self.inner.updates.subscribe(name)
	}

	/// A typed handle for one secret.
	pub fn key_store<T>(&self, name: impl Into<String>) -> RemoteKeyStore<T>
	where
		T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
	{
		RemoteKeyStore::new(self.clone(), name)
	}

	async fn call(&self, request: Request) -> Result<Option<Value>> {
		let id = request.id;
		let rx = self.inner.enqueue(&request)?;

		let response = match self.inner.config.request_timeout {
			Some(limit) => match tokio::time::timeout(limit, rx).await {
				Ok(response) => response,
				Err(_) => {
					self.inner.outbox().pending.remove(&id);
					debug!(id, method = %request.method, name = %request.name, "request timed out");
					return Err(ClientError::Timeout);
				}
			},
			None => rx.await,
		};

		response.unwrap_or(Err(ClientError::ShutDown))
	}
}

impl fmt::Debug for KeyStoreClient {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KeyStoreClient")
			.field("url", &self.inner.config.url)
			.field("state", &self.state())
			.finish()
	}
}

fn expect_payload(payload: Option<Value>) -> Result<Value> {
	payload.ok_or_else(|| ClientError::Decode("response carried no payload".to_string()))
}

impl Inner {
	fn next_id(&self) -> u64 {
		self.next_id.fetch_add(1, Ordering::Relaxed)
	}

	fn outbox(&self) -> MutexGuard<'_, Outbox> {
		self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn set_state(&self, next: ConnectionState) {
		self.state.send_if_modified(|state| {
			if *state == ConnectionState::ShuttingDown || *state == next {
				return false;
			}
			*state = next;
			true
		});
	}

	/// Register the request as pending and queue its frame for the driver.
	fn enqueue(self: &Arc<Self>, request: &Request) -> Result<oneshot::Receiver<Result<Option<Value>>>> {
		if self.shutdown.is_cancelled() {
			return Err(ClientError::ShutDown);
		}
		let text = serde_json::to_string(request)?;
		let (tx, rx) = oneshot::channel();

		{
			let mut outbox = self.outbox();
			if outbox.queue.len() >= self.config.queue_capacity {
				return Err(ClientError::Connection("outbound queue is full".to_string()));
			}
			outbox.pending.insert(request.id, tx);
			outbox.queue.push_back(text);
			self.ensure_driver(&mut outbox);
		}

		self.wake.notify_one();
		Ok(rx)
	}

	fn ensure_driver(self: &Arc<Self>, outbox: &mut Outbox) {
		let running = outbox
			.driver
			.as_ref()
			.is_some_and(|driver| !driver.is_finished());
		if !running {
			outbox.driver = Some(tokio::spawn(drive(Arc::clone(self))));
		}
	}

	fn next_queued(&self) -> Option<String> {
		self.outbox().queue.pop_front()
	}

	fn fail_pending(&self, error: ClientError) {
		let pending: Vec<_> = {
			let mut outbox = self.outbox();
			outbox.queue.clear();
			outbox.pending.drain().collect()
		};
		if !pending.is_empty() {
			debug!(count = pending.len(), error = %error, "failing pending requests");
		}
		for (_, responder) in pending {
			let _ = responder.send(Err(error.clone()));
		}
	}

	async fn open(&self, url: &Url) -> Result<WsStream> {
		tokio::select! {
			result = connect_async(url.as_str()) => result
				.map(|(ws, _)| ws)
				.map_err(|e| ClientError::Connection(e.to_string())),
			_ = self.shutdown.cancelled() => Err(ClientError::ShutDown),
		}
	}

	/// Write queued frames in order. A frame the sink refuses goes back to the
	/// front of the queue for the next socket.
	async fn flush<S>(&self, sink: &mut S) -> Result<()>
	where
		S: Sink<Message> + Unpin,
		S::Error: fmt::Display,
	{
		while let Some(text) = self.next_queued() {
			debug!("tx: {text}");
			if let Err(e) = sink.send(Message::Text(text.clone())).await {
				self.outbox().queue.push_front(text);
				return Err(ClientError::Connection(e.to_string()));
			}
		}
		Ok(())
	}

	/// Serve one socket until it drops or the client shuts down.
	async fn run_connection(&self, ws: WsStream) -> Result<()> {
		let (mut sink, mut stream) = ws.split();

		loop {
			self.flush(&mut sink).await?;

			tokio::select! {
				_ = self.shutdown.cancelled() => {
					let _ = sink.send(Message::Close(None)).await;
					let drain = async {
						while let Some(Ok(msg)) = stream.next().await {
							if let Message::Text(text) = msg {
								if let Err(e) = self.on_frame(&text) {
									debug!(error = %e, "ignoring frame during shutdown");
								}
							}
						}
					};
					let _ = tokio::time::timeout(CLOSE_TIMEOUT, drain).await;
					return Ok(());
				}
				_ = self.wake.notified() => {}
				msg = stream.next() => match msg {
					Some(Ok(Message::Text(text))) => self.on_frame(&text)?,
					Some(Ok(Message::Binary(data))) => {
						let text = String::from_utf8(data)
							.map_err(|_| ClientError::Decode("binary frame is not utf-8".to_string()))?;
						self.on_frame(&text)?;
					}
					Some(Ok(Message::Close(_))) | None => return Ok(()),
					Some(Ok(_)) => {}
					Some(Err(e)) => return Err(ClientError::Connection(e.to_string())),
				},
			}
		}
	}

	fn on_frame(&self, text: &str) -> Result<()> {
		debug!("rx: {text}");
		match ServerFrame::parse(text).map_err(|e| ClientError::Decode(e.to_string()))? {
			ServerFrame::Notify(notification) => {
				let delivered = self
					.updates
					.publish(&notification.name, notification.payload.secret);
				debug!(name = %notification.name, delivered, "notify");
			}
			ServerFrame::Response(response) => self.resolve(response),
		}
		Ok(())
	}

	fn resolve(&self, response: Response) {
		let Some(responder) = self.outbox().pending.remove(&response.id) else {
			debug!(id = response.id, "response for unknown request");
			return;
		};
		let result = match response.error {
			Some(message) => Err(ClientError::from_remote(message)),
			None => Ok(response.payload),
		};
		let _ = responder.send(result);
	}
}

/// Connect, serve, back off, repeat until shutdown.
async fn drive(inner: Arc<Inner>) {
	let url = match inner.config.endpoint() {
		Ok(url) => url,
		Err(e) => {
			error!(url = %inner.config.url, error = %e, "invalid keystore server url");
			inner.shutdown.cancel();
			inner.state.send_replace(ConnectionState::ShuttingDown);
			inner.fail_pending(e);
			return;
		}
	};

	let mut failures: u32 = 0;
	while !inner.shutdown.is_cancelled() {
		inner.set_state(ConnectionState::Connecting);

		match inner.open(&url).await {
			Ok(ws) => {
				failures = 0;
				inner.set_state(ConnectionState::Connected);
				info!(url = %inner.config.url, "connected to keystore server");
				match inner.run_connection(ws).await {
					Ok(()) => info!(url = %inner.config.url, "disconnected from keystore server"),
					Err(e) => warn!(url = %inner.config.url, error = %e, "keystore connection lost"),
				}
			}
			Err(ClientError::ShutDown) => break,
			Err(e) => {
				failures = failures.saturating_add(1);
				warn!(url = %inner.config.url, error = %e, attempts = failures, "failed to connect");
			}
		}

		if inner.shutdown.is_cancelled() {
			break;
		}
		inner.set_state(ConnectionState::Disconnected);

		let delay = inner.config.reconnect.delay(failures);
		debug!(delay_ms = delay.as_millis() as u64, "reconnecting to keystore server");
		tokio::select! {
			_ = tokio::time::sleep(delay) => {}
			_ = inner.shutdown.cancelled() => break,
		}
	}

	inner.state.send_replace(ConnectionState::ShuttingDown);
	inner.fail_pending(ClientError::ShutDown);
}
