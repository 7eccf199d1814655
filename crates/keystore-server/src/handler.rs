// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! WebSocket endpoint: one connection per client, credential in the path.

use std::sync::Arc;

use axum::{
	extract::{
		ws::{Message, WebSocket},
		State, WebSocketUpgrade,
	},
	http::Uri,
	response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use keystore_common_secret::SecretString;
use keystore_core::{Method, Notification, Request, Response};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::Authenticator;
use crate::connection::{ConnectionHandle, OUTBOUND_QUEUE_SIZE};
use crate::error::Result;
use crate::AppState;

/// The credential is the single path segment; anything deeper is rejected.
///
/// `/` yields an empty credential, which the authenticator then judges.
pub fn credential_from_path(path: &str) -> Option<&str> {
	let mut segments = path.strip_prefix('/').unwrap_or(path).split('/');
	let credential = segments.next().unwrap_or_default();
	match segments.next() {
		Some(_) => None,
		None => Some(credential),
	}
}

pub async fn ws_upgrade_handler(ws: WebSocketUpgrade, uri: Uri, State(state): State<AppState>) -> impl IntoResponse {
	let credential = credential_from_path(uri.path()).map(SecretString::from);
	ws.on_upgrade(move |socket| async move {
		match credential {
			Some(credential) => handle_connection(socket, credential, state).await,
			None => reject(socket).await,
		}
	})
}

async fn reject(mut socket: WebSocket) {
	warn!("connection path has extra segments, closing");
	let _ = socket.send(Message::Close(None)).await;
}

async fn handle_connection(socket: WebSocket, credential: SecretString, state: AppState) {
	let (mut sender, mut receiver) = socket.split();
	let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_SIZE);

	let conn = state.connections.register(credential, tx);
	let connection_id = conn.id();
	info!(connection_id, "connection opened");

	let conn_send = conn.clone();
	let send_task = tokio::spawn(async move {
		loop {
			tokio::select! {
				_ = conn_send.closed() => break,
				frame = rx.recv() => match frame {
					Some(text) => {
						if let Err(e) = sender.send(Message::Text(text.into())).await {
							debug!(connection_id, error = %e, "failed to send frame");
							break;
						}
					}
					None => break,
				},
			}
		}
		let _ = sender.send(Message::Close(None)).await;
	});

	let push_task = tokio::spawn(push_current_values(state.clone(), conn.clone()));

	loop {
		tokio::select! {
			_ = conn.closed() => break,
			msg = receiver.next() => match msg {
				Some(Ok(Message::Text(text))) => {
					if !on_frame(&state, &conn, text.as_str()) {
						break;
					}
				}
				Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
					Ok(text) => {
						if !on_frame(&state, &conn, text) {
							break;
						}
					}
					Err(_) => {
						warn!(connection_id, "binary frame is not utf-8, closing");
						break;
					}
				},
				Some(Ok(Message::Close(_))) | None => break,
				Some(Ok(_)) => {}
				Some(Err(e)) => {
					debug!(connection_id, error = %e, "receive error");
					break;
				}
			},
		}
	}

	conn.close();
	state.connections.remove(connection_id);
	push_task.abort();
	let _ = send_task.await;
	info!(connection_id, "connection closed");
}

/// Parse and dispatch one inbound frame. Returns false if the connection
/// should close.
fn on_frame(state: &AppState, conn: &ConnectionHandle, text: &str) -> bool {
	debug!(connection_id = conn.id(), "rx: {text}");
	match Request::parse(text) {
		Ok(request) => {
			tokio::spawn(serve_request(state.clone(), conn.clone(), request));
			true
		}
		Err(e) => {
			warn!(connection_id = conn.id(), error = %e, "malformed frame, closing");
			false
		}
	}
}

async fn serve_request(state: AppState, conn: ConnectionHandle, request: Request) {
	match dispatch(&state, conn.credential(), &request).await {
		Ok(response) => {
			conn.send(&response).await;
		}
		Err(e) => {
			warn!(connection_id = conn.id(), error = %e, "request failed, closing connection");
			conn.close();
		}
	}
}

/// Authorize, look up and run one request.
///
/// Only an authenticator failure is an `Err`; everything else becomes a
/// response for the client.
pub async fn dispatch(state: &AppState, credential: &str, request: &Request) -> Result<Response> {
	let id = request.id;

	if !state
		.authenticator
		.authenticate(credential, request.method, &request.name)
		.await?
	{
		return Ok(Response::forbidden(id));
	}

	let Some(store) = state.registry.get(&request.name) else {
		return Ok(Response::not_found(id));
	};

	let result = match request.method {
		Method::Get => store.secret().await.map(|secret| Response::ok(id, secret)),
		Method::Set => store
			.set_secret(request.secret())
			.await
			.map(|secret| Response::ok(id, secret)),
		Method::Rotate => store.rotate_secret().await.map(|secret| Response::ok(id, secret)),
		Method::Restore => match request.version_id() {
			Some(version) => store.restore_secret(version).await.map(|_| Response::ack(id)),
			None => return Ok(Response::error(id, "restore requires a version id")),
		},
		Method::Notify => return Ok(Response::error(id, "notify is not a request method")),
	};

	Ok(result.unwrap_or_else(|e| {
		debug!(name = %request.name, method = %request.method, error = %e, "store operation failed");
		Response::error(id, e.to_string())
	}))
}

/// Push the current value of every store this connection may see.
async fn push_current_values(state: AppState, conn: ConnectionHandle) {
	for (name, store) in state.registry.iter() {
		let secret = match store.secret().await {
			Ok(secret) => secret,
			Err(e) => {
				warn!(name = %name, error = %e, "failed to read secret for initial push");
				continue;
			}
		};

		let frame = Notification::new(name, secret);
		match serde_json::to_string(&frame) {
			Ok(text) => push_authorized(&state.authenticator, &conn, name, &text).await,
			Err(e) => warn!(name = %name, error = %e, "failed to encode notification"),
		}
		if conn.is_closed() {
			return;
		}
	}
}

/// Deliver a notify frame if the credential may currently see `name`.
///
/// A denial skips silently. An authenticator failure closes the connection.
pub(crate) async fn push_authorized(
	authenticator: &Arc<dyn Authenticator>,
	conn: &ConnectionHandle,
	name: &str,
	text: &str,
) {
	match authenticator
		.authenticate(conn.credential(), Method::Notify, name)
		.await
	{
		Ok(true) => conn.push(text),
		Ok(false) => debug!(connection_id = conn.id(), name = %name, "notify not authorized, skipping"),
		Err(e) => {
			warn!(connection_id = conn.id(), name = %name, error = %e, "notify authorization failed, closing");
			conn.close();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn root_path_is_empty_credential() {
		assert_eq!(credential_from_path("/"), Some(""));
		assert_eq!(credential_from_path(""), Some(""));
	}

	#[test]
	fn single_segment_is_credential() {
		assert_eq!(credential_from_path("/AUTH_KEY"), Some("AUTH_KEY"));
	}

	#[test]
	fn extra_segments_are_rejected() {
		assert_eq!(credential_from_path("/AUTH_KEY/extra"), None);
		assert_eq!(credential_from_path("/AUTH_KEY/"), None);
		assert_eq!(credential_from_path("/a/b/c"), None);
	}
}
