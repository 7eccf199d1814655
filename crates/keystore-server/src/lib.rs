// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sync server for versioned secret stores.
//!
//! Clients connect over WebSocket with their credential as the only path
//! segment (`ws://host:3000/<credential>`). Every connection receives a
//! `notify` frame with the current value of each store it may see, then
//! exchanges `get`/`set`/`rotate`/`restore` requests and receives further
//! `notify` frames whenever a store changes.

pub mod auth;
pub mod connection;
pub mod error;
pub mod handler;
pub mod server;
pub mod stores;

use std::sync::Arc;

use keystore_core::StoreRegistry;

pub use auth::{Authenticator, FnAuthenticator, StaticAuthenticator};
pub use connection::{ConnectionHandle, ConnectionId, ConnectionRegistry};
pub use error::{Result, ServerError};
pub use server::{create_router, KeyStoreServer};
pub use stores::build_registry;

/// State shared by every connection.
#[derive(Clone)]
pub struct AppState {
	pub registry: Arc<StoreRegistry>,
	pub authenticator: Arc<dyn Authenticator>,
	pub connections: Arc<ConnectionRegistry>,
}
