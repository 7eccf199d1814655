// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use keystore_core::protocol::{FORBIDDEN, NOT_FOUND};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced to callers of the sync client.
///
/// `Clone` so a memoized secret future can hand the same failure to every
/// waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
	/// The server answered with an error message.
	#[error("remote error: {0}")]
	Remote(String),

	#[error("forbidden")]
	Forbidden,

	#[error("secret not found")]
	NotFound,

	#[error("request timed out")]
	Timeout,

	#[error("client has been disconnected")]
	ShutDown,

	#[error("connection error: {0}")]
	Connection(String),

	#[error("failed to decode secret: {0}")]
	Decode(String),
}

impl ClientError {
	/// Map a response's `error` field back to a typed error.
	pub fn from_remote(message: String) -> Self {
		match message.as_str() {
			FORBIDDEN => ClientError::Forbidden,
			NOT_FOUND => ClientError::NotFound,
			_ => ClientError::Remote(message),
		}
	}
}

impl From<serde_json::Error> for ClientError {
	fn from(e: serde_json::Error) -> Self {
		ClientError::Decode(e.to_string())
	}
}
