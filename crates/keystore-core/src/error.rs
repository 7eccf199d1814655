// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for secret stores and the sync protocol.

use thiserror::Error;

/// Result type for key store operations.
pub type Result<T> = std::result::Result<T, KeyStoreError>;

/// Errors returned by a store operation.
#[derive(Debug, Error)]
pub enum KeyStoreError {
	#[error("secret {id} not found")]
	VersionNotFound { id: String },

	#[error("secret {name} not found")]
	UnknownSecret { name: String },

	#[error("no initial secret available")]
	NoInitialSecret,

	#[error(transparent)]
	Adapter(#[from] AdapterError),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("store is closed")]
	Closed,
}

/// Failures raised by a persistor or hydrator.
///
/// The store never applies a partial transition when one of these is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
	#[error("hydration failed: {0}")]
	Hydration(String),

	#[error("generation failed: {0}")]
	Generation(String),

	#[error("serialization failed: {0}")]
	Serialization(String),
}

/// Errors decoding a wire frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
	#[error("malformed frame: {0}")]
	Malformed(#[from] serde_json::Error),

	#[error("invalid frame: {0}")]
	Invalid(String),
}
