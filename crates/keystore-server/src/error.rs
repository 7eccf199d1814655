// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use keystore_core::KeyStoreError;
use keystore_server_config::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
	/// The authenticator itself failed, as opposed to denying.
	#[error("authentication failed: {0}")]
	Authentication(String),

	#[error("store error: {0}")]
	Store(#[from] KeyStoreError),

	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}
