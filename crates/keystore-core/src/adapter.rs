// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The persistor/hydrator contract between a domain value and its stored bytes.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AdapterError;
use crate::record::SecretRecord;

/// Converts a domain value to a [`SecretRecord`] and back.
///
/// `hydrate(persist(Some(v)).payload)` must equal `v` for every value the
/// adapter accepts.
#[async_trait]
pub trait SecretAdapter: Send + Sync + 'static {
	type Value: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

	/// Serialize `value` for storage, or generate a fresh value when `None`.
	///
	/// `Ok(None)` means there is nothing to store; callers treat it as a
	/// successful no-op.
	async fn persist(&self, value: Option<Self::Value>) -> Result<Option<SecretRecord>, AdapterError>;

	/// Rebuild the domain value from a payload produced by [`persist`](Self::persist).
	async fn hydrate(&self, payload: &[u8]) -> Result<Self::Value, AdapterError>;
}
