// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client connection settings.

use std::time::Duration;

use keystore_common_secret::SecretString;
use url::Url;

use crate::error::{ClientError, Result};

/// Default number of frames held while the socket is down.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Delay between reconnection attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
	/// Delay before the first attempt, and every attempt when not exponential.
	pub base_delay: Duration,
	/// Upper bound for exponential backoff.
	pub max_delay: Duration,
	/// Whether to double the delay after each consecutive failure.
	pub exponential: bool,
}

impl Default for ReconnectPolicy {
	fn default() -> Self {
		Self {
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(30),
			exponential: false,
		}
	}
}

impl ReconnectPolicy {
	/// A flat delay between attempts.
	pub fn fixed(delay: Duration) -> Self {
		Self {
			base_delay: delay,
			max_delay: delay,
			exponential: false,
		}
	}

	/// Delay before the attempt following `failures` consecutive failures.
	pub fn delay(&self, failures: u32) -> Duration {
		if !self.exponential {
			return self.base_delay;
		}
		let factor = 2u32.saturating_pow(failures.min(10));
		self.base_delay.saturating_mul(factor).min(self.max_delay)
	}
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Server base URL, e.g. `ws://localhost:3000`.
	pub url: String,
	/// Appended to the URL as the final path segment.
	pub credential: SecretString,
	pub reconnect: ReconnectPolicy,
	/// Fail requests that get no response in time. `None` waits forever.
	pub request_timeout: Option<Duration>,
	/// Frames that may wait for a connection before requests are refused.
	pub queue_capacity: usize,
}

impl ClientConfig {
	pub fn new(url: impl Into<String>, credential: impl Into<SecretString>) -> Self {
		Self {
			url: url.into(),
			credential: credential.into(),
			reconnect: ReconnectPolicy::default(),
			request_timeout: None,
			queue_capacity: DEFAULT_QUEUE_CAPACITY,
		}
	}

	pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
		self.reconnect = reconnect;
		self
	}

	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = Some(timeout);
		self
	}

	pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
		self.queue_capacity = capacity;
		self
	}

	/// The URL to connect to, credential included.
	///
	/// The server reads the credential verbatim from a single path segment,
	/// so credentials that a URL would split, truncate or escape are refused.
	pub fn endpoint(&self) -> Result<Url> {
		let credential = self.credential.expose();
		if credential
			.chars()
			.any(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace() || c.is_control())
		{
			return Err(ClientError::Connection(
				"credential contains characters that cannot be sent in a url path".to_string(),
			));
		}

		let base = self.url.trim_end_matches('/');
		let endpoint = format!("{base}/{credential}");
		let url = Url::parse(&endpoint).map_err(|e| ClientError::Connection(format!("invalid url: {e}")))?;
		match url.scheme() {
			"ws" | "wss" => Ok(url),
			scheme => Err(ClientError::Connection(format!("unsupported scheme {scheme}"))),
		}
	}
}
