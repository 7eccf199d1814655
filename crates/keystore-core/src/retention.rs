// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! How long a superseded version stays restorable.

use std::time::Duration;

/// Retention policy for versions that are no longer current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
	/// Evict immediately; no restore history. This is also what an unset
	/// TTL means, so a store keeps no history unless configured to.
	#[default]
	Discard,
	/// Keep for the given duration, then evict.
	For(Duration),
	/// Keep indefinitely.
	Forever,
}

impl Retention {
	/// Interpret a signed TTL in seconds: `0` discards, negative keeps forever.
	pub fn from_ttl_secs(ttl: i64) -> Self {
		match ttl {
			0 => Retention::Discard,
			t if t < 0 => Retention::Forever,
			t => Retention::For(Duration::from_secs(t.unsigned_abs())),
		}
	}

	/// The signed TTL this policy corresponds to.
	pub fn ttl_secs(&self) -> i64 {
		match self {
			Retention::Discard => 0,
			Retention::For(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
			Retention::Forever => -1,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn zero_discards() {
		assert_eq!(Retention::from_ttl_secs(0), Retention::Discard);
	}

	#[test]
	fn negative_is_unbounded() {
		assert_eq!(Retention::from_ttl_secs(-1), Retention::Forever);
		assert_eq!(Retention::from_ttl_secs(i64::MIN), Retention::Forever);
	}

	#[test]
	fn positive_is_seconds() {
		assert_eq!(
			Retention::from_ttl_secs(86_400),
			Retention::For(Duration::from_secs(86_400))
		);
	}

	proptest! {
		#[test]
		fn prop_positive_ttl_roundtrips(ttl in 1i64..10_000_000) {
			prop_assert_eq!(Retention::from_ttl_secs(ttl).ttl_secs(), ttl);
		}
	}
}
