// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential rules for the static authenticator.

use keystore_common_secret::SecretString;
use keystore_core::Method;
use serde::Deserialize;

/// Matches every secret name.
pub const WILDCARD: &str = "*";

/// One credential and what it may do.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRule {
	pub credential: SecretString,
	pub methods: Vec<Method>,
	pub names: Vec<String>,
}

impl CredentialRule {
	/// A credential allowed every method on every secret.
	pub fn full_access(credential: SecretString) -> Self {
		Self {
			credential,
			methods: all_methods(),
			names: vec![WILDCARD.to_string()],
		}
	}
}

fn all_methods() -> Vec<Method> {
	let mut methods = vec![Method::Notify];
	methods.extend(Method::REQUESTS);
	methods
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
	pub credentials: Vec<CredentialRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialRuleLayer {
	pub credential: SecretString,
	#[serde(default)]
	pub methods: Option<Vec<Method>>,
	#[serde(default)]
	pub names: Option<Vec<String>>,
}

impl CredentialRuleLayer {
	pub fn finalize(self) -> CredentialRule {
		CredentialRule {
			credential: self.credential,
			methods: self.methods.unwrap_or_else(all_methods),
			names: self.names.unwrap_or_else(|| vec![WILDCARD.to_string()]),
		}
	}
}

/// Credential rules accumulate across layers rather than replacing each other.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfigLayer {
	#[serde(default)]
	pub credentials: Option<Vec<CredentialRuleLayer>>,
}

impl AuthConfigLayer {
	pub fn merge(&mut self, other: AuthConfigLayer) {
		if let Some(more) = other.credentials {
			self.credentials.get_or_insert_with(Vec::new).extend(more);
		}
	}

	pub fn finalize(self) -> AuthConfig {
		AuthConfig {
			credentials: self
				.credentials
				.unwrap_or_default()
				.into_iter()
				.map(CredentialRuleLayer::finalize)
				.collect(),
		}
	}
}
