// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-operation authorization of connection credentials.

use async_trait::async_trait;
use keystore_core::Method;
use keystore_server_config::{AuthConfig, CredentialRule, WILDCARD};

use crate::error::Result;

/// Decides whether `credential` may perform `method` on the secret `name`.
///
/// Called for every request and again before every push (`Method::Notify`);
/// implementations must not assume earlier answers still hold. `Ok(false)`
/// denies. `Err` means the check itself failed, and the server closes the
/// connection.
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
	async fn authenticate(&self, credential: &str, method: Method, name: &str) -> Result<bool>;
}

/// Authorizes against a fixed list of credential rules.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
	rules: Vec<CredentialRule>,
}

impl StaticAuthenticator {
	pub fn new(rules: Vec<CredentialRule>) -> Self {
		Self { rules }
	}

	pub fn from_config(config: &AuthConfig) -> Self {
		Self::new(config.credentials.clone())
	}

	fn allows(rule: &CredentialRule, method: Method, name: &str) -> bool {
		rule.methods.contains(&method) && rule.names.iter().any(|n| n == WILDCARD || n == name)
	}
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
	async fn authenticate(&self, credential: &str, method: Method, name: &str) -> Result<bool> {
		Ok(self
			.rules
			.iter()
			.filter(|rule| rule.credential.expose() == credential)
			.any(|rule| Self::allows(rule, method, name)))
	}
}

/// Adapts a synchronous closure into an [`Authenticator`].
pub struct FnAuthenticator<F>(F);

impl<F> FnAuthenticator<F>
where
	F: Fn(&str, Method, &str) -> Result<bool> + Send + Sync + 'static,
{
	pub fn new(check: F) -> Self {
		Self(check)
	}
}

#[async_trait]
impl<F> Authenticator for FnAuthenticator<F>
where
	F: Fn(&str, Method, &str) -> Result<bool> + Send + Sync + 'static,
{
	async fn authenticate(&self, credential: &str, method: Method, name: &str) -> Result<bool> {
		(self.0)(credential, method, name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use keystore_common_secret::SecretString;

	fn rule(credential: &str, methods: &[Method], names: &[&str]) -> CredentialRule {
		CredentialRule {
			credential: SecretString::from(credential),
			methods: methods.to_vec(),
			names: names.iter().map(|n| n.to_string()).collect(),
		}
	}

	#[tokio::test]
	async fn full_access_allows_everything() {
		let auth = StaticAuthenticator::new(vec![CredentialRule::full_access(SecretString::from("AUTH_KEY"))]);
		for method in [Method::Notify, Method::Get, Method::Set, Method::Rotate, Method::Restore] {
			assert!(auth.authenticate("AUTH_KEY", method, "ACCOUNT1").await.unwrap());
		}
	}

	#[tokio::test]
	async fn unknown_credential_is_denied() {
		let auth = StaticAuthenticator::new(vec![CredentialRule::full_access(SecretString::from("AUTH_KEY"))]);
		assert!(!auth.authenticate("WRONG", Method::Get, "ACCOUNT1").await.unwrap());
		assert!(!auth.authenticate("", Method::Get, "ACCOUNT1").await.unwrap());
	}

	#[tokio::test]
	async fn rules_restrict_methods_and_names() {
		let auth = StaticAuthenticator::new(vec![rule("READER", &[Method::Notify, Method::Get], &["ACCOUNT1"])]);

		assert!(auth.authenticate("READER", Method::Get, "ACCOUNT1").await.unwrap());
		assert!(auth.authenticate("READER", Method::Notify, "ACCOUNT1").await.unwrap());
		assert!(!auth.authenticate("READER", Method::Rotate, "ACCOUNT1").await.unwrap());
		assert!(!auth.authenticate("READER", Method::Get, "KEYPAIR1").await.unwrap());
	}

	#[tokio::test]
	async fn any_matching_rule_allows() {
		let auth = StaticAuthenticator::new(vec![
			rule("K", &[Method::Get], &["A"]),
			rule("K", &[Method::Rotate], &["*"]),
		]);
		assert!(auth.authenticate("K", Method::Rotate, "B").await.unwrap());
		assert!(!auth.authenticate("K", Method::Get, "B").await.unwrap());
	}

	#[tokio::test]
	async fn fn_authenticator_delegates() {
		let auth = FnAuthenticator::new(|credential, method, _name| Ok(credential == "AUTH_KEY" && method != Method::Set));
		assert!(auth.authenticate("AUTH_KEY", Method::Get, "X").await.unwrap());
		assert!(!auth.authenticate("AUTH_KEY", Method::Set, "X").await.unwrap());
	}
}
