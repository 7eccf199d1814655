// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secrets from the environment, with `*_FILE` support.

use std::path::PathBuf;
use std::{env, fs};

use keystore_common_secret::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretEnvError {
	#[error("failed to read secret file at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("secret file path in {var} is empty")]
	EmptyPath { var: String },
}

/// Load a secret using the `VAR` / `VAR_FILE` convention.
///
/// `VAR_FILE` wins when both are set. A single trailing newline is stripped
/// from file contents, which is how Docker and Kubernetes secret mounts
/// usually end.
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, SecretEnvError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path_str) = env::var(&file_var) {
		if path_str.is_empty() {
			return Err(SecretEnvError::EmptyPath { var: file_var });
		}

		let path = PathBuf::from(&path_str);
		let content = fs::read_to_string(&path).map_err(|e| SecretEnvError::Io {
			path: path.clone(),
			source: e,
		})?;

		let secret = content.strip_suffix('\n').unwrap_or(&content).to_string();
		return Ok(Some(SecretString::new(secret)));
	}

	if let Ok(value) = env::var(var) {
		return Ok(Some(SecretString::new(value)));
	}

	Ok(None)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn unset_is_none() {
		assert!(load_secret_env("KEYSTORE_TEST_UNSET_SECRET").unwrap().is_none());
	}

	#[test]
	fn reads_direct_value() {
		env::set_var("KEYSTORE_TEST_DIRECT_SECRET", "AUTH_KEY");
		let secret = load_secret_env("KEYSTORE_TEST_DIRECT_SECRET").unwrap().unwrap();
		assert_eq!(secret.expose(), "AUTH_KEY");
		env::remove_var("KEYSTORE_TEST_DIRECT_SECRET");
	}

	#[test]
	fn file_wins_and_trailing_newline_is_stripped() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "from-file").unwrap();

		env::set_var("KEYSTORE_TEST_FILE_SECRET", "from-env");
		env::set_var("KEYSTORE_TEST_FILE_SECRET_FILE", file.path());
		let secret = load_secret_env("KEYSTORE_TEST_FILE_SECRET").unwrap().unwrap();
		assert_eq!(secret.expose(), "from-file");

		env::remove_var("KEYSTORE_TEST_FILE_SECRET");
		env::remove_var("KEYSTORE_TEST_FILE_SECRET_FILE");
	}

	#[test]
	fn empty_file_path_is_an_error() {
		env::set_var("KEYSTORE_TEST_EMPTY_SECRET_FILE", "");
		assert!(matches!(
			load_secret_env("KEYSTORE_TEST_EMPTY_SECRET"),
			Err(SecretEnvError::EmptyPath { .. })
		));
		env::remove_var("KEYSTORE_TEST_EMPTY_SECRET_FILE");
	}
}
