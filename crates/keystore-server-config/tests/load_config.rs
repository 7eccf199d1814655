// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use keystore_core::Method;
use keystore_server_config::{load_config_with_file, AdapterKind, ConfigError};
use serde_json::json;

fn write_config(contents: &str) -> tempfile::TempDir {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("server.toml"), contents).unwrap();
	dir
}

#[test]
fn loads_full_file() {
	let dir = write_config(
		r#"
[http]
host = "127.0.0.1"
port = 4000

[logging]
level = "debug"

[[stores]]
name = "KEYPAIR1"
adapter = "ed25519"
ttl_secs = 86400

[[stores]]
name = "ACCOUNT1"
adapter = "json"
id_field = "address"
initial = { address = "0xabc", private_key = "0x01" }

[[auth.credentials]]
credential = "AUTH_KEY"

[[auth.credentials]]
credential = "READER"
methods = ["notify", "get"]
names = ["ACCOUNT1"]
"#,
	);

	let config = load_config_with_file(dir.path().join("server.toml")).unwrap();

	assert_eq!(config.socket_addr(), "127.0.0.1:4000");
	assert_eq!(config.logging.level, "debug");

	assert_eq!(config.stores.len(), 2);
	assert_eq!(config.stores[0].name, "KEYPAIR1");
	assert_eq!(config.stores[0].adapter, AdapterKind::Ed25519);
	assert_eq!(config.stores[0].ttl_secs, 86_400);
	assert_eq!(config.stores[1].id_field, "address");
	assert_eq!(
		config.stores[1].initial,
		Some(json!({ "address": "0xabc", "private_key": "0x01" }))
	);

	let reader = config
		.auth
		.credentials
		.iter()
		.find(|rule| rule.credential.expose() == "READER")
		.unwrap();
	assert_eq!(reader.methods, vec![Method::Notify, Method::Get]);
}

#[test]
fn file_without_stores_fails_validation() {
	let dir = write_config("[http]\nport = 4000\n");
	let err = load_config_with_file(dir.path().join("server.toml")).unwrap_err();
	assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn unknown_adapter_is_a_parse_error() {
	let dir = write_config("[[stores]]\nname = \"A\"\nadapter = \"rsa\"\n");
	let err = load_config_with_file(dir.path().join("server.toml")).unwrap_err();
	assert!(matches!(err, ConfigError::TomlParse { .. }));
}
