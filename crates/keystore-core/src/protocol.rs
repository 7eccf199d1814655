// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JSON wire frames exchanged between sync clients and the sync server.
//!
//! Client → server:
//! ```json
//! {"id": 1, "method": "set", "name": "ACCOUNT1", "payload": {"secret": {...}}}
//! ```
//! Server → client, correlated by `id`:
//! ```json
//! {"id": 1, "payload": {...}}
//! {"id": 2, "error": "forbidden"}
//! ```
//! Server → client, unsolicited:
//! ```json
//! {"method": "notify", "name": "ACCOUNT1", "payload": {"secret": {...}}}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ProtocolError;

/// Error string for a denied request.
pub const FORBIDDEN: &str = "forbidden";

/// Error string for an unknown secret name.
pub const NOT_FOUND: &str = "not-found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
	/// Server push. Also the operation authorized before each push.
	Notify,
	Get,
	Set,
	Rotate,
	Restore,
}

impl Method {
	pub fn as_str(&self) -> &'static str {
		match self {
			Method::Notify => "notify",
			Method::Get => "get",
			Method::Set => "set",
			Method::Rotate => "rotate",
			Method::Restore => "restore",
		}
	}

	/// Methods a client may send.
	pub const REQUESTS: [Method; 4] = [Method::Get, Method::Set, Method::Rotate, Method::Restore];
}

impl fmt::Display for Method {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Method {
	type Err = ProtocolError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"notify" => Ok(Method::Notify),
			"get" => Ok(Method::Get),
			"set" => Ok(Method::Set),
			"rotate" => Ok(Method::Rotate),
			"restore" => Ok(Method::Restore),
			other => Err(ProtocolError::Invalid(format!("unknown method: {other}"))),
		}
	}
}

/// A client request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	pub id: u64,
	pub method: Method,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payload: Option<Value>,
}

impl Request {
	pub fn get(id: u64, name: impl Into<String>) -> Self {
		Self::bare(id, Method::Get, name)
	}

	pub fn rotate(id: u64, name: impl Into<String>) -> Self {
		Self::bare(id, Method::Rotate, name)
	}

	/// A `set` request. `None` asks the server to generate a new value.
	pub fn set(id: u64, name: impl Into<String>, secret: Option<Value>) -> Self {
		Self {
			id,
			method: Method::Set,
			name: name.into(),
			payload: Some(json!({ "secret": secret })),
		}
	}

	pub fn restore(id: u64, name: impl Into<String>, version: impl Into<String>) -> Self {
		Self {
			id,
			method: Method::Restore,
			name: name.into(),
			payload: Some(json!({ "id": version.into() })),
		}
	}

	fn bare(id: u64, method: Method, name: impl Into<String>) -> Self {
		Self {
			id,
			method,
			name: name.into(),
			payload: None,
		}
	}

	/// Decode a request frame. A `notify` frame is never a valid request.
	pub fn parse(text: &str) -> Result<Self, ProtocolError> {
		let request: Request = serde_json::from_str(text)?;
		if request.method == Method::Notify {
			return Err(ProtocolError::Invalid("notify is not a request method".to_string()));
		}
		Ok(request)
	}

	/// The `secret` of a `set` payload. Missing and `null` both mean "generate".
	pub fn secret(&self) -> Option<Value> {
		self
			.payload
			.as_ref()
			.and_then(|payload| payload.get("secret"))
			.filter(|secret| !secret.is_null())
			.cloned()
	}

	/// The version id of a `restore` payload.
	pub fn version_id(&self) -> Option<&str> {
		self
			.payload
			.as_ref()
			.and_then(|payload| payload.get("id"))
			.and_then(Value::as_str)
	}
}

/// A response to one request. `restore` acknowledges with neither field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	pub id: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub payload: Option<Value>,
}

impl Response {
	pub fn ok(id: u64, payload: Value) -> Self {
		Self {
			id,
			error: None,
			payload: Some(payload),
		}
	}

	pub fn ack(id: u64) -> Self {
		Self {
			id,
			error: None,
			payload: None,
		}
	}

	pub fn error(id: u64, message: impl Into<String>) -> Self {
		Self {
			id,
			error: Some(message.into()),
			payload: None,
		}
	}

	pub fn forbidden(id: u64) -> Self {
		Self::error(id, FORBIDDEN)
	}

	pub fn not_found(id: u64) -> Self {
		Self::error(id, NOT_FOUND)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretPayload {
	pub secret: Value,
}

/// Unsolicited push of a store's new current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
	pub method: Method,
	pub name: String,
	pub payload: SecretPayload,
}

impl Notification {
	pub fn new(name: impl Into<String>, secret: Value) -> Self {
		Self {
			method: Method::Notify,
			name: name.into(),
			payload: SecretPayload { secret },
		}
	}
}

/// Any frame a client can receive.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
	Notify(Notification),
	Response(Response),
}

impl ServerFrame {
	/// Frames with `"method": "notify"` are pushes; everything else is a response.
	pub fn parse(text: &str) -> Result<Self, ProtocolError> {
		let value: Value = serde_json::from_str(text)?;
		let is_notify = value.get("method").and_then(Value::as_str) == Some(Method::Notify.as_str());
		if is_notify {
			Ok(ServerFrame::Notify(serde_json::from_value(value)?))
		} else {
			Ok(ServerFrame::Response(serde_json::from_value(value)?))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn forbidden_response_has_exact_shape() {
		let json = serde_json::to_string(&Response::forbidden(1)).unwrap();
		assert_eq!(json, r#"{"id":1,"error":"forbidden"}"#);
	}

	#[test]
	fn restore_ack_carries_only_id() {
		let json = serde_json::to_string(&Response::ack(3)).unwrap();
		assert_eq!(json, r#"{"id":3}"#);
	}

	#[test]
	fn notification_has_no_id() {
		let value = serde_json::to_value(Notification::new("ACCOUNT1", json!({"id": "a1"}))).unwrap();
		assert_eq!(
			value,
			json!({"method": "notify", "name": "ACCOUNT1", "payload": {"secret": {"id": "a1"}}})
		);
	}

	#[test]
	fn get_request_omits_payload() {
		let json = serde_json::to_string(&Request::get(1, "X")).unwrap();
		assert_eq!(json, r#"{"id":1,"method":"get","name":"X"}"#);
	}

	#[test]
	fn parse_reads_set_secret() {
		let request = Request::parse(r#"{"id":4,"method":"set","name":"A","payload":{"secret":{"id":"k"}}}"#).unwrap();
		assert_eq!(request.method, Method::Set);
		assert_eq!(request.secret(), Some(json!({"id": "k"})));
	}

	#[test]
	fn null_secret_means_generate() {
		let request = Request::set(1, "A", None);
		assert_eq!(request.secret(), None);
		assert_eq!(Request::parse(r#"{"id":1,"method":"set","name":"A"}"#).unwrap().secret(), None);
	}

	#[test]
	fn restore_request_exposes_version_id() {
		let request = Request::restore(9, "KEYPAIR1", "a1");
		assert_eq!(request.version_id(), Some("a1"));
		assert_eq!(Request::get(1, "KEYPAIR1").version_id(), None);
	}

	#[test]
	fn parse_rejects_notify_and_unknown_methods() {
		assert!(matches!(
			Request::parse(r#"{"id":1,"method":"notify","name":"A"}"#),
			Err(ProtocolError::Invalid(_))
		));
		assert!(matches!(
			Request::parse(r#"{"id":1,"method":"delete","name":"A"}"#),
			Err(ProtocolError::Malformed(_))
		));
		assert!(Request::parse("not json").is_err());
	}

	#[test]
	fn server_frame_dispatches_on_method() {
		let frame = ServerFrame::parse(r#"{"method":"notify","name":"A","payload":{"secret":1}}"#).unwrap();
		assert!(matches!(frame, ServerFrame::Notify(ref n) if n.name == "A" && n.payload.secret == json!(1)));

		let frame = ServerFrame::parse(r#"{"id":7,"error":"not-found"}"#).unwrap();
		assert_eq!(frame, ServerFrame::Response(Response::not_found(7)));
	}

	#[test]
	fn method_parses_from_str() {
		for method in Method::REQUESTS {
			assert_eq!(method.as_str().parse::<Method>().unwrap(), method);
		}
		assert!("bogus".parse::<Method>().is_err());
	}
}
