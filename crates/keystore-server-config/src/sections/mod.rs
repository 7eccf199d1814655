// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for keystore-server.

pub mod auth;
pub mod http;
pub mod logging;
pub mod stores;

pub use auth::{AuthConfig, AuthConfigLayer, CredentialRule, CredentialRuleLayer, WILDCARD};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use stores::{AdapterKind, StoreConfig, StoreConfigLayer};
