// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Keystore sync server binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use keystore_server::{build_registry, KeyStoreServer, StaticAuthenticator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Keystore server - WebSocket sync server for versioned secrets.
#[derive(Parser, Debug)]
#[command(name = "keystore-server", about = "Versioned secret sync server", version)]
struct Args {
	/// Config file to load instead of /etc/keystore/server.toml
	#[arg(long, short, env = "KEYSTORE_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("keystore-server version: {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	// Load .env file if present
	dotenvy::dotenv().ok();

	let config = match args.config {
		Some(path) => keystore_server_config::load_config_with_file(path)?,
		None => keystore_server_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		stores = config.stores.len(),
		"starting keystore-server"
	);

	let registry = build_registry(&config.stores)?;
	registry.initialize_all().await?;

	let server = KeyStoreServer::new(registry, StaticAuthenticator::from_config(&config.auth));

	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = server.serve(listener) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	server.shutdown().await;
	tracing::info!("Server shutdown complete");
	Ok(())
}
