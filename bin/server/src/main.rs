// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{env, str::FromStr, sync::Arc, time::Duration};

use liveq_broker::{Broker, BrokerConfig, DEFAULT_PUSH_INTERVAL};
use liveq_store_memory::MemoryStore;
use liveq_sub_api::Subsystem;
use liveq_sub_server_ws::{WsConfig, WsSubsystem, config::DEFAULT_MAX_CONNECTIONS};
use liveq_sub_tracing::{LogFormat, TracingBuilder};
use liveq_types::Result;

/// Read and parse an environment variable, falling back to `default` when it
/// is unset or invalid.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
	match env::var(name) {
		Ok(value) => match value.parse() {
			Ok(parsed) => parsed,
			Err(_) => {
				tracing::warn!("Ignoring invalid {}={}", name, value);
				default
			}
		},
		Err(_) => default,
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let mut logging = TracingBuilder::new()
		.with_level("info")
		.with_directive("tokio_tungstenite=warn")
		.with_directive("tungstenite=warn")
		.with_format(LogFormat::parse(&env::var("LIVEQ_LOG_FORMAT").unwrap_or_default()))
		.build();
	logging.start().await?;

	let store = Arc::new(MemoryStore::new());
	store.create_collection("jobs");

	let push_interval = env_or("LIVEQ_PUSH_INTERVAL_MS", DEFAULT_PUSH_INTERVAL.as_millis() as u64);
	let broker = Broker::new(store, BrokerConfig::new().push_interval(Duration::from_millis(push_interval)));

	let config = WsConfig::new()
		.bind_addr(env::var("LIVEQ_BIND").unwrap_or_else(|_| WsConfig::default().bind_addr))
		.max_connections(env_or("LIVEQ_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS));
	let mut ws = WsSubsystem::new(config, broker);
	ws.start().await?;
	tracing::info!("LiveQ server listening on {:?}", ws.local_addr());

	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!("Failed to listen for ctrl-c: {}", e);
	}

	tracing::info!("Shutting down LiveQ server...");
	ws.shutdown().await?;
	logging.shutdown().await?;
	Ok(())
}
