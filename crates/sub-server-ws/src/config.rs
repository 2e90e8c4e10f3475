// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8091";
pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;
pub const DEFAULT_PUSH_CHANNEL_CAPACITY: usize = 100;

/// WebSocket server configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
	/// Address and port to bind to, e.g. `"0.0.0.0:8091"`. Port `0` picks a
	/// free port.
	pub bind_addr: String,
	pub max_connections: usize,
	/// Pushes a connection may have queued before further ones are dropped.
	pub push_channel_capacity: usize,
}

impl WsConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
		self.bind_addr = addr.into();
		self
	}

	pub fn max_connections(mut self, max: usize) -> Self {
		self.max_connections = max;
		self
	}

	pub fn push_channel_capacity(mut self, capacity: usize) -> Self {
		self.push_channel_capacity = capacity.max(1);
		self
	}
}

impl Default for WsConfig {
	fn default() -> Self {
		Self {
			bind_addr: DEFAULT_BIND_ADDR.to_string(),
			max_connections: DEFAULT_MAX_CONNECTIONS,
			push_channel_capacity: DEFAULT_PUSH_CHANNEL_CAPACITY,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builder() {
		let config = WsConfig::new().bind_addr("127.0.0.1:0").max_connections(2).push_channel_capacity(0);
		assert_eq!(config.bind_addr, "127.0.0.1:0");
		assert_eq!(config.max_connections, 2);
		assert_eq!(config.push_channel_capacity, 1);
	}
}
