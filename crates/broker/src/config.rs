// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

/// Default minimum time between two pushes of the same live query.
pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct BrokerConfig {
	/// Changes arriving within this window after a push are coalesced into
	/// the next one.
	pub push_interval: Duration,
}

impl BrokerConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push_interval(mut self, interval: Duration) -> Self {
		self.push_interval = interval;
		self
	}
}

impl Default for BrokerConfig {
	fn default() -> Self {
		Self {
			push_interval: DEFAULT_PUSH_INTERVAL,
		}
	}
}
