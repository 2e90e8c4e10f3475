// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::any::Any;

use async_trait::async_trait;
use liveq_sub_api::{HealthStatus, Subsystem};
use liveq_types::Result;
use tracing_subscriber::{fmt, util::SubscriberInitExt};

use crate::builder::{LogFormat, TracingBuilder};

/// Installs the global tracing subscriber on start.
///
/// Only one subscriber can be installed per process. If another one is
/// already in place, start logs that fact through it and succeeds anyway.
pub struct TracingSubsystem {
	builder: TracingBuilder,
	running: bool,
	installed: bool,
}

impl TracingSubsystem {
	pub fn new(builder: TracingBuilder) -> Self {
		Self {
			builder,
			running: false,
			installed: false,
		}
	}

	/// Whether this instance installed the global subscriber.
	pub fn is_installed(&self) -> bool {
		self.installed
	}

	fn install(&self) -> bool {
		let filter = self.builder.env_filter();
		let result = match self.builder.format() {
			LogFormat::Compact => fmt()
				.compact()
				.with_env_filter(filter)
				.with_target(self.builder.target())
				.finish()
				.try_init(),
			LogFormat::Json => fmt()
				.json()
				.with_env_filter(filter)
				.with_target(self.builder.target())
				.finish()
				.try_init(),
		};
		result.is_ok()
	}
}

#[async_trait]
impl Subsystem for TracingSubsystem {
	fn name(&self) -> &'static str {
		"Tracing"
	}

	async fn start(&mut self) -> Result<()> {
		if self.running {
			return Ok(());
		}

		self.installed = self.install();
		if !self.installed {
			tracing::debug!("Global tracing subscriber already set, keeping it");
		}
		self.running = true;
		Ok(())
	}

	async fn shutdown(&mut self) -> Result<()> {
		self.running = false;
		Ok(())
	}

	fn is_running(&self) -> bool {
		self.running
	}

	fn health_status(&self) -> HealthStatus {
		if self.running {
			HealthStatus::Healthy
		} else {
			HealthStatus::Failed {
				description: "Not running".to_string(),
			}
		}
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}
