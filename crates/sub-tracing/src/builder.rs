// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use tracing_subscriber::EnvFilter;

use crate::subsystem::TracingSubsystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
	/// Human readable, one line per event.
	Compact,
	/// JSON lines.
	Json,
}

impl LogFormat {
	pub fn parse(s: &str) -> Self {
		match s.to_lowercase().as_str() {
			"json" | "jsonl" => LogFormat::Json,
			_ => LogFormat::Compact,
		}
	}
}

/// Builder for the tracing subsystem.
///
/// `RUST_LOG` takes precedence over the configured level when set.
#[derive(Debug, Clone)]
pub struct TracingBuilder {
	level: String,
	directives: Vec<String>,
	format: LogFormat,
	with_target: bool,
}

impl Default for TracingBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl TracingBuilder {
	pub fn new() -> Self {
		Self {
			level: "info".to_string(),
			directives: Vec::new(),
			format: LogFormat::Compact,
			with_target: true,
		}
	}

	pub fn with_level(mut self, level: impl Into<String>) -> Self {
		self.level = level.into();
		self
	}

	/// Add a per-target directive such as `tokio_tungstenite=warn`.
	pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
		self.directives.push(directive.into());
		self
	}

	pub fn with_format(mut self, format: LogFormat) -> Self {
		self.format = format;
		self
	}

	pub fn with_target(mut self, with_target: bool) -> Self {
		self.with_target = with_target;
		self
	}

	/// Directive string used when `RUST_LOG` is not set.
	pub fn filter_directives(&self) -> String {
		let mut directives = vec![self.level.clone()];
		directives.extend(self.directives.iter().cloned());
		directives.join(",")
	}

	pub(crate) fn env_filter(&self) -> EnvFilter {
		EnvFilter::try_from_default_env()
			.or_else(|_| EnvFilter::try_new(self.filter_directives()))
			.unwrap_or_else(|_| EnvFilter::new("info"))
	}

	pub(crate) fn format(&self) -> LogFormat {
		self.format
	}

	pub(crate) fn target(&self) -> bool {
		self.with_target
	}

	pub fn build(self) -> TracingSubsystem {
		TracingSubsystem::new(self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_filter_directives() {
		let builder = TracingBuilder::new().with_level("debug").with_directive("tokio_tungstenite=warn");
		assert_eq!(builder.filter_directives(), "debug,tokio_tungstenite=warn");
	}

	#[test]
	fn test_parse_format() {
		assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
		assert_eq!(LogFormat::parse("jsonl"), LogFormat::Json);
		assert_eq!(LogFormat::parse("pretty"), LogFormat::Compact);
	}
}
