// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

use liveq_types::Diagnostic;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
	#[error("failed to connect to {url}: {reason}")]
	Connect {
		url: String,
		reason: String,
	},

	#[error("connection closed")]
	ConnectionClosed,

	#[error("server error {0}")]
	Remote(Diagnostic),

	#[error("unexpected response to {request}")]
	UnexpectedResponse {
		request: &'static str,
	},

	#[error("cursor is not subscribed")]
	NotSubscribed,

	#[error("cursor is already subscribed")]
	AlreadySubscribed,
}

impl ClientError {
	/// Diagnostic code of a server-side error.
	pub fn code(&self) -> Option<&str> {
		match self {
			ClientError::Remote(diagnostic) => Some(&diagnostic.code),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_remote_error_exposes_code() {
		let err = ClientError::Remote(Diagnostic {
			code: "LQ_001".to_string(),
			message: "collection 'x' does not exist".to_string(),
		});
		assert_eq!(err.code(), Some("LQ_001"));
		assert_eq!(err.to_string(), "server error [LQ_001] collection 'x' does not exist");
		assert_eq!(ClientError::ConnectionClosed.code(), None);
	}
}
