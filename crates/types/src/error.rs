// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use serde::{Deserialize, Serialize};

use crate::QueryId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
	#[error("collection '{collection}' does not exist")]
	UnknownCollection {
		collection: String,
	},

	#[error("failed to watch collection '{collection}': {reason}")]
	WatchFailed {
		collection: String,
		reason: String,
	},

	#[error("store error: {reason}")]
	Store {
		reason: String,
	},

	#[error("query {query_id} is not subscribed by this connection")]
	UnknownQuery {
		query_id: QueryId,
	},

	#[error("invalid request: {reason}")]
	InvalidRequest {
		reason: String,
	},

	#[error("subscription to query {query_id} was cancelled before it became active")]
	Cancelled {
		query_id: QueryId,
	},

	#[error("failed to bind {addr}: {reason}")]
	BindFailed {
		addr: String,
		reason: String,
	},
}

impl Error {
	pub fn store(reason: impl Into<String>) -> Self {
		Error::Store {
			reason: reason.into(),
		}
	}

	/// Stable code carried on the wire next to the message.
	pub fn code(&self) -> &'static str {
		match self {
			Error::UnknownCollection {
				..
			} => "LQ_001",
			Error::WatchFailed {
				..
			} => "LQ_002",
			Error::Store {
				..
			} => "LQ_003",
			Error::UnknownQuery {
				..
			} => "LQ_004",
			Error::InvalidRequest {
				..
			} => "LQ_005",
			Error::Cancelled {
				..
			} => "LQ_006",
			Error::BindFailed {
				..
			} => "LQ_007",
		}
	}

	pub fn diagnostic(&self) -> Diagnostic {
		Diagnostic {
			code: self.code().to_string(),
			message: self.to_string(),
		}
	}
}

/// Error representation sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
	pub code: String,
	pub message: String,
}

impl From<&Error> for Diagnostic {
	fn from(err: &Error) -> Self {
		err.diagnostic()
	}
}

impl std::fmt::Display for Diagnostic {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "[{}] {}", self.code, self.message)
	}
}
