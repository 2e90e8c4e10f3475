// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{self, Display, Formatter},
	ops::Deref,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle of an active live query.
///
/// Handles come from a monotonically increasing counter and are never handed
/// out twice within one broker, even after the query they named was retired.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(pub u64);

impl Display for QueryId {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		Display::fmt(&self.0, f)
	}
}

impl Deref for QueryId {
	type Target = u64;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl PartialEq<u64> for QueryId {
	fn eq(&self, other: &u64) -> bool {
		self.0.eq(other)
	}
}

impl From<QueryId> for u64 {
	fn from(value: QueryId) -> Self {
		value.0
	}
}

impl From<u64> for QueryId {
	fn from(value: u64) -> Self {
		QueryId(value)
	}
}

/// Identifier of one client connection.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
	/// Generate a new time-ordered connection id.
	pub fn generate() -> Self {
		ConnectionId(Uuid::now_v7())
	}
}

impl Display for ConnectionId {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		Display::fmt(&self.0, f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_query_id_conversions() {
		let id = QueryId::from(7);
		assert_eq!(u64::from(id), 7);
		assert_eq!(id, 7);
		assert_eq!(id.to_string(), "7");
	}

	#[test]
	fn test_connection_ids_are_unique() {
		assert_ne!(ConnectionId::generate(), ConnectionId::generate());
	}
}
