// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Per-connection subscription tracking.
//!
//! A connection may subscribe to the same query more than once; every
//! subscribe contributes one membership that needs its own unsubscribe. The
//! multiset is kept as a count per handle.

use std::collections::HashMap;

use liveq_types::{ConnectionId, QueryId};

#[derive(Default)]
pub struct ConnectionTracker {
	connections: HashMap<ConnectionId, HashMap<QueryId, usize>>,
}

impl ConnectionTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record one membership. Returns the new count for `(connection, id)`.
	pub fn add(&mut self, connection_id: ConnectionId, id: QueryId) -> usize {
		let count = self.connections.entry(connection_id).or_default().entry(id).or_insert(0);
		*count += 1;
		*count
	}

	/// Remove one membership.
	///
	/// Returns the remaining count, or `None` if the connection held none.
	pub fn remove(&mut self, connection_id: &ConnectionId, id: QueryId) -> Option<usize> {
		let memberships = self.connections.get_mut(connection_id)?;
		let count = memberships.get_mut(&id)?;
		*count -= 1;
		let remaining = *count;

		if remaining == 0 {
			memberships.remove(&id);
			if memberships.is_empty() {
				self.connections.remove(connection_id);
			}
		}
		Some(remaining)
	}

	/// Remove every membership of `connection_id` on `id`, returning how many
	/// there were.
	pub fn remove_all(&mut self, connection_id: &ConnectionId, id: QueryId) -> usize {
		let Some(memberships) = self.connections.get_mut(connection_id) else {
			return 0;
		};
		let removed = memberships.remove(&id).unwrap_or(0);
		if memberships.is_empty() {
			self.connections.remove(connection_id);
		}
		removed
	}

	pub fn count(&self, connection_id: &ConnectionId, id: QueryId) -> usize {
		self.connections.get(connection_id).and_then(|m| m.get(&id)).copied().unwrap_or(0)
	}

	pub fn holds(&self, connection_id: &ConnectionId, id: QueryId) -> bool {
		self.count(connection_id, id) > 0
	}

	/// Snapshot of the memberships of `connection_id` with their counts.
	pub fn memberships(&self, connection_id: &ConnectionId) -> Vec<(QueryId, usize)> {
		self.connections
			.get(connection_id)
			.map(|m| m.iter().map(|(id, count)| (*id, *count)).collect())
			.unwrap_or_default()
	}

	/// Forget the connection, returning its memberships.
	pub fn disconnect(&mut self, connection_id: &ConnectionId) -> HashMap<QueryId, usize> {
		self.connections.remove(connection_id).unwrap_or_default()
	}

	/// Number of connections holding at least one membership.
	pub fn connection_count(&self) -> usize {
		self.connections.len()
	}

	/// Total memberships, duplicates included.
	pub fn membership_count(&self) -> usize {
		self.connections.values().flat_map(|m| m.values()).sum()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_duplicate_memberships_are_counted() {
		let mut tracker = ConnectionTracker::new();
		let connection_id = ConnectionId::generate();

		assert_eq!(tracker.add(connection_id, QueryId(0)), 1);
		assert_eq!(tracker.add(connection_id, QueryId(0)), 2);
		assert_eq!(tracker.add(connection_id, QueryId(1)), 1);
		assert_eq!(tracker.membership_count(), 3);

		assert_eq!(tracker.remove(&connection_id, QueryId(0)), Some(1));
		assert!(tracker.holds(&connection_id, QueryId(0)));
		assert_eq!(tracker.remove(&connection_id, QueryId(0)), Some(0));
		assert!(!tracker.holds(&connection_id, QueryId(0)));
		assert_eq!(tracker.remove(&connection_id, QueryId(0)), None);

		assert_eq!(tracker.connection_count(), 1);
		assert_eq!(tracker.remove(&connection_id, QueryId(1)), Some(0));
		assert_eq!(tracker.connection_count(), 0);
	}

	#[test]
	fn test_remove_from_unknown_connection() {
		let mut tracker = ConnectionTracker::new();
		assert_eq!(tracker.remove(&ConnectionId::generate(), QueryId(0)), None);
		assert_eq!(tracker.remove_all(&ConnectionId::generate(), QueryId(0)), 0);
	}

	#[test]
	fn test_disconnect_returns_all_memberships() {
		let mut tracker = ConnectionTracker::new();
		let a = ConnectionId::generate();
		let b = ConnectionId::generate();

		tracker.add(a, QueryId(0));
		tracker.add(a, QueryId(0));
		tracker.add(a, QueryId(2));
		tracker.add(b, QueryId(0));

		let memberships = tracker.disconnect(&a);
		assert_eq!(memberships.get(&QueryId(0)), Some(&2));
		assert_eq!(memberships.get(&QueryId(2)), Some(&1));
		assert_eq!(tracker.connection_count(), 1);
		assert_eq!(tracker.count(&b, QueryId(0)), 1);
		assert!(tracker.disconnect(&a).is_empty());
	}

	#[test]
	fn test_remove_all() {
		let mut tracker = ConnectionTracker::new();
		let a = ConnectionId::generate();
		tracker.add(a, QueryId(5));
		tracker.add(a, QueryId(5));

		assert_eq!(tracker.remove_all(&a, QueryId(5)), 2);
		assert_eq!(tracker.connection_count(), 0);
	}
}
