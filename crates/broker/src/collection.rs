// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Collection registry.
//!
//! Groups live watchers by collection. An entry exists exactly as long as it
//! holds at least one watcher.

use std::collections::HashMap;

use liveq_types::{QueryId, QueryParameters};
use tracing::debug;

use crate::watcher::Watcher;

pub struct CollectionEntry {
	name: String,
	watchers: HashMap<QueryId, Watcher>,
}

impl CollectionEntry {
	fn new(name: String) -> Self {
		Self {
			name,
			watchers: HashMap::new(),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn watcher_count(&self) -> usize {
		self.watchers.len()
	}
}

#[derive(Default)]
pub struct CollectionRegistry {
	entries: HashMap<String, CollectionEntry>,
}

impl CollectionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Find the watcher of `id`, creating it (and the collection entry) if
	/// absent.
	///
	/// The flag is `true` when the watcher was created by this call; the caller
	/// is then responsible for opening its change stream. `generation` is only
	/// consulted for a new watcher.
	pub fn get_or_create_watcher(
		&mut self,
		params: &QueryParameters,
		id: QueryId,
		generation: impl FnOnce() -> u64,
	) -> (&mut Watcher, bool) {
		let entry = self.entries.entry(params.collection.clone()).or_insert_with(|| {
			debug!("Registered collection {}", params.collection);
			CollectionEntry::new(params.collection.clone())
		});

		let mut created = false;
		let watcher = entry.watchers.entry(id).or_insert_with(|| {
			created = true;
			Watcher::new(id, params.clone(), generation())
		});
		(watcher, created)
	}

	pub fn watcher(&self, collection: &str, id: QueryId) -> Option<&Watcher> {
		self.entries.get(collection)?.watchers.get(&id)
	}

	pub fn watcher_mut(&mut self, collection: &str, id: QueryId) -> Option<&mut Watcher> {
		self.entries.get_mut(collection)?.watchers.get_mut(&id)
	}

	/// Retire and drop the watcher if it has no subscribers left, dropping the
	/// collection entry with its last watcher.
	///
	/// Returns `true` if the watcher was removed.
	pub fn remove_watcher_if_empty(&mut self, collection: &str, id: QueryId) -> bool {
		let empty = self.watcher(collection, id).is_some_and(|w| w.subscriber_count() == 0);
		if !empty {
			return false;
		}
		self.remove_watcher(collection, id).is_some()
	}

	/// Retire and drop the watcher regardless of its subscribers.
	pub fn remove_watcher(&mut self, collection: &str, id: QueryId) -> Option<Watcher> {
		let entry = self.entries.get_mut(collection)?;
		let mut watcher = entry.watchers.remove(&id)?;
		watcher.retire();

		if entry.watchers.is_empty() {
			self.entries.remove(collection);
			debug!("Released collection {}", collection);
		}
		Some(watcher)
	}

	/// Whether at least one watcher remains for `collection`.
	pub fn is_referenced(&self, collection: &str) -> bool {
		self.entries.get(collection).is_some_and(|entry| !entry.watchers.is_empty())
	}

	pub fn contains(&self, collection: &str) -> bool {
		self.entries.contains_key(collection)
	}

	pub fn entry(&self, collection: &str) -> Option<&CollectionEntry> {
		self.entries.get(collection)
	}

	/// Number of collection entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Number of watchers across all collections.
	pub fn watcher_count(&self) -> usize {
		self.entries.values().map(CollectionEntry::watcher_count).sum()
	}
}

#[cfg(test)]
mod tests {
	use liveq_types::ConnectionId;
	use serde_json::json;

	use super::*;
	use crate::watcher::WatcherState;

	#[test]
	fn test_get_or_create_is_idempotent() {
		let mut registry = CollectionRegistry::new();
		let params = QueryParameters::all("jobs");

		let (watcher, created) = registry.get_or_create_watcher(&params, QueryId(0), || 1);
		assert!(created);
		assert_eq!(watcher.generation(), 1);

		let (watcher, created) = registry.get_or_create_watcher(&params, QueryId(0), || 2);
		assert!(!created);
		assert_eq!(watcher.generation(), 1);

		assert_eq!(registry.len(), 1);
		assert_eq!(registry.watcher_count(), 1);
	}

	#[test]
	fn test_entry_lives_while_watchers_remain() {
		let mut registry = CollectionRegistry::new();
		let all = QueryParameters::all("jobs");
		let queued = QueryParameters::new("jobs", json!({"status": "queued"}), json!({}));
		let connection_id = ConnectionId::generate();

		registry.get_or_create_watcher(&all, QueryId(0), || 0).0.subscribe(connection_id);
		registry.get_or_create_watcher(&queued, QueryId(1), || 1);
		assert_eq!(registry.entry("jobs").map(CollectionEntry::watcher_count), Some(2));

		// Still subscribed, so not removed.
		assert!(!registry.remove_watcher_if_empty("jobs", QueryId(0)));

		assert!(registry.remove_watcher_if_empty("jobs", QueryId(1)));
		assert!(registry.is_referenced("jobs"));

		registry.watcher_mut("jobs", QueryId(0)).unwrap().unsubscribe(&connection_id);
		assert!(registry.remove_watcher_if_empty("jobs", QueryId(0)));
		assert!(!registry.is_referenced("jobs"));
		assert!(!registry.contains("jobs"));
		assert!(registry.is_empty());
	}

	#[test]
	fn test_remove_retires_watcher() {
		let mut registry = CollectionRegistry::new();
		registry.get_or_create_watcher(&QueryParameters::all("jobs"), QueryId(4), || 0);

		let watcher = registry.remove_watcher("jobs", QueryId(4)).unwrap();
		assert_eq!(watcher.state(), WatcherState::Gone);
		assert!(registry.remove_watcher("jobs", QueryId(4)).is_none());
	}

	#[test]
	fn test_unknown_lookups() {
		let mut registry = CollectionRegistry::new();
		assert!(registry.watcher("jobs", QueryId(0)).is_none());
		assert!(registry.watcher_mut("jobs", QueryId(0)).is_none());
		assert!(!registry.remove_watcher_if_empty("jobs", QueryId(0)));
		assert!(!registry.is_referenced("jobs"));
	}
}
