// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Query identity registry.
//!
//! Maps canonical query keys to [`QueryId`] handles. Handles come from a
//! counter that only moves forward, so a retired handle is never reassigned:
//! a connection holding a stale handle can never be silently remapped onto a
//! newer query.

use std::collections::HashMap;

use liveq_types::{CanonicalKey, QueryId, QueryParameters};

struct Entry {
	key: CanonicalKey,
	params: QueryParameters,
}

#[derive(Default)]
pub struct IdentityRegistry {
	next: u64,
	by_key: HashMap<CanonicalKey, QueryId>,
	by_id: HashMap<QueryId, Entry>,
}

impl IdentityRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Return the live handle of `params`, allocating one if there is none.
	///
	/// The flag is `true` when the handle was allocated by this call.
	pub fn resolve(&mut self, params: &QueryParameters) -> (QueryId, bool) {
		let key = params.canonical_key();
		if let Some(id) = self.by_key.get(&key) {
			return (*id, false);
		}

		let id = QueryId(self.next);
		self.next += 1;

		self.by_key.insert(key.clone(), id);
		self.by_id.insert(
			id,
			Entry {
				key,
				params: params.clone(),
			},
		);
		(id, true)
	}

	/// Drop the mapping of a retired handle.
	pub fn release(&mut self, id: QueryId) -> Option<QueryParameters> {
		let entry = self.by_id.remove(&id)?;
		self.by_key.remove(&entry.key);
		Some(entry.params)
	}

	pub fn lookup_parameters(&self, id: QueryId) -> Option<&QueryParameters> {
		self.by_id.get(&id).map(|entry| &entry.params)
	}

	/// Number of live handles.
	pub fn len(&self) -> usize {
		self.by_id.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_id.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_resolve_deduplicates() {
		let mut registry = IdentityRegistry::new();
		let (a, created_a) = registry.resolve(&QueryParameters::new("jobs", json!({"x": 1, "y": 2}), json!({})));
		let (b, created_b) = registry.resolve(&QueryParameters::new("jobs", json!({"y": 2, "x": 1}), json!(null)));

		assert_eq!(a, b);
		assert!(created_a);
		assert!(!created_b);
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn test_distinct_queries_get_distinct_handles() {
		let mut registry = IdentityRegistry::new();
		let (a, _) = registry.resolve(&QueryParameters::all("jobs"));
		let (b, _) = registry.resolve(&QueryParameters::all("workers"));
		assert_eq!(a, QueryId(0));
		assert_eq!(b, QueryId(1));
	}

	#[test]
	fn test_released_handles_are_never_reused() {
		let mut registry = IdentityRegistry::new();
		let params = QueryParameters::all("jobs");

		let (first, _) = registry.resolve(&params);
		assert_eq!(registry.release(first), Some(params.clone()));
		assert!(registry.is_empty());
		assert!(registry.lookup_parameters(first).is_none());

		let (second, created) = registry.resolve(&params);
		assert!(created);
		assert_eq!(second, QueryId(1));
		assert_ne!(first, second);
	}

	#[test]
	fn test_release_unknown_handle() {
		let mut registry = IdentityRegistry::new();
		assert!(registry.release(QueryId(42)).is_none());
	}

	#[test]
	fn test_lookup_parameters() {
		let mut registry = IdentityRegistry::new();
		let params = QueryParameters::new("jobs", json!({"status": "queued"}), json!({"limit": 5}));
		let (id, _) = registry.resolve(&params);
		assert_eq!(registry.lookup_parameters(id), Some(&params));
	}
}
