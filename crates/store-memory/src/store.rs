// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::BTreeMap,
	sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use indexmap::IndexMap;
use liveq_types::{ChangeEvent, ChangeKind, ChangeStream, Document, Error, Result, Store, WatchHandle};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{filter::matches, options, options::ID_FIELD};

/// Pending notifications per watch. A full channel already tells the watcher
/// that something changed, so further events can be dropped.
const WATCH_CHANNEL_CAPACITY: usize = 16;

struct Watcher {
	filter: Value,
	handle: WatchHandle,
	tx: mpsc::Sender<ChangeEvent>,
}

#[derive(Default)]
struct Collection {
	documents: IndexMap<String, Document>,
	next_id: u64,
	watchers: Vec<Watcher>,
}

impl Collection {
	fn prune(&mut self, collection: &str) {
		self.watchers.retain(|watcher| {
			let closed = watcher.handle.is_closed() || watcher.tx.is_closed();
			if closed {
				debug!("Pruned closed watch {} on {}", watcher.handle.id(), collection);
			}
			!closed
		});
	}

	/// Next auto-assigned `_id` not taken by an explicit one.
	fn assign_id(&mut self) -> String {
		loop {
			self.next_id += 1;
			let id = self.next_id.to_string();
			if !self.documents.contains_key(&id) {
				return id;
			}
		}
	}

	fn notify(&mut self, collection: &str, kind: ChangeKind, id: &str, old: Option<&Document>, new: Option<&Document>) {
		self.prune(collection);
		for watcher in &self.watchers {
			let relevant = old.is_some_and(|doc| matches(&watcher.filter, doc))
				|| new.is_some_and(|doc| matches(&watcher.filter, doc));
			if relevant {
				// Full means a notification is already pending.
				let _ = watcher.tx.try_send(ChangeEvent {
					collection: collection.to_string(),
					kind,
					document_id: id.to_string(),
				});
			}
		}
	}
}

/// Thread-safe in-memory document store.
///
/// Documents keep insertion order and are keyed by their `_id` field, which
/// is assigned on insert when missing.
#[derive(Default)]
pub struct MemoryStore {
	collections: RwLock<BTreeMap<String, Collection>>,
	watches_opened: AtomicUsize,
	fail_next_watch: AtomicBool,
	fail_next_find: AtomicBool,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Create an empty collection. Returns `false` if it already existed.
	pub fn create_collection(&self, name: impl Into<String>) -> bool {
		let mut collections = self.collections.write();
		let name = name.into();
		if collections.contains_key(&name) {
			return false;
		}
		collections.insert(name, Collection::default());
		true
	}

	/// Insert a document, returning its `_id`.
	pub fn insert(&self, collection: &str, document: Document) -> Result<String> {
		let Value::Object(mut fields) = document else {
			return Err(Error::store("documents must be JSON objects"));
		};

		let mut collections = self.collections.write();
		let entry = collections.get_mut(collection).ok_or_else(|| unknown(collection))?;

		let id = match fields.get(ID_FIELD) {
			Some(Value::String(id)) => id.clone(),
			Some(Value::Number(n)) => n.to_string(),
			Some(_) => return Err(Error::store("_id must be a string or a number")),
			None => {
				let id = entry.assign_id();
				fields.insert(ID_FIELD.to_string(), Value::String(id.clone()));
				id
			}
		};

		if entry.documents.contains_key(&id) {
			return Err(Error::store(format!("duplicate _id '{}' in '{}'", id, collection)));
		}

		let document = Value::Object(fields);
		entry.notify(collection, ChangeKind::Insert, &id, None, Some(&document));
		entry.documents.insert(id.clone(), document);
		Ok(id)
	}

	/// Shallow-merge `patch` into the document `id`.
	///
	/// Returns `false` if no such document exists.
	pub fn update(&self, collection: &str, id: &str, patch: Document) -> Result<bool> {
		let Value::Object(patch) = patch else {
			return Err(Error::store("patch must be a JSON object"));
		};

		let mut collections = self.collections.write();
		let entry = collections.get_mut(collection).ok_or_else(|| unknown(collection))?;

		let Some(current) = entry.documents.get(id) else {
			return Ok(false);
		};

		let old = current.clone();
		let mut updated = current.clone();
		if let Value::Object(fields) = &mut updated {
			for (key, value) in patch {
				if key != ID_FIELD {
					fields.insert(key, value);
				}
			}
		}

		entry.notify(collection, ChangeKind::Update, id, Some(&old), Some(&updated));
		entry.documents.insert(id.to_string(), updated);
		Ok(true)
	}

	pub fn remove(&self, collection: &str, id: &str) -> Result<bool> {
		let mut collections = self.collections.write();
		let entry = collections.get_mut(collection).ok_or_else(|| unknown(collection))?;

		match entry.documents.shift_remove(id) {
			Some(old) => {
				entry.notify(collection, ChangeKind::Remove, id, Some(&old), None);
				Ok(true)
			}
			None => Ok(false),
		}
	}

	pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
		self.collections.read().get(collection)?.documents.get(id).cloned()
	}

	/// Total number of `watch` calls that succeeded.
	pub fn watches_opened(&self) -> usize {
		self.watches_opened.load(Ordering::SeqCst)
	}

	/// Number of watches that are still open.
	pub fn active_watches(&self) -> usize {
		self.collections
			.read()
			.values()
			.flat_map(|c| c.watchers.iter())
			.filter(|w| !w.handle.is_closed() && !w.tx.is_closed())
			.count()
	}

	/// Make the next `watch` call fail.
	pub fn fail_next_watch(&self) {
		self.fail_next_watch.store(true, Ordering::SeqCst);
	}

	/// Make the next `find` call fail.
	pub fn fail_next_find(&self) {
		self.fail_next_find.store(true, Ordering::SeqCst);
	}
}

fn unknown(collection: &str) -> Error {
	Error::UnknownCollection {
		collection: collection.to_string(),
	}
}

#[async_trait]
impl Store for MemoryStore {
	async fn list_collections(&self) -> Result<Vec<String>> {
		Ok(self.collections.read().keys().cloned().collect())
	}

	async fn find(&self, collection: &str, filter: &Value, options: &Value) -> Result<Vec<Document>> {
		if self.fail_next_find.swap(false, Ordering::SeqCst) {
			return Err(Error::store(format!("find on '{}' failed", collection)));
		}

		let selected: Vec<Document> = {
			let collections = self.collections.read();
			let entry = collections.get(collection).ok_or_else(|| unknown(collection))?;
			entry.documents.values().filter(|doc| matches(filter, doc)).cloned().collect()
		};

		Ok(options::apply(selected, options))
	}

	async fn watch(&self, collection: &str, filter: &Value) -> Result<ChangeStream> {
		if self.fail_next_watch.swap(false, Ordering::SeqCst) {
			return Err(Error::WatchFailed {
				collection: collection.to_string(),
				reason: "change stream unavailable".to_string(),
			});
		}

		let mut collections = self.collections.write();
		let entry = collections.get_mut(collection).ok_or_else(|| unknown(collection))?;

		entry.prune(collection);

		let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
		let handle = WatchHandle::new();
		entry.watchers.push(Watcher {
			filter: filter.clone(),
			handle: handle.clone(),
			tx,
		});
		self.watches_opened.fetch_add(1, Ordering::SeqCst);

		debug!("Opened watch {} on {}", handle.id(), collection);
		Ok(ChangeStream::new(handle, rx))
	}
}
