// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Contract of the document store the broker multiplexes.
//!
//! The broker never executes queries itself. It asks the store whether a
//! collection exists, runs `find` for snapshots and recomputes, and opens one
//! [`ChangeStream`] per live query through `watch`.

use std::{
	fmt,
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicU64, Ordering},
	},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{Document, Result};

#[async_trait]
pub trait Store: Send + Sync + 'static {
	/// Names of every existing collection.
	async fn list_collections(&self) -> Result<Vec<String>>;

	/// Execute a query against the current state of `collection`.
	async fn find(&self, collection: &str, filter: &Value, options: &Value) -> Result<Vec<Document>>;

	/// Open a change notification stream for writes relevant to `filter`.
	async fn watch(&self, collection: &str, filter: &Value) -> Result<ChangeStream>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
	Insert,
	Update,
	Remove,
}

/// A write the store observed on a watched collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
	pub collection: String,
	pub kind: ChangeKind,
	pub document_id: String,
}

/// Handle to an open watch.
///
/// Clones share the same closed flag, so the broker can close a watch
/// synchronously while the stream itself is owned by a background task.
#[derive(Clone)]
pub struct WatchHandle {
	id: u64,
	closed: Arc<AtomicBool>,
}

/// Counter for generating unique watch IDs.
static WATCH_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

impl WatchHandle {
	pub fn new() -> Self {
		Self {
			id: WATCH_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
			closed: Arc::new(AtomicBool::new(false)),
		}
	}

	/// Close the watch.
	///
	/// Returns `true` if this call closed it.
	pub fn close(&self) -> bool {
		self.closed.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok()
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	pub fn id(&self) -> u64 {
		self.id
	}
}

impl Default for WatchHandle {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for WatchHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WatchHandle").field("id", &self.id).field("closed", &self.is_closed()).finish()
	}
}

/// Receiving side of a watch.
///
/// Dropping the stream closes the watch.
pub struct ChangeStream {
	handle: WatchHandle,
	events: mpsc::Receiver<ChangeEvent>,
}

impl ChangeStream {
	pub fn new(handle: WatchHandle, events: mpsc::Receiver<ChangeEvent>) -> Self {
		Self {
			handle,
			events,
		}
	}

	pub fn handle(&self) -> WatchHandle {
		self.handle.clone()
	}

	/// Wait for the next change.
	///
	/// Returns `None` once the watch is closed from either side.
	pub async fn changed(&mut self) -> Option<ChangeEvent> {
		if self.handle.is_closed() {
			return None;
		}
		self.events.recv().await
	}

	/// Take an already queued change without waiting.
	pub fn try_changed(&mut self) -> Option<ChangeEvent> {
		if self.handle.is_closed() {
			return None;
		}
		self.events.try_recv().ok()
	}

	pub fn close(self) {
		drop(self)
	}
}

impl Drop for ChangeStream {
	fn drop(&mut self) {
		self.handle.close();
		self.events.close();
	}
}
