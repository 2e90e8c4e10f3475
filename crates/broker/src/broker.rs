// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The reactive query broker.
//!
//! All registry state lives in one [`BrokerState`] behind a mutex that is
//! never held across an `.await`. Every operation is a sequence of short
//! critical sections separated by store calls, and each section after a
//! store call re-validates what it saw before it (watcher still registered,
//! same generation, membership still held).
//!
//! Memberships are recorded before any snapshot is taken, so an unsubscribe
//! or disconnect racing with a pending subscribe always finds consistent
//! state. The first subscriber of a new query reserves its watcher in
//! `Opening` state and opens the change stream; concurrent subscribers of the
//! same query join the reservation and wait for it instead of opening another
//! stream.

use std::sync::{Arc, Weak};

use liveq_types::{ConnectionId, Document, Error, QueryId, QueryParameters, Result, Store};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
	collection::CollectionRegistry,
	config::BrokerConfig,
	connection::ConnectionTracker,
	identity::IdentityRegistry,
	push::{DeliveryResult, PushMessage, PushRegistry},
	watcher::{UpdateSink, WatcherState, wait_ready},
};

/// Answer to a successful subscribe.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
	pub query_id: QueryId,
	/// Snapshot taken after the subscription was registered.
	pub documents: Vec<Document>,
}

/// Point-in-time counters of the broker registries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
	/// Live query handles.
	pub queries: usize,
	pub watchers: usize,
	pub collections: usize,
	/// Connections holding at least one membership.
	pub connections: usize,
	/// Memberships, duplicates included.
	pub memberships: usize,
	pub push_channels: usize,
}

#[derive(Default)]
struct BrokerState {
	identities: IdentityRegistry,
	collections: CollectionRegistry,
	connections: ConnectionTracker,
	next_generation: u64,
}

impl BrokerState {
	/// Drop one membership and cascade the cleanup.
	///
	/// Returns `false` if the connection did not hold `query_id`.
	fn release(&mut self, connection_id: &ConnectionId, query_id: QueryId) -> bool {
		let Some(remaining) = self.connections.remove(connection_id, query_id) else {
			return false;
		};
		if remaining > 0 {
			return true;
		}

		let Some(collection) = self.identities.lookup_parameters(query_id).map(|p| p.collection.clone()) else {
			return true;
		};

		let is_last = self
			.collections
			.watcher_mut(&collection, query_id)
			.is_some_and(|watcher| watcher.unsubscribe(connection_id));

		if is_last && self.collections.remove_watcher_if_empty(&collection, query_id) {
			self.identities.release(query_id);
			debug!("Released query {} on {}", query_id, collection);
		}
		true
	}

	/// Undo the reservation of a watcher whose change stream never opened.
	///
	/// Removes the watcher if it is still the one of `generation`, drops
	/// every membership it carried, releases the handle and wakes waiting
	/// subscribers with `err`. Returns the number of subscribers rolled back,
	/// or `None` if the watcher was already gone or replaced.
	fn abort_open(&mut self, collection: &str, query_id: QueryId, generation: u64, err: Error) -> Option<usize> {
		if !self.collections.watcher(collection, query_id).is_some_and(|w| w.generation() == generation) {
			return None;
		}
		let mut watcher = self.collections.remove_watcher(collection, query_id)?;
		let subscribers: Vec<ConnectionId> = watcher.subscribers().copied().collect();
		for connection_id in &subscribers {
			self.connections.remove_all(connection_id, query_id);
		}
		self.identities.release(query_id);
		watcher.fail(err);
		Some(subscribers.len())
	}

	fn subscribers(&self, query_id: QueryId) -> Vec<ConnectionId> {
		self.identities
			.lookup_parameters(query_id)
			.and_then(|params| self.collections.watcher(&params.collection, query_id))
			.map(|watcher| watcher.subscribers().copied().collect())
			.unwrap_or_default()
	}
}

struct Inner {
	store: Arc<dyn Store>,
	config: BrokerConfig,
	state: Mutex<BrokerState>,
	push: PushRegistry,
}

impl UpdateSink for Inner {
	fn push_update(&self, query_id: QueryId, documents: Vec<Document>) {
		let subscribers = self.state.lock().subscribers(query_id);
		if subscribers.is_empty() {
			return;
		}

		let documents = Arc::new(documents);
		for connection_id in subscribers {
			let msg = PushMessage::Update {
				query_id,
				documents: documents.clone(),
			};
			match self.push.try_deliver(&connection_id, msg) {
				DeliveryResult::Delivered => {}
				DeliveryResult::BackPressure => {
					warn!("Push channel full for connection {}, dropped update of query {}", connection_id, query_id)
				}
				DeliveryResult::Disconnected => {
					debug!("Connection {} gone, skipped update of query {}", connection_id, query_id)
				}
			}
		}
	}
}

/// Rolls back a watcher reservation if the subscribe that opens its change
/// stream is dropped before the store answers.
struct PendingOpen<'a> {
	inner: &'a Inner,
	collection: &'a str,
	query_id: QueryId,
	generation: u64,
	armed: bool,
}

impl Drop for PendingOpen<'_> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		let err = Error::Cancelled {
			query_id: self.query_id,
		};
		let rolled_back = self.inner.state.lock().abort_open(self.collection, self.query_id, self.generation, err);
		if let Some(rolled_back) = rolled_back {
			debug!(
				"Subscribe of query {} on {} dropped while opening, rolled back {} subscriber(s)",
				self.query_id, self.collection, rolled_back
			);
		}
	}
}

/// Deduplicates live queries across connections.
///
/// Cheap to clone; clones share the same registries.
#[derive(Clone)]
pub struct Broker {
	inner: Arc<Inner>,
}

impl Broker {
	pub fn new(store: Arc<dyn Store>, config: BrokerConfig) -> Self {
		Self {
			inner: Arc::new(Inner {
				store,
				config,
				state: Mutex::new(BrokerState::default()),
				push: PushRegistry::new(),
			}),
		}
	}

	pub fn config(&self) -> &BrokerConfig {
		&self.inner.config
	}

	/// Register the push channel of a new connection.
	pub fn connect(&self, connection_id: ConnectionId, push_tx: mpsc::Sender<PushMessage>) {
		self.inner.push.register(connection_id, push_tx);
	}

	/// Subscribe a connection to a live query.
	///
	/// Returns the query handle and a snapshot taken after the connection was
	/// registered, so no update can fall between the two.
	pub async fn subscribe(&self, connection_id: ConnectionId, params: QueryParameters) -> Result<Subscription> {
		let params = QueryParameters::new(params.collection, params.filter, params.options);

		let known = self.inner.state.lock().collections.contains(&params.collection);
		if !known {
			let collections = self.inner.store.list_collections().await?;
			if !collections.iter().any(|name| *name == params.collection) {
				debug!("Rejected subscribe of {} to unknown collection {}", connection_id, params.collection);
				return Err(Error::UnknownCollection {
					collection: params.collection,
				});
			}
		}

		let (query_id, generation, readiness, created) = {
			let mut guard = self.inner.state.lock();
			let state = &mut *guard;

			let (query_id, _) = state.identities.resolve(&params);
			let next_generation = &mut state.next_generation;
			let (watcher, created) = state.collections.get_or_create_watcher(&params, query_id, || {
				let generation = *next_generation;
				*next_generation += 1;
				generation
			});
			watcher.subscribe(connection_id);
			let generation = watcher.generation();
			let readiness = watcher.readiness();

			state.connections.add(connection_id, query_id);
			(query_id, generation, readiness, created)
		};

		if created {
			self.open_watcher(&params, query_id, generation).await?;
		} else {
			wait_ready(readiness, query_id).await?;
		}

		let snapshot = self.inner.store.find(&params.collection, &params.filter, &params.options).await;
		match snapshot {
			Ok(documents) => {
				debug!("Connection {} subscribed to query {}", connection_id, query_id);
				Ok(Subscription {
					query_id,
					documents,
				})
			}
			Err(err) => {
				self.inner.state.lock().release(&connection_id, query_id);
				Err(err)
			}
		}
	}

	async fn open_watcher(&self, params: &QueryParameters, query_id: QueryId, generation: u64) -> Result<()> {
		let mut pending = PendingOpen {
			inner: &self.inner,
			collection: &params.collection,
			query_id,
			generation,
			armed: true,
		};
		let opened = self.inner.store.watch(&params.collection, &params.filter).await;
		pending.armed = false;

		let mut guard = self.inner.state.lock();
		let state = &mut *guard;

		match opened {
			Ok(stream) => {
				let Some(watcher) = state
					.collections
					.watcher_mut(&params.collection, query_id)
					.filter(|w| w.generation() == generation)
				else {
					// Every subscriber left while the stream was opening.
					drop(stream);
					debug!("Query {} retired before its change stream opened", query_id);
					return Err(Error::Cancelled {
						query_id,
					});
				};

				let inner: Weak<Inner> = Arc::downgrade(&self.inner);
				let sink: Weak<dyn UpdateSink> = inner;
				watcher.activate(stream, self.inner.store.clone(), sink, self.inner.config.push_interval);
				Ok(())
			}
			Err(err) => {
				let err = match err {
					err @ Error::WatchFailed {
						..
					} => err,
					other => Error::WatchFailed {
						collection: params.collection.clone(),
						reason: other.to_string(),
					},
				};

				if let Some(rolled_back) = state.abort_open(&params.collection, query_id, generation, err.clone()) {
					warn!(
						"Failed to open query {} on {}, rolled back {} subscriber(s): {}",
						query_id, params.collection, rolled_back, err
					);
				}
				Err(err)
			}
		}
	}

	/// Drop one membership of `connection_id` on `query_id`.
	///
	/// Fails with [`Error::UnknownQuery`] if the connection does not hold it;
	/// no other state is touched in that case.
	pub fn unsubscribe(&self, connection_id: ConnectionId, query_id: QueryId) -> Result<()> {
		if self.inner.state.lock().release(&connection_id, query_id) {
			debug!("Connection {} unsubscribed from query {}", connection_id, query_id);
			Ok(())
		} else {
			Err(Error::UnknownQuery {
				query_id,
			})
		}
	}

	/// Unwind every membership of a closed connection.
	pub fn disconnect(&self, connection_id: ConnectionId) {
		self.inner.push.remove(&connection_id);

		let mut state = self.inner.state.lock();
		let memberships = state.connections.memberships(&connection_id);
		let released: usize = memberships.iter().map(|(_, count)| count).sum();

		for (query_id, count) in memberships {
			for _ in 0..count {
				state.release(&connection_id, query_id);
			}
		}
		state.connections.disconnect(&connection_id);

		debug!("Cleaned up {} membership(s) of disconnected connection {}", released, connection_id);
	}

	/// Push a result set to every connection subscribed to `query_id`, once
	/// per connection.
	pub fn push_update(&self, query_id: QueryId, documents: Vec<Document>) {
		self.inner.push_update(query_id, documents);
	}

	pub fn watcher_state(&self, query_id: QueryId) -> Option<WatcherState> {
		let state = self.inner.state.lock();
		let params = state.identities.lookup_parameters(query_id)?;
		state.collections.watcher(&params.collection, query_id).map(|w| w.state())
	}

	/// Connections currently receiving pushes for `query_id`.
	pub fn subscribers(&self, query_id: QueryId) -> Vec<ConnectionId> {
		self.inner.state.lock().subscribers(query_id)
	}

	pub fn is_referenced(&self, collection: &str) -> bool {
		self.inner.state.lock().collections.is_referenced(collection)
	}

	pub fn stats(&self) -> BrokerStats {
		let state = self.inner.state.lock();
		BrokerStats {
			queries: state.identities.len(),
			watchers: state.collections.watcher_count(),
			collections: state.collections.len(),
			connections: state.connections.connection_count(),
			memberships: state.connections.membership_count(),
			push_channels: self.inner.push.connection_count(),
		}
	}
}

#[cfg(test)]
mod tests {
	use liveq_store_memory::MemoryStore;
	use serde_json::json;

	use super::*;

	fn broker() -> (Broker, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::new());
		store.create_collection("jobs");
		store.insert("jobs", json!({"name": "build"})).unwrap();
		(Broker::new(store.clone(), BrokerConfig::default()), store)
	}

	#[tokio::test]
	async fn test_subscribe_returns_snapshot() {
		let (broker, _) = broker();
		let sub = broker.subscribe(ConnectionId::generate(), QueryParameters::all("jobs")).await.unwrap();

		assert_eq!(sub.query_id, QueryId(0));
		assert_eq!(sub.documents, vec![json!({"_id": "1", "name": "build"})]);
		assert_eq!(broker.watcher_state(sub.query_id), Some(WatcherState::Active));
	}

	#[tokio::test]
	async fn test_unknown_collection_creates_no_state() {
		let (broker, store) = broker();
		let err = broker.subscribe(ConnectionId::generate(), QueryParameters::all("nope")).await.unwrap_err();

		assert_eq!(
			err,
			Error::UnknownCollection {
				collection: "nope".to_string()
			}
		);
		assert_eq!(broker.stats(), BrokerStats::default());
		assert_eq!(store.watches_opened(), 0);
	}

	#[tokio::test]
	async fn test_snapshot_failure_releases_membership() {
		let (broker, store) = broker();
		store.fail_next_find();

		let result = broker.subscribe(ConnectionId::generate(), QueryParameters::all("jobs")).await;
		assert!(matches!(result, Err(Error::Store { .. })));
		assert_eq!(broker.stats(), BrokerStats::default());
		assert_eq!(store.active_watches(), 0);
	}

	#[tokio::test]
	async fn test_unsubscribe_of_foreign_handle_is_rejected() {
		let (broker, _) = broker();
		let owner = ConnectionId::generate();
		let intruder = ConnectionId::generate();
		let sub = broker.subscribe(owner, QueryParameters::all("jobs")).await.unwrap();

		assert_eq!(
			broker.unsubscribe(intruder, sub.query_id),
			Err(Error::UnknownQuery {
				query_id: sub.query_id
			})
		);
		assert_eq!(broker.subscribers(sub.query_id), vec![owner]);
		assert_eq!(broker.watcher_state(sub.query_id), Some(WatcherState::Active));
	}
}
