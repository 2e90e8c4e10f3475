// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Live queries.
//!
//! A [`Watcher`] owns the single change stream opened for one canonical
//! query and the set of connections subscribed to it. It moves through
//! `Opening -> Active -> Retiring -> Gone`:
//!
//! - `Opening`: registered in its collection, change stream not yet open.
//!   Concurrent subscribers join the subscriber set and wait on
//!   [`Watcher::readiness`] instead of opening a second stream.
//! - `Active`: a background [`Pump`] drains the change stream, coalesces
//!   bursts to at most one recompute per push interval, re-runs `find` and
//!   hands the full result set to the [`UpdateSink`].
//! - `Retiring`/`Gone`: the last subscriber left; the watch is closed and the
//!   pump stops.

use std::{
	collections::HashSet,
	sync::{Arc, Weak},
	time::Duration,
};

use liveq_types::{ChangeStream, ConnectionId, Document, Error, QueryId, QueryParameters, Result, Store, WatchHandle};
use tokio::{
	sync::watch,
	time::{Instant, sleep_until},
};
use tracing::{debug, error, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
	Opening,
	Active,
	Retiring,
	Gone,
}

/// Outcome of opening a watcher, observed by subscribers waiting on it.
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
	Opening,
	Active,
	Failed(Error),
}

/// Receives recomputed result sets of active watchers.
pub trait UpdateSink: Send + Sync + 'static {
	fn push_update(&self, query_id: QueryId, documents: Vec<Document>);
}

pub struct Watcher {
	id: QueryId,
	params: QueryParameters,
	generation: u64,
	state: WatcherState,
	subscribers: HashSet<ConnectionId>,
	ready_tx: watch::Sender<Readiness>,
	watch_handle: Option<WatchHandle>,
	shutdown_tx: Option<watch::Sender<bool>>,
}

impl Watcher {
	/// Create a watcher in `Opening` state.
	///
	/// `generation` is unique per broker; it tells a watcher apart from a later
	/// one registered under the same handle slot after a retire.
	pub fn new(id: QueryId, params: QueryParameters, generation: u64) -> Self {
		let (ready_tx, _) = watch::channel(Readiness::Opening);
		Self {
			id,
			params,
			generation,
			state: WatcherState::Opening,
			subscribers: HashSet::new(),
			ready_tx,
			watch_handle: None,
			shutdown_tx: None,
		}
	}

	pub fn id(&self) -> QueryId {
		self.id
	}

	pub fn params(&self) -> &QueryParameters {
		&self.params
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn state(&self) -> WatcherState {
		self.state
	}

	pub fn subscriber_count(&self) -> usize {
		self.subscribers.len()
	}

	pub fn subscribers(&self) -> impl Iterator<Item = &ConnectionId> {
		self.subscribers.iter()
	}

	pub fn is_subscribed(&self, connection_id: &ConnectionId) -> bool {
		self.subscribers.contains(connection_id)
	}

	/// Add a connection. Returns `false` if it was already subscribed.
	pub fn subscribe(&mut self, connection_id: ConnectionId) -> bool {
		self.subscribers.insert(connection_id)
	}

	/// Remove a connection. Returns `true` if no subscriber remains.
	pub fn unsubscribe(&mut self, connection_id: &ConnectionId) -> bool {
		self.subscribers.remove(connection_id);
		self.subscribers.is_empty()
	}

	pub fn readiness(&self) -> watch::Receiver<Readiness> {
		self.ready_tx.subscribe()
	}

	/// Attach the opened change stream and start pushing updates.
	pub fn activate(
		&mut self,
		stream: ChangeStream,
		store: Arc<dyn Store>,
		sink: Weak<dyn UpdateSink>,
		push_interval: Duration,
	) {
		let (shutdown_tx, shutdown_rx) = watch::channel(false);

		self.watch_handle = Some(stream.handle());
		self.shutdown_tx = Some(shutdown_tx);
		self.state = WatcherState::Active;

		let pump = Pump {
			id: self.id,
			params: self.params.clone(),
			store,
			stream,
			sink,
			push_interval,
			shutdown_rx,
			last_push: None,
		};
		tokio::spawn(pump.run());

		self.ready_tx.send_replace(Readiness::Active);
		debug!("Query {} on {} is active", self.id, self.params.collection);
	}

	/// Report a failed open to every waiting subscriber.
	pub fn fail(&mut self, err: Error) {
		self.ready_tx.send_replace(Readiness::Failed(err));
		self.retire();
	}

	/// Close the change stream and stop the pump. Idempotent.
	pub fn retire(&mut self) {
		if self.state == WatcherState::Gone {
			return;
		}
		self.state = WatcherState::Retiring;

		if let Some(handle) = self.watch_handle.take() {
			handle.close();
		}
		if let Some(shutdown_tx) = self.shutdown_tx.take() {
			let _ = shutdown_tx.send(true);
		}

		self.state = WatcherState::Gone;
		debug!("Query {} on {} retired", self.id, self.params.collection);
	}
}

impl Drop for Watcher {
	fn drop(&mut self) {
		self.retire();
	}
}

/// Wait until the watcher behind `readiness` is active.
pub async fn wait_ready(mut readiness: watch::Receiver<Readiness>, query_id: QueryId) -> Result<()> {
	loop {
		match &*readiness.borrow_and_update() {
			Readiness::Active => return Ok(()),
			Readiness::Failed(err) => return Err(err.clone()),
			Readiness::Opening => {}
		}

		if readiness.changed().await.is_err() {
			return Err(Error::Cancelled {
				query_id,
			});
		}
	}
}

/// Background task turning change notifications into pushes.
struct Pump {
	id: QueryId,
	params: QueryParameters,
	store: Arc<dyn Store>,
	stream: ChangeStream,
	sink: Weak<dyn UpdateSink>,
	push_interval: Duration,
	shutdown_rx: watch::Receiver<bool>,
	last_push: Option<Instant>,
}

impl Pump {
	async fn run(mut self) {
		loop {
			tokio::select! {
				biased;

				_ = self.shutdown_rx.changed() => break,

				event = self.stream.changed() => {
					match event {
						Some(event) => trace!("Query {} saw {:?} of {}", self.id, event.kind, event.document_id),
						None => {
							debug!("Change stream of query {} closed", self.id);
							break;
						}
					}
				}
			}

			if let Some(last_push) = self.last_push {
				let earliest = last_push + self.push_interval;
				if Instant::now() < earliest {
					tokio::select! {
						biased;

						_ = self.shutdown_rx.changed() => break,
						_ = sleep_until(earliest) => {}
					}
				}
			}

			let mut coalesced = 0usize;
			while self.stream.try_changed().is_some() {
				coalesced += 1;
			}
			if coalesced > 0 {
				trace!("Query {} coalesced {} changes", self.id, coalesced);
			}

			if !self.refresh().await {
				break;
			}
		}
	}

	/// Recompute and push. Returns `false` once the broker is gone.
	async fn refresh(&mut self) -> bool {
		let result = self.store.find(&self.params.collection, &self.params.filter, &self.params.options).await;

		match result {
			Ok(documents) => {
				self.last_push = Some(Instant::now());
				match self.sink.upgrade() {
					Some(sink) => {
						sink.push_update(self.id, documents);
						true
					}
					None => false,
				}
			}
			Err(err) => {
				error!("Failed to recompute query {}: {}", self.id, err);
				true
			}
		}
	}
}
