// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Push channels of connected clients.
//!
//! Each connection registers the sending half of a bounded channel. The
//! broker fans live query updates out through [`PushRegistry::try_deliver`],
//! which never blocks: a slow or broken connection only loses its own copy.

use std::sync::Arc;

use dashmap::DashMap;
use liveq_types::{ConnectionId, Document, QueryId};
use liveq_wire_format::{ServerPush, UpdatePayload};
use tokio::sync::mpsc;

/// Message sent to a connection for push delivery.
#[derive(Debug, Clone)]
pub enum PushMessage {
	/// The full current result set of a live query.
	Update {
		query_id: QueryId,
		documents: Arc<Vec<Document>>,
	},
}

impl From<PushMessage> for ServerPush {
	fn from(msg: PushMessage) -> Self {
		match msg {
			PushMessage::Update {
				query_id,
				documents,
			} => ServerPush::Update(UpdatePayload {
				query_id,
				data: documents,
			}),
		}
	}
}

/// Result of attempting to deliver a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResult {
	/// Message was queued for the connection.
	Delivered,
	/// Connection is not ready (channel full); this push is dropped.
	BackPressure,
	/// Connection is gone or never registered a channel.
	Disconnected,
}

/// Registry of push channels, keyed by connection.
pub struct PushRegistry {
	channels: DashMap<ConnectionId, mpsc::Sender<PushMessage>>,
}

impl PushRegistry {
	pub fn new() -> Self {
		Self {
			channels: DashMap::new(),
		}
	}

	pub fn register(&self, connection_id: ConnectionId, push_tx: mpsc::Sender<PushMessage>) {
		self.channels.insert(connection_id, push_tx);
		tracing::debug!("Registered push channel for connection {}", connection_id);
	}

	pub fn remove(&self, connection_id: &ConnectionId) -> bool {
		self.channels.remove(connection_id).is_some()
	}

	pub fn try_deliver(&self, connection_id: &ConnectionId, msg: PushMessage) -> DeliveryResult {
		let Some(push_tx) = self.channels.get(connection_id).map(|entry| entry.value().clone()) else {
			return DeliveryResult::Disconnected;
		};

		match push_tx.try_send(msg) {
			Ok(()) => DeliveryResult::Delivered,
			Err(mpsc::error::TrySendError::Full(_)) => DeliveryResult::BackPressure,
			Err(mpsc::error::TrySendError::Closed(_)) => DeliveryResult::Disconnected,
		}
	}

	/// Get the number of connections with a push channel.
	pub fn connection_count(&self) -> usize {
		self.channels.len()
	}
}

impl Default for PushRegistry {
	fn default() -> Self {
		Self::new()
	}
}
