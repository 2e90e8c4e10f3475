// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use liveq_types::{Document, QueryId, QueryParameters};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::{error::ClientError, ws::WsClient};

struct Active {
	query_id: QueryId,
	route_id: u64,
	task: JoinHandle<()>,
}

/// A live view of one query.
///
/// While subscribed, the cursor's result set is replaced in place with every
/// update the server pushes, and the `on_update` callback sees each one.
/// Subscribe and unsubscribe take `&mut self`, so an unsubscribe can only be
/// issued once the subscribe has settled. A cursor can be subscribed again
/// after it was unsubscribed. Dropping a subscribed cursor releases its
/// subscription in the background.
pub struct LiveCursor {
	client: WsClient,
	params: QueryParameters,
	documents: Arc<RwLock<Vec<Document>>>,
	active: Option<Active>,
}

impl LiveCursor {
	pub fn new(client: WsClient, params: QueryParameters) -> Self {
		Self {
			client,
			params,
			documents: Arc::new(RwLock::new(Vec::new())),
			active: None,
		}
	}

	pub fn params(&self) -> &QueryParameters {
		&self.params
	}

	/// Subscribe and start following the query.
	///
	/// `on_update` is called with the initial snapshot before this returns,
	/// then with every pushed result set until the cursor is unsubscribed or
	/// dropped.
	pub async fn subscribe<F>(&mut self, on_update: F) -> Result<QueryId, ClientError>
	where
		F: FnMut(&[Document]) + Send + 'static,
	{
		if self.active.is_some() {
			return Err(ClientError::AlreadySubscribed);
		}

		let mut on_update = on_update;
		let mut subscription = self.client.subscribe(self.params.clone()).await?;
		let query_id = subscription.query_id;
		let route_id = subscription.route_id();

		*self.documents.write() = std::mem::take(&mut subscription.documents);
		on_update(&self.documents.read());

		let documents = self.documents.clone();
		let mut updates = subscription.into_updates();
		let task = tokio::spawn(async move {
			while let Some(data) = updates.recv().await {
				*documents.write() = data.as_ref().clone();
				on_update(&data);
			}
		});

		self.active = Some(Active {
			query_id,
			route_id,
			task,
		});
		Ok(query_id)
	}

	/// Stop following the query and release it on the server.
	///
	/// The last result set stays readable through [`documents`](Self::documents).
	pub async fn unsubscribe(&mut self) -> Result<(), ClientError> {
		let Some(active) = self.active.take() else {
			return Err(ClientError::NotSubscribed);
		};
		active.task.abort();
		self.client.unsubscribe_route(active.query_id, active.route_id).await
	}

	/// The current result set.
	pub fn documents(&self) -> Vec<Document> {
		self.documents.read().clone()
	}

	pub fn len(&self) -> usize {
		self.documents.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.documents.read().is_empty()
	}

	/// Handle of the live query while subscribed.
	pub fn query_id(&self) -> Option<QueryId> {
		self.active.as_ref().map(|active| active.query_id)
	}

	pub fn is_subscribed(&self) -> bool {
		self.active.is_some()
	}
}

impl Drop for LiveCursor {
	fn drop(&mut self) {
		if let Some(active) = self.active.take() {
			active.task.abort();
			self.client.release_route(active.query_id, active.route_id);
		}
	}
}
