// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use liveq_types::{QueryId, QueryParameters};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A client request.
///
/// Each request has a unique `id` that clients use to correlate responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	pub id: String,
	#[serde(flatten)]
	pub payload: RequestPayload,
}

/// Discriminated by the `type` field in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RequestPayload {
	#[serde(rename = "collection::find::subscribe")]
	Subscribe(SubscribeRequest),
	#[serde(rename = "collection::find::unsubscribe")]
	Unsubscribe(UnsubscribeRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
	pub collection: String,
	#[serde(default)]
	pub filter: Value,
	#[serde(default)]
	pub options: Value,
}

impl SubscribeRequest {
	pub fn into_parameters(self) -> QueryParameters {
		QueryParameters::new(self.collection, self.filter, self.options)
	}
}

impl From<QueryParameters> for SubscribeRequest {
	fn from(params: QueryParameters) -> Self {
		Self {
			collection: params.collection,
			filter: params.filter,
			options: params.options,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
	pub query_id: QueryId,
}
