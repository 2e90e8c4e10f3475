// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use liveq_types::{Diagnostic, Document, QueryId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	pub id: String,
	#[serde(flatten)]
	pub payload: ResponsePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ResponsePayload {
	#[serde(rename = "collection::find::subscribe")]
	Subscribed(SubscribedResponse),
	#[serde(rename = "collection::find::unsubscribe")]
	Unsubscribed(UnsubscribedResponse),
	Err(ErrResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribedResponse {
	pub query_id: QueryId,
	pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribedResponse {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrResponse {
	pub diagnostic: Diagnostic,
}

/// Unsolicited server message; carries no request `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerPush {
	#[serde(rename = "collection::find::update")]
	Update(UpdatePayload),
}

/// The full current result set of a live query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePayload {
	pub query_id: QueryId,
	pub data: Arc<Vec<Document>>,
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_push_is_not_a_response() {
		let push = ServerPush::Update(UpdatePayload {
			query_id: QueryId(1),
			data: Arc::new(vec![json!({"_id": "1"})]),
		});
		let text = serde_json::to_string(&push).unwrap();
		assert!(serde_json::from_str::<Response>(&text).is_err());

		let ServerPush::Update(update) = serde_json::from_str::<ServerPush>(&text).unwrap();
		assert_eq!(update.query_id, QueryId(1));
		assert_eq!(update.data.len(), 1);
	}

	#[test]
	fn test_error_response_shape() {
		let response = Response {
			id: "3".to_string(),
			payload: ResponsePayload::Err(ErrResponse {
				diagnostic: Diagnostic {
					code: "LQ_001".to_string(),
					message: "collection 'x' does not exist".to_string(),
				},
			}),
		};
		assert_eq!(
			serde_json::to_value(&response).unwrap(),
			json!({
				"id": "3",
				"type": "Err",
				"payload": {"diagnostic": {"code": "LQ_001", "message": "collection 'x' does not exist"}}
			})
		);
	}
}
