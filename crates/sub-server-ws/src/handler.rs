// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Per-connection WebSocket handling.
//!
//! Requests of one connection are handled one after another, and queued
//! pushes are only forwarded between requests. A subscribe response therefore
//! always reaches the client before the first push for its query.

use futures_util::{SinkExt, StreamExt};
use liveq_broker::{Broker, PushMessage};
use liveq_types::{ConnectionId, Error};
use liveq_wire_format::{
	ErrResponse, Request, RequestPayload, Response, ResponsePayload, ServerPush, SubscribedResponse,
	UnsubscribedResponse,
};
use serde::Serialize;
use serde_json::Value;
use tokio::{
	net::TcpStream,
	sync::{mpsc, watch},
};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Serve one accepted TCP stream until it closes or shutdown is signalled.
pub async fn handle_connection(
	stream: TcpStream,
	broker: Broker,
	push_channel_capacity: usize,
	mut shutdown_rx: watch::Receiver<bool>,
) {
	let peer = stream.peer_addr().ok();
	let ws_stream = match accept_async(stream).await {
		Ok(ws) => ws,
		Err(e) => {
			tracing::warn!("WebSocket handshake failed for {:?}: {}", peer, e);
			return;
		}
	};

	let connection_id = ConnectionId::generate();
	let (mut write, mut read) = ws_stream.split();
	let (push_tx, mut push_rx) = mpsc::channel::<PushMessage>(push_channel_capacity);
	broker.connect(connection_id, push_tx);
	tracing::debug!("Connection {} opened from {:?}", connection_id, peer);

	loop {
		tokio::select! {
			biased;

			result = shutdown_rx.changed() => {
				if result.is_err() || *shutdown_rx.borrow() {
					let _ = write.send(Message::Close(None)).await;
					break;
				}
			}

			msg = read.next() => {
				match msg {
					Some(Ok(Message::Text(text))) => {
						let response = handle_request(&broker, connection_id, text.as_str()).await;
						if send_json(&mut write, &response).await.is_err() {
							break;
						}
					}
					Some(Ok(Message::Ping(data))) => {
						if write.send(Message::Pong(data)).await.is_err() {
							break;
						}
					}
					Some(Ok(Message::Close(_))) | None => break,
					Some(Ok(_)) => {}
					Some(Err(e)) => {
						tracing::debug!("Connection {} read error: {}", connection_id, e);
						break;
					}
				}
			}

			Some(push) = push_rx.recv() => {
				if send_json(&mut write, &ServerPush::from(push)).await.is_err() {
					break;
				}
			}
		}
	}

	broker.disconnect(connection_id);
	tracing::debug!("Connection {} closed", connection_id);
}

async fn send_json<S, T>(write: &mut S, value: &T) -> Result<(), ()>
where
	S: futures_util::Sink<Message> + Unpin,
	T: Serialize,
{
	let json = match serde_json::to_string(value) {
		Ok(json) => json,
		Err(e) => {
			tracing::error!("Failed to serialize message: {}", e);
			return Ok(());
		}
	};
	write.send(Message::Text(json.into())).await.map_err(|_| ())
}

/// Turn one text frame into its response.
pub(crate) async fn handle_request(broker: &Broker, connection_id: ConnectionId, text: &str) -> Response {
	let request: Request = match serde_json::from_str(text) {
		Ok(request) => request,
		Err(e) => {
			let id = serde_json::from_str::<Value>(text)
				.ok()
				.and_then(|value| value.get("id").and_then(Value::as_str).map(str::to_string))
				.unwrap_or_default();
			return error_response(
				id,
				Error::InvalidRequest {
					reason: e.to_string(),
				},
			);
		}
	};

	let id = request.id;
	match request.payload {
		RequestPayload::Subscribe(subscribe) => {
			if subscribe.collection.is_empty() {
				return error_response(
					id,
					Error::InvalidRequest {
						reason: "collection must not be empty".to_string(),
					},
				);
			}

			match broker.subscribe(connection_id, subscribe.into_parameters()).await {
				Ok(subscription) => Response {
					id,
					payload: ResponsePayload::Subscribed(SubscribedResponse {
						query_id: subscription.query_id,
						documents: subscription.documents,
					}),
				},
				Err(e) => {
					tracing::debug!("Subscribe of connection {} failed: {}", connection_id, e);
					error_response(id, e)
				}
			}
		}
		RequestPayload::Unsubscribe(unsubscribe) => {
			if let Err(e) = broker.unsubscribe(connection_id, unsubscribe.query_id) {
				tracing::warn!("Ignoring unsubscribe from connection {}: {}", connection_id, e);
			}
			Response {
				id,
				payload: ResponsePayload::Unsubscribed(UnsubscribedResponse {}),
			}
		}
	}
}

fn error_response(id: String, err: Error) -> Response {
	Response {
		id,
		payload: ResponsePayload::Err(ErrResponse {
			diagnostic: err.diagnostic(),
		}),
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use liveq_broker::BrokerConfig;
	use liveq_store_memory::MemoryStore;
	use liveq_types::QueryId;
	use serde_json::json;

	use super::*;

	fn broker() -> Broker {
		let store = Arc::new(MemoryStore::new());
		store.create_collection("jobs");
		store.insert("jobs", json!({"name": "build"})).unwrap();
		Broker::new(store, BrokerConfig::default())
	}

	fn code(response: &Response) -> Option<&str> {
		match &response.payload {
			ResponsePayload::Err(err) => Some(err.diagnostic.code.as_str()),
			_ => None,
		}
	}

	#[tokio::test]
	async fn test_subscribe_then_unsubscribe() {
		let broker = broker();
		let connection_id = ConnectionId::generate();

		let response = handle_request(
			&broker,
			connection_id,
			r#"{"id":"1","type":"collection::find::subscribe","payload":{"collection":"jobs","filter":{},"options":{}}}"#,
		)
		.await;
		assert_eq!(response.id, "1");
		let ResponsePayload::Subscribed(subscribed) = response.payload else {
			panic!("expected subscribed, got {:?}", response.payload);
		};
		assert_eq!(subscribed.query_id, QueryId(0));
		assert_eq!(subscribed.documents.len(), 1);

		let response = handle_request(
			&broker,
			connection_id,
			r#"{"id":"2","type":"collection::find::unsubscribe","payload":{"query_id":0}}"#,
		)
		.await;
		assert!(matches!(response.payload, ResponsePayload::Unsubscribed(_)));
		assert_eq!(broker.stats().queries, 0);
	}

	#[tokio::test]
	async fn test_unknown_unsubscribe_is_acknowledged() {
		let broker = broker();
		let response = handle_request(
			&broker,
			ConnectionId::generate(),
			r#"{"id":"9","type":"collection::find::unsubscribe","payload":{"query_id":12}}"#,
		)
		.await;
		assert_eq!(response.id, "9");
		assert!(matches!(response.payload, ResponsePayload::Unsubscribed(_)));
	}

	#[tokio::test]
	async fn test_unknown_collection_is_reported() {
		let broker = broker();
		let response = handle_request(
			&broker,
			ConnectionId::generate(),
			r#"{"id":"3","type":"collection::find::subscribe","payload":{"collection":"nope"}}"#,
		)
		.await;
		assert_eq!(code(&response), Some("LQ_001"));
	}

	#[tokio::test]
	async fn test_malformed_requests() {
		let broker = broker();
		let connection_id = ConnectionId::generate();

		let response = handle_request(&broker, connection_id, r#"{"id":"4","type":"collection::drop"}"#).await;
		assert_eq!(response.id, "4");
		assert_eq!(code(&response), Some("LQ_005"));

		let response = handle_request(&broker, connection_id, "not json").await;
		assert_eq!(response.id, "");
		assert_eq!(code(&response), Some("LQ_005"));

		let response = handle_request(
			&broker,
			connection_id,
			r#"{"id":"5","type":"collection::find::subscribe","payload":{"collection":""}}"#,
		)
		.await;
		assert_eq!(code(&response), Some("LQ_005"));
	}
}
