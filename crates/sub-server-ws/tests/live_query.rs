// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{sync::Arc, time::Duration};

use liveq_broker::{Broker, BrokerConfig, BrokerStats};
use liveq_client::{ClientError, Document, LiveCursor, QueryId, QueryParameters, WsClient};
use liveq_store_memory::MemoryStore;
use liveq_sub_api::Subsystem;
use liveq_sub_server_ws::{WsConfig, WsSubsystem};
use serde_json::json;
use tokio::{sync::mpsc, time::timeout};

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> (WsSubsystem, Arc<MemoryStore>, String) {
	let store = Arc::new(MemoryStore::new());
	store.create_collection("jobs");
	store.insert("jobs", json!({"name": "build", "status": "queued"})).unwrap();
	store.insert("jobs", json!({"name": "test", "status": "done"})).unwrap();

	let broker = Broker::new(store.clone(), BrokerConfig::new().push_interval(Duration::from_millis(20)));
	let mut server = WsSubsystem::new(WsConfig::new().bind_addr("127.0.0.1:0"), broker);
	server.start().await.unwrap();

	let url = format!("ws://127.0.0.1:{}", server.port().unwrap());
	(server, store, url)
}

fn queued() -> QueryParameters {
	QueryParameters::new("jobs", json!({"status": "queued"}), json!({}))
}

/// Poll until `check` holds or the wait expires.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
	let deadline = tokio::time::Instant::now() + WAIT;
	while tokio::time::Instant::now() < deadline {
		if check() {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	check()
}

#[tokio::test]
async fn test_subscribe_receives_snapshot_and_updates() {
	let (mut server, store, url) = start_server().await;
	let client = WsClient::connect(&url).await.unwrap();

	let mut subscription = client.subscribe(queued()).await.unwrap();
	assert_eq!(subscription.query_id, QueryId(0));
	assert_eq!(subscription.documents.len(), 1);

	store.insert("jobs", json!({"name": "deploy", "status": "queued"})).unwrap();
	let update = timeout(WAIT, subscription.recv()).await.unwrap().unwrap();
	assert_eq!(update.len(), 2);

	client.unsubscribe(subscription).await.unwrap();
	assert!(eventually(|| server.broker().stats().queries == 0).await);

	server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_two_clients_share_one_query() {
	let (mut server, store, url) = start_server().await;
	let first = WsClient::connect(&url).await.unwrap();
	let second = WsClient::connect(&url).await.unwrap();

	let mut a = first.subscribe(queued()).await.unwrap();
	let mut b = second.subscribe(QueryParameters::new("jobs", json!({"status": "queued"}), json!({}))).await.unwrap();
	assert_eq!(a.query_id, b.query_id);
	assert_eq!(store.watches_opened(), 1);

	store.update("jobs", "1", json!({"status": "running"})).unwrap();
	assert_eq!(timeout(WAIT, a.recv()).await.unwrap().unwrap().len(), 0);
	assert_eq!(timeout(WAIT, b.recv()).await.unwrap().unwrap().len(), 0);

	server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_collection_is_a_remote_error() {
	let (mut server, _, url) = start_server().await;
	let client = WsClient::connect(&url).await.unwrap();

	let err = client.subscribe(QueryParameters::all("missing")).await.err().unwrap();
	assert_eq!(err.code(), Some("LQ_001"));
	assert_eq!(server.broker().stats().queries, 0);

	server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_releases_server_state() {
	let (mut server, store, url) = start_server().await;
	let client = WsClient::connect(&url).await.unwrap();

	client.subscribe(queued()).await.unwrap();
	client.subscribe(queued()).await.unwrap();
	client.subscribe(QueryParameters::all("jobs")).await.unwrap();
	assert_eq!(server.broker().stats().memberships, 3);

	client.close().await.unwrap();
	assert!(eventually(|| server.broker().stats() == BrokerStats::default()).await);
	assert!(eventually(|| store.active_watches() == 0).await);

	server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cursor_follows_the_query() {
	let (mut server, store, url) = start_server().await;
	let client = WsClient::connect(&url).await.unwrap();
	let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<Vec<Document>>();

	let mut cursor = LiveCursor::new(client.clone(), queued());
	let query_id = cursor
		.subscribe(move |documents| {
			let _ = seen_tx.send(documents.to_vec());
		})
		.await
		.unwrap();
	assert_eq!(cursor.query_id(), Some(query_id));
	assert_eq!(cursor.len(), 1);
	assert_eq!(seen_rx.recv().await.unwrap().len(), 1);

	store.insert("jobs", json!({"name": "deploy", "status": "queued"})).unwrap();
	let pushed = timeout(WAIT, seen_rx.recv()).await.unwrap().unwrap();
	assert_eq!(pushed.len(), 2);
	assert_eq!(cursor.documents(), pushed);

	assert_eq!(
		cursor.subscribe(|_| {}).await.err(),
		Some(ClientError::AlreadySubscribed)
	);

	cursor.unsubscribe().await.unwrap();
	assert_eq!(cursor.query_id(), None);
	assert_eq!(cursor.unsubscribe().await, Err(ClientError::NotSubscribed));
	assert_eq!(server.broker().stats().queries, 0);

	// Restartable, with a fresh handle.
	let again = cursor.subscribe(|_| {}).await.unwrap();
	assert_ne!(again, query_id);

	drop(cursor);
	assert!(eventually(|| server.broker().stats().queries == 0).await);

	server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
	let (mut server, _, url) = start_server().await;
	let client = WsClient::connect(&url).await.unwrap();
	let mut subscription = client.subscribe(queued()).await.unwrap();
	assert!(eventually(|| server.active_connections() == 1).await);

	server.shutdown().await.unwrap();
	assert_eq!(server.active_connections(), 0);
	assert!(eventually(|| !server.is_running()).await);

	assert_eq!(timeout(WAIT, subscription.recv()).await.unwrap(), None);
	assert!(eventually(|| !client.is_connected()).await);
	assert_eq!(server.broker().stats().memberships, 0);
}
