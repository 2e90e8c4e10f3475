// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};

use futures_util::{
	SinkExt, StreamExt,
	stream::{SplitSink, SplitStream},
};
use liveq_types::{Document, QueryId, QueryParameters};
use liveq_wire_format::{
	Request, RequestPayload, Response, ResponsePayload, ServerPush, SubscribeRequest, UnsubscribeRequest,
};
use tokio::{
	net::TcpStream,
	sync::{mpsc, oneshot},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::{error::ClientError, utils::generate_request_id};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type UpdateTx = mpsc::UnboundedSender<Arc<Vec<Document>>>;

struct Pending {
	response_tx: oneshot::Sender<Response>,
	/// Installed for the returned query id once the subscribe is answered,
	/// before any later push is read.
	route: Option<(u64, UpdateTx)>,
}

enum Command {
	Request {
		request: Request,
		pending: Pending,
	},
	Unroute {
		query_id: QueryId,
		route_id: u64,
	},
	Close,
}

/// Answer to a subscribe, with the stream of later result sets.
pub struct LiveSubscription {
	pub query_id: QueryId,
	/// Snapshot at subscribe time.
	pub documents: Vec<Document>,
	route_id: u64,
	updates: mpsc::UnboundedReceiver<Arc<Vec<Document>>>,
}

impl LiveSubscription {
	/// Wait for the next pushed result set.
	///
	/// Returns `None` once the connection is closed or the subscription was
	/// released.
	pub async fn recv(&mut self) -> Option<Arc<Vec<Document>>> {
		self.updates.recv().await
	}

	pub fn try_recv(&mut self) -> Option<Arc<Vec<Document>>> {
		self.updates.try_recv().ok()
	}

	pub(crate) fn route_id(&self) -> u64 {
		self.route_id
	}

	pub(crate) fn into_updates(self) -> mpsc::UnboundedReceiver<Arc<Vec<Document>>> {
		self.updates
	}
}

struct ClientInner {
	command_tx: mpsc::Sender<Command>,
	next_route: AtomicU64,
}

impl Drop for ClientInner {
	fn drop(&mut self) {
		// Best effort shutdown - ignore errors since we're dropping
		let _ = self.command_tx.try_send(Command::Close);
	}
}

/// Async WebSocket client for LiveQ.
///
/// Cheap to clone; clones share one connection, which closes when the last
/// clone is dropped or [`close`](WsClient::close) is called.
#[derive(Clone)]
pub struct WsClient {
	inner: Arc<ClientInner>,
}

impl WsClient {
	/// Connect to a LiveQ server, e.g. `"ws://localhost:8091"`. The scheme is
	/// optional.
	pub async fn connect(url: &str) -> Result<Self, ClientError> {
		let url = if !url.starts_with("ws://") && !url.starts_with("wss://") {
			format!("ws://{}", url)
		} else {
			url.to_string()
		};

		let (ws_stream, _) = connect_async(&url).await.map_err(|e| ClientError::Connect {
			url: url.clone(),
			reason: e.to_string(),
		})?;

		let (write, read) = ws_stream.split();
		let (command_tx, command_rx) = mpsc::channel::<Command>(32);

		tokio::spawn(async move {
			Self::connection_loop(write, read, command_rx).await;
		});

		Ok(Self {
			inner: Arc::new(ClientInner {
				command_tx,
				next_route: AtomicU64::new(0),
			}),
		})
	}

	/// Connection management loop
	async fn connection_loop(
		mut write: SplitSink<WsStream, Message>,
		mut read: SplitStream<WsStream>,
		mut command_rx: mpsc::Receiver<Command>,
	) {
		let mut pending: HashMap<String, Pending> = HashMap::new();
		let mut routes: HashMap<QueryId, Vec<(u64, UpdateTx)>> = HashMap::new();

		loop {
			tokio::select! {
				msg = read.next() => {
					match msg {
						Some(Ok(Message::Text(text))) => {
							// Responses carry an id, pushes do not.
							if let Ok(response) = serde_json::from_str::<Response>(text.as_str()) {
								let Some(Pending { response_tx, route }) = pending.remove(&response.id) else {
									continue;
								};
								if let (ResponsePayload::Subscribed(subscribed), Some(route)) = (&response.payload, route) {
									routes.entry(subscribed.query_id).or_default().push(route);
								}
								let _ = response_tx.send(response);
							} else if let Ok(ServerPush::Update(update)) = serde_json::from_str::<ServerPush>(text.as_str()) {
								if let Some(targets) = routes.get_mut(&update.query_id) {
									targets.retain(|(_, tx)| tx.send(update.data.clone()).is_ok());
									if targets.is_empty() {
										routes.remove(&update.query_id);
									}
								}
							} else {
								tracing::debug!("Ignoring unrecognised message: {}", text.as_str());
							}
						}
						Some(Ok(Message::Ping(data))) => {
							let _ = write.send(Message::Pong(data)).await;
						}
						Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
						Some(Ok(_)) => {}
					}
				}

				command = command_rx.recv() => {
					match command {
						Some(Command::Request { request, pending: entry }) => {
							let json = match serde_json::to_string(&request) {
								Ok(json) => json,
								Err(e) => {
									tracing::error!("Failed to serialize request: {}", e);
									continue;
								}
							};
							pending.insert(request.id, entry);
							if write.send(Message::Text(json.into())).await.is_err() {
								break;
							}
						}
						Some(Command::Unroute { query_id, route_id }) => {
							if let Some(targets) = routes.get_mut(&query_id) {
								targets.retain(|(id, _)| *id != route_id);
								if targets.is_empty() {
									routes.remove(&query_id);
								}
							}
						}
						Some(Command::Close) | None => {
							let _ = write.send(Message::Close(None)).await;
							break;
						}
					}
				}
			}
		}

		// Dropping the pending senders fails every waiting request; dropping
		// the routes ends every subscription stream.
		pending.clear();
		routes.clear();
	}

	/// Subscribe to a live query.
	///
	/// Later result sets of the query arrive through the returned
	/// [`LiveSubscription`].
	pub async fn subscribe(&self, params: QueryParameters) -> Result<LiveSubscription, ClientError> {
		let route_id = self.inner.next_route.fetch_add(1, Ordering::Relaxed);
		let (updates_tx, updates) = mpsc::unbounded_channel();

		let request = Request {
			id: generate_request_id(),
			payload: RequestPayload::Subscribe(SubscribeRequest::from(params)),
		};

		let response = self.send_request(request, Some((route_id, updates_tx))).await?;
		match response.payload {
			ResponsePayload::Subscribed(subscribed) => Ok(LiveSubscription {
				query_id: subscribed.query_id,
				documents: subscribed.documents,
				route_id,
				updates,
			}),
			ResponsePayload::Err(err) => Err(ClientError::Remote(err.diagnostic)),
			_ => Err(ClientError::UnexpectedResponse {
				request: "subscribe",
			}),
		}
	}

	/// Release a subscription.
	///
	/// Pushes stop reaching it immediately; the server drops one membership
	/// of the query.
	pub async fn unsubscribe(&self, subscription: LiveSubscription) -> Result<(), ClientError> {
		self.unsubscribe_route(subscription.query_id, subscription.route_id).await
	}

	pub(crate) async fn unsubscribe_route(&self, query_id: QueryId, route_id: u64) -> Result<(), ClientError> {
		self.inner
			.command_tx
			.send(Command::Unroute {
				query_id,
				route_id,
			})
			.await
			.map_err(|_| ClientError::ConnectionClosed)?;

		let request = Request {
			id: generate_request_id(),
			payload: RequestPayload::Unsubscribe(UnsubscribeRequest {
				query_id,
			}),
		};

		let response = self.send_request(request, None).await?;
		match response.payload {
			ResponsePayload::Unsubscribed(_) => Ok(()),
			ResponsePayload::Err(err) => Err(ClientError::Remote(err.diagnostic)),
			_ => Err(ClientError::UnexpectedResponse {
				request: "unsubscribe",
			}),
		}
	}

	/// Fire-and-forget release for use in `Drop`.
	pub(crate) fn release_route(&self, query_id: QueryId, route_id: u64) {
		let _ = self.inner.command_tx.try_send(Command::Unroute {
			query_id,
			route_id,
		});

		let (response_tx, _) = oneshot::channel();
		let _ = self.inner.command_tx.try_send(Command::Request {
			request: Request {
				id: generate_request_id(),
				payload: RequestPayload::Unsubscribe(UnsubscribeRequest {
					query_id,
				}),
			},
			pending: Pending {
				response_tx,
				route: None,
			},
		});
	}

	async fn send_request(&self, request: Request, route: Option<(u64, UpdateTx)>) -> Result<Response, ClientError> {
		let (response_tx, response_rx) = oneshot::channel();

		self.inner
			.command_tx
			.send(Command::Request {
				request,
				pending: Pending {
					response_tx,
					route,
				},
			})
			.await
			.map_err(|_| ClientError::ConnectionClosed)?;

		response_rx.await.map_err(|_| ClientError::ConnectionClosed)
	}

	/// Close the WebSocket connection gracefully.
	pub async fn close(&self) -> Result<(), ClientError> {
		self.inner.command_tx.send(Command::Close).await.map_err(|_| ClientError::ConnectionClosed)
	}

	/// Whether the connection task is still running.
	pub fn is_connected(&self) -> bool {
		!self.inner.command_tx.is_closed()
	}
}
