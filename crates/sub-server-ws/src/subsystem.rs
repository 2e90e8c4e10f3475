// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! WebSocket server subsystem implementing the LiveQ Subsystem trait.
//!
//! This module provides `WsSubsystem` which manages the lifecycle of the
//! WebSocket server, including startup, connection tracking, and graceful shutdown.

use std::{
	any::Any,
	net::SocketAddr,
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};

use async_trait::async_trait;
use liveq_broker::Broker;
use liveq_sub_api::{HealthStatus, Subsystem};
use liveq_types::{Error, Result};
use parking_lot::RwLock;
use tokio::{
	net::TcpListener,
	spawn,
	sync::{Semaphore, watch},
	time::{Instant, sleep},
};

use crate::{config::WsConfig, handler::handle_connection};

/// Time granted to open connections to close after shutdown is signalled.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// WebSocket server subsystem.
///
/// Manages a tokio-tungstenite WebSocket server in front of a [`Broker`] with
/// support for:
/// - Connection limiting via semaphore
/// - Graceful startup and shutdown
/// - Active connection tracking
/// - Health monitoring with connection count warnings
pub struct WsSubsystem {
	config: WsConfig,
	/// Actual bound address (available after start).
	actual_addr: RwLock<Option<SocketAddr>>,
	broker: Broker,
	running: Arc<AtomicBool>,
	active_connections: Arc<AtomicUsize>,
	shutdown_tx: Option<watch::Sender<bool>>,
	connection_semaphore: Arc<Semaphore>,
}

impl WsSubsystem {
	pub fn new(config: WsConfig, broker: Broker) -> Self {
		let max_connections = config.max_connections;
		Self {
			config,
			actual_addr: RwLock::new(None),
			broker,
			running: Arc::new(AtomicBool::new(false)),
			active_connections: Arc::new(AtomicUsize::new(0)),
			shutdown_tx: None,
			connection_semaphore: Arc::new(Semaphore::new(max_connections)),
		}
	}

	pub fn bind_addr(&self) -> &str {
		&self.config.bind_addr
	}

	/// Get the actual bound address (available after start).
	pub fn local_addr(&self) -> Option<SocketAddr> {
		*self.actual_addr.read()
	}

	/// Get the actual bound port (available after start).
	pub fn port(&self) -> Option<u16> {
		self.local_addr().map(|a| a.port())
	}

	pub fn active_connections(&self) -> usize {
		self.active_connections.load(Ordering::SeqCst)
	}

	pub fn broker(&self) -> &Broker {
		&self.broker
	}
}

#[async_trait]
impl Subsystem for WsSubsystem {
	fn name(&self) -> &'static str {
		"WebSocket"
	}

	async fn start(&mut self) -> Result<()> {
		// Idempotent: if already running, return success
		if self.shutdown_tx.is_some() {
			return Ok(());
		}

		let addr = self.config.bind_addr.clone();
		let listener = TcpListener::bind(&addr).await.map_err(|e| Error::BindFailed {
			addr: addr.clone(),
			reason: e.to_string(),
		})?;

		let actual_addr = listener.local_addr().map_err(|e| Error::BindFailed {
			addr: addr.clone(),
			reason: e.to_string(),
		})?;
		*self.actual_addr.write() = Some(actual_addr);
		tracing::info!("WebSocket server bound to {}", actual_addr);

		let (tx, mut rx) = watch::channel(false);
		let broker = self.broker.clone();
		let push_channel_capacity = self.config.push_channel_capacity;
		let running = self.running.clone();
		let active_connections = self.active_connections.clone();
		let semaphore = self.connection_semaphore.clone();

		running.store(true, Ordering::SeqCst);
		spawn(async move {
			loop {
				tokio::select! {
					biased;

					result = rx.changed() => {
						if result.is_err() || *rx.borrow() {
							tracing::info!("WebSocket server shutting down");
							break;
						}
					}

					accept = listener.accept() => {
						match accept {
							Ok((stream, peer)) => {
								// Dropping the stream closes it.
								let permit = match semaphore.clone().try_acquire_owned() {
									Ok(p) => p,
									Err(_) => {
										tracing::warn!("Connection limit reached, rejecting {}", peer);
										continue;
									}
								};

								let conn_broker = broker.clone();
								let shutdown_rx = rx.clone();
								let active = active_connections.clone();

								active.fetch_add(1, Ordering::SeqCst);
								tracing::debug!("Accepted connection from {}", peer);

								spawn(async move {
									handle_connection(stream, conn_broker, push_channel_capacity, shutdown_rx).await;
									active.fetch_sub(1, Ordering::SeqCst);
									drop(permit);
								});
							}
							Err(e) => {
								tracing::warn!("Accept error: {}", e);
							}
						}
					}
				}
			}

			running.store(false, Ordering::SeqCst);
			tracing::info!("WebSocket server stopped");
		});

		self.shutdown_tx = Some(tx);
		Ok(())
	}

	async fn shutdown(&mut self) -> Result<()> {
		if let Some(tx) = self.shutdown_tx.take() {
			let _ = tx.send(true);
		}

		let active = self.active_connections.clone();
		let deadline = Instant::now() + DRAIN_TIMEOUT;
		while active.load(Ordering::SeqCst) > 0 {
			if Instant::now() > deadline {
				tracing::warn!(
					"WebSocket shutdown timeout with {} connections still active",
					active.load(Ordering::SeqCst)
				);
				break;
			}
			sleep(Duration::from_millis(100)).await;
		}
		tracing::debug!("WebSocket server shutdown completed");

		Ok(())
	}

	fn is_running(&self) -> bool {
		self.running.load(Ordering::SeqCst)
	}

	fn health_status(&self) -> HealthStatus {
		if self.running.load(Ordering::SeqCst) {
			let active = self.active_connections.load(Ordering::SeqCst);
			let max = self.config.max_connections;

			// Warn if connections are at 90% capacity
			if active > max * 90 / 100 {
				HealthStatus::Warning {
					description: format!("High connection count: {}/{}", active, max),
				}
			} else {
				HealthStatus::Healthy
			}
		} else if self.shutdown_tx.is_some() {
			HealthStatus::Warning {
				description: "Starting up".to_string(),
			}
		} else {
			HealthStatus::Failed {
				description: "Not running".to_string(),
			}
		}
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}
