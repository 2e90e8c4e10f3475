// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! WebSocket server subsystem for LiveQ.
//!
//! This crate exposes a [`Broker`](liveq_broker::Broker) over
//! tokio-tungstenite and implements the `Subsystem` trait for lifecycle
//! management.
//!
//! # Features
//!
//! - One broker connection per socket, with a bounded push channel
//! - Connection limits via semaphore
//! - Graceful shutdown with connection draining
//!
//! # Message Protocol
//!
//! All messages are JSON-formatted with the following structure:
//!
//! ```json
//! {
//!   "id": "unique-request-id",
//!   "type": "collection::find::subscribe|collection::find::unsubscribe",
//!   "payload": { ... }
//! }
//! ```
//!
//! Live query updates are pushed without an `id`:
//!
//! ```json
//! {"type": "collection::find::update", "payload": {"query_id": 0, "data": [...]}}
//! ```
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(MemoryStore::new());
//! let broker = Broker::new(store, BrokerConfig::default());
//!
//! let mut ws = WsSubsystem::new(WsConfig::new().bind_addr("0.0.0.0:8091"), broker);
//! ws.start().await?;
//! ```

pub mod config;
pub mod handler;
pub mod subsystem;

pub use config::WsConfig;
pub use handler::handle_connection;
pub use subsystem::WsSubsystem;
