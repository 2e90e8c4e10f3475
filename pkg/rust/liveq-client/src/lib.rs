// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Client for the LiveQ WebSocket server.
//!
//! [`WsClient`] speaks the request/response protocol and routes pushed
//! updates by query id. [`LiveCursor`] wraps one live query and keeps its
//! current result set in place.
//!
//! ```no_run
//! use liveq_client::{LiveCursor, WsClient};
//! use liveq_types::QueryParameters;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! 	let client = WsClient::connect("ws://localhost:8091").await?;
//! 	let mut cursor = LiveCursor::new(client, QueryParameters::all("jobs"));
//! 	cursor.subscribe(|documents| println!("{} jobs", documents.len())).await?;
//! 	Ok(())
//! }
//! ```

mod cursor;
mod error;
mod utils;
pub mod ws;

pub use cursor::LiveCursor;
pub use error::ClientError;
pub use liveq_types::{Diagnostic, Document, QueryId, QueryParameters};
pub use ws::{LiveSubscription, WsClient};
