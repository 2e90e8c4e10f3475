// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Message types for client-server communication.
//!
//! Requests and responses carry an `id` that clients use to correlate them.
//! Server pushes carry no `id`; they are routed by `query_id` instead.
//!
//! ```json
//! {"id": "1", "type": "collection::find::subscribe", "payload": {"collection": "jobs", "filter": {}, "options": {}}}
//! {"id": "1", "type": "collection::find::subscribe", "payload": {"query_id": 0, "documents": [...]}}
//! {"type": "collection::find::update", "payload": {"query_id": 0, "data": [...]}}
//! {"id": "2", "type": "collection::find::unsubscribe", "payload": {"query_id": 0}}
//! ```

pub mod request;
pub mod response;

pub use request::{Request, RequestPayload, SubscribeRequest, UnsubscribeRequest};
pub use response::{
	ErrResponse, Response, ResponsePayload, ServerPush, SubscribedResponse, UnsubscribedResponse, UpdatePayload,
};
