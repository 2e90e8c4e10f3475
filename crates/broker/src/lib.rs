// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Reactive query broker.
//!
//! Clients subscribe to live queries over a [`Store`](liveq_types::Store).
//! Identical queries from any number of connections share one
//! [`QueryId`](liveq_types::QueryId) and one change stream; every change to a
//! matching document recomputes the query and pushes the full result set to
//! each subscribed connection once.
//!
//! The [`Broker`] is transport agnostic. A transport calls
//! [`Broker::connect`] with a push channel per connection, forwards subscribe
//! and unsubscribe requests, and calls [`Broker::disconnect`] when the
//! connection closes.

mod broker;
pub mod collection;
pub mod config;
pub mod connection;
pub mod identity;
pub mod push;
pub mod watcher;

pub use broker::{Broker, BrokerStats, Subscription};
pub use config::{BrokerConfig, DEFAULT_PUSH_INTERVAL};
pub use push::{DeliveryResult, PushMessage, PushRegistry};
pub use watcher::WatcherState;
