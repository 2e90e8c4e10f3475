// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Shared types for LiveQ.
//!
//! This crate holds everything the broker, the stores and the transports
//! need to agree on:
//!
//! - [`QueryParameters`] and its canonical, order-insensitive key
//! - the [`QueryId`] and [`ConnectionId`] handles
//! - the [`Error`] taxonomy and its wire [`Diagnostic`]
//! - the [`Store`] collaborator contract with its [`ChangeStream`]

pub mod error;
pub mod hash;
pub mod id;
pub mod query;
pub mod store;

pub use error::{Diagnostic, Error};
pub use hash::{Hash128, xxh3_128};
pub use id::{ConnectionId, QueryId};
pub use query::{CanonicalKey, QueryParameters};
pub use store::{ChangeEvent, ChangeKind, ChangeStream, Store, WatchHandle};

/// A single document as stored and returned by a [`Store`].
pub type Document = serde_json::Value;

pub type Result<T> = std::result::Result<T, Error>;
