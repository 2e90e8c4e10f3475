// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! In-memory document store for LiveQ.
//!
//! Implements the [`liveq_types::Store`] contract over JSON documents held in
//! memory. Used by the server binary and by tests; writes made through
//! [`MemoryStore::insert`], [`MemoryStore::update`] and
//! [`MemoryStore::remove`] notify every open watch whose filter matches the
//! document before or after the write.

pub mod filter;
pub mod options;
mod store;

pub use store::MemoryStore;
