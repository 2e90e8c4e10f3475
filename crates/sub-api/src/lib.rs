// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Subsystem API crate providing the lifecycle interface shared by LiveQ
//! subsystems.

pub mod subsystem;

pub use subsystem::{HealthStatus, Subsystem};
