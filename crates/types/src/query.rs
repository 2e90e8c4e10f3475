// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Query parameters and their canonical identity.
//!
//! Two subscriptions denote the same live query when their canonical keys
//! are equal. The canonical form is a JSON serialization with object keys
//! sorted at every depth, integral floats written as integers and a missing
//! (`null`) filter or options document treated as `{}`. It is hashed with
//! xxHash3-128, and the full text is kept for the equality check so a hash
//! collision cannot alias two different queries.

use std::{
	fmt::Write,
	hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::hash::{Hash128, xxh3_128};

/// Largest integer an f64 represents exactly.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// A `find` against one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameters {
	pub collection: String,
	#[serde(default)]
	pub filter: Value,
	/// Sort, skip, limit and projection; interpreted by the store.
	#[serde(default)]
	pub options: Value,
}

impl QueryParameters {
	pub fn new(collection: impl Into<String>, filter: Value, options: Value) -> Self {
		Self {
			collection: collection.into(),
			filter: empty_if_null(filter),
			options: empty_if_null(options),
		}
	}

	/// Every document of `collection`, no options.
	pub fn all(collection: impl Into<String>) -> Self {
		Self::new(collection, Value::Null, Value::Null)
	}

	pub fn canonical_key(&self) -> CanonicalKey {
		let mut text = String::with_capacity(64);
		write_string(&self.collection, &mut text);
		text.push('|');
		write_document(&self.filter, &mut text);
		text.push('|');
		write_document(&self.options, &mut text);

		CanonicalKey {
			hash: xxh3_128(text.as_bytes()),
			text,
		}
	}
}

/// Deterministic identity of a [`QueryParameters`] value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalKey {
	hash: Hash128,
	text: String,
}

impl CanonicalKey {
	pub fn hash128(&self) -> Hash128 {
		self.hash
	}

	pub fn as_str(&self) -> &str {
		&self.text
	}
}

impl Hash for CanonicalKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.hash.hash(state)
	}
}

fn empty_if_null(value: Value) -> Value {
	match value {
		Value::Null => Value::Object(Default::default()),
		other => other,
	}
}

fn write_document(value: &Value, out: &mut String) {
	match value {
		Value::Null => out.push_str("{}"),
		other => write_canonical(other, out),
	}
}

fn write_canonical(value: &Value, out: &mut String) {
	match value {
		Value::Null => out.push_str("null"),
		Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
		Value::Number(n) => write_number(n, out),
		Value::String(s) => write_string(s, out),
		Value::Array(items) => {
			out.push('[');
			for (idx, item) in items.iter().enumerate() {
				if idx > 0 {
					out.push(',');
				}
				write_canonical(item, out);
			}
			out.push(']');
		}
		Value::Object(map) => {
			let mut keys: Vec<&String> = map.keys().collect();
			keys.sort();
			out.push('{');
			for (idx, key) in keys.into_iter().enumerate() {
				if idx > 0 {
					out.push(',');
				}
				write_string(key, out);
				out.push(':');
				write_canonical(&map[key.as_str()], out);
			}
			out.push('}');
		}
	}
}

fn write_number(n: &Number, out: &mut String) {
	if let Some(i) = n.as_i64() {
		let _ = write!(out, "{}", i);
	} else if let Some(u) = n.as_u64() {
		let _ = write!(out, "{}", u);
	} else if let Some(f) = n.as_f64() {
		if f.is_finite() && f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT {
			let _ = write!(out, "{}", f as i64);
		} else {
			let _ = write!(out, "{}", n);
		}
	}
}

fn write_string(s: &str, out: &mut String) {
	let _ = write!(out, "{}", Value::from(s));
}
