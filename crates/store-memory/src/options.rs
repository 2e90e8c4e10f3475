// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Query options: `sort`, `skip`, `limit` and `projection`.
//!
//! `sort` is either an object (`{"created": -1}`, keys applied in map order)
//! or an array of `[field, direction]` pairs when the key order matters.
//! `projection` either includes (`1`/`true`) or excludes (`0`/`false`)
//! fields; `_id` is kept unless excluded explicitly.

use std::cmp::Ordering;

use liveq_types::Document;
use serde_json::{Map, Value};

use crate::filter::{lookup, sort_order};

pub(crate) const ID_FIELD: &str = "_id";

pub fn apply(mut documents: Vec<Document>, options: &Value) -> Vec<Document> {
	let Some(options) = options.as_object() else {
		return documents;
	};

	if let Some(keys) = options.get("sort").map(sort_keys) {
		if !keys.is_empty() {
			documents.sort_by(|a, b| compare(a, b, &keys));
		}
	}

	let skip = options.get("skip").and_then(Value::as_u64).unwrap_or(0) as usize;
	let limit = options.get("limit").and_then(Value::as_u64).map(|l| l as usize);

	let selected = documents.into_iter().skip(skip);
	let selected: Vec<Document> = match limit {
		Some(limit) => selected.take(limit).collect(),
		None => selected.collect(),
	};

	match options.get("projection").and_then(Value::as_object) {
		Some(projection) if !projection.is_empty() => {
			selected.into_iter().map(|doc| project(doc, projection)).collect()
		}
		_ => selected,
	}
}

fn sort_keys(sort: &Value) -> Vec<(String, bool)> {
	let descending = |direction: &Value| direction.as_i64().is_some_and(|d| d < 0);

	match sort {
		Value::Object(map) => map.iter().map(|(field, dir)| (field.clone(), descending(dir))).collect(),
		Value::Array(pairs) => pairs
			.iter()
			.filter_map(|pair| {
				let pair = pair.as_array()?;
				let field = pair.first()?.as_str()?;
				let dir = pair.get(1).unwrap_or(&Value::Null);
				Some((field.to_string(), descending(dir)))
			})
			.collect(),
		_ => Vec::new(),
	}
}

fn compare(a: &Document, b: &Document, keys: &[(String, bool)]) -> Ordering {
	for (field, descending) in keys {
		let ord = sort_order(lookup(a, field), lookup(b, field));
		let ord = if *descending {
			ord.reverse()
		} else {
			ord
		};
		if ord != Ordering::Equal {
			return ord;
		}
	}
	Ordering::Equal
}

fn included(flag: &Value) -> bool {
	match flag {
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
		_ => false,
	}
}

fn project(document: Document, projection: &Map<String, Value>) -> Document {
	let Value::Object(fields) = document else {
		return document;
	};

	let inclusive = projection.iter().any(|(field, flag)| field != ID_FIELD && included(flag));
	let keep_id = projection.get(ID_FIELD).is_none_or(included);

	let projected: Map<String, Value> = fields
		.into_iter()
		.filter(|(field, _)| {
			if field == ID_FIELD {
				return keep_id;
			}
			match projection.get(field) {
				Some(flag) => included(flag),
				None => !inclusive,
			}
		})
		.collect();

	Value::Object(projected)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn jobs() -> Vec<Document> {
		vec![
			json!({"_id": "1", "name": "build", "priority": 2, "owner": "a"}),
			json!({"_id": "2", "name": "test", "priority": 5, "owner": "b"}),
			json!({"_id": "3", "name": "deploy", "priority": 1, "owner": "a"}),
		]
	}

	fn ids(docs: &[Document]) -> Vec<&str> {
		docs.iter().map(|d| d["_id"].as_str().unwrap()).collect()
	}

	#[test]
	fn test_no_options() {
		assert_eq!(ids(&apply(jobs(), &json!({}))), vec!["1", "2", "3"]);
		assert_eq!(ids(&apply(jobs(), &Value::Null)), vec!["1", "2", "3"]);
	}

	#[test]
	fn test_sort_skip_limit() {
		let result = apply(jobs(), &json!({"sort": {"priority": -1}, "skip": 1, "limit": 1}));
		assert_eq!(ids(&result), vec!["1"]);
	}

	#[test]
	fn test_multi_key_sort() {
		let result = apply(jobs(), &json!({"sort": [["owner", 1], ["priority", -1]]}));
		assert_eq!(ids(&result), vec!["1", "3", "2"]);
	}

	#[test]
	fn test_inclusive_projection_keeps_id() {
		let result = apply(jobs(), &json!({"projection": {"name": 1}, "limit": 1}));
		assert_eq!(result, vec![json!({"_id": "1", "name": "build"})]);
	}

	#[test]
	fn test_exclusive_projection() {
		let result = apply(jobs(), &json!({"projection": {"owner": 0, "_id": 0}, "limit": 1}));
		assert_eq!(result, vec![json!({"name": "build", "priority": 2})]);
	}
}
