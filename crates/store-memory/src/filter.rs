// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Filter evaluation.
//!
//! A filter is a JSON object. Each entry names a field (dotted paths descend
//! into nested objects) and either a literal the field must equal, or an
//! operator document such as `{"$gte": 3}`. All entries must hold. An empty
//! or `null` filter matches everything.

use std::cmp::Ordering;

use serde_json::{Map, Value};

pub fn matches(filter: &Value, document: &Value) -> bool {
	match filter {
		Value::Null => true,
		Value::Object(conditions) => {
			conditions.iter().all(|(path, condition)| matches_field(lookup(document, path), condition))
		}
		_ => false,
	}
}

/// Resolve a dotted path inside a document.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
	path.split('.').try_fold(document, |current, segment| current.as_object()?.get(segment))
}

fn matches_field(field: Option<&Value>, condition: &Value) -> bool {
	match condition {
		Value::Object(ops) if is_operator_document(ops) => {
			ops.iter().all(|(op, operand)| apply_operator(field, op, operand))
		}
		literal => field == Some(literal),
	}
}

fn is_operator_document(ops: &Map<String, Value>) -> bool {
	!ops.is_empty() && ops.keys().all(|k| k.starts_with('$'))
}

fn apply_operator(field: Option<&Value>, op: &str, operand: &Value) -> bool {
	match op {
		"$eq" => field == Some(operand),
		"$ne" => field != Some(operand),
		"$gt" => ordering(field, operand) == Some(Ordering::Greater),
		"$gte" => matches!(ordering(field, operand), Some(Ordering::Greater | Ordering::Equal)),
		"$lt" => ordering(field, operand) == Some(Ordering::Less),
		"$lte" => matches!(ordering(field, operand), Some(Ordering::Less | Ordering::Equal)),
		"$in" => operand.as_array().is_some_and(|values| field.is_some_and(|f| values.contains(f))),
		"$nin" => operand.as_array().is_some_and(|values| field.is_none_or(|f| !values.contains(f))),
		"$exists" => operand.as_bool().is_some_and(|expected| field.is_some() == expected),
		_ => false,
	}
}

/// Ordering between values of the same kind; `None` across kinds.
fn ordering(field: Option<&Value>, operand: &Value) -> Option<Ordering> {
	match (field?, operand) {
		(Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
		(Value::String(a), Value::String(b)) => Some(a.cmp(b)),
		(Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
		_ => None,
	}
}

/// Total order used for sorting: null < bool < number < string < other.
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
	fn rank(value: Option<&Value>) -> u8 {
		match value {
			None | Some(Value::Null) => 0,
			Some(Value::Bool(_)) => 1,
			Some(Value::Number(_)) => 2,
			Some(Value::String(_)) => 3,
			Some(_) => 4,
		}
	}

	match (a, b) {
		(Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
		(Some(Value::Number(x)), Some(Value::Number(y))) => {
			x.as_f64().unwrap_or(0.0).total_cmp(&y.as_f64().unwrap_or(0.0))
		}
		(Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
		_ => rank(a).cmp(&rank(b)),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_empty_filter_matches_everything() {
		assert!(matches(&json!({}), &json!({"a": 1})));
		assert!(matches(&Value::Null, &json!({"a": 1})));
	}

	#[test]
	fn test_equality_and_nested_paths() {
		let doc = json!({"status": "queued", "owner": {"team": "infra"}});
		assert!(matches(&json!({"status": "queued"}), &doc));
		assert!(matches(&json!({"owner.team": "infra"}), &doc));
		assert!(!matches(&json!({"owner.team": "web"}), &doc));
		assert!(!matches(&json!({"missing": "x"}), &doc));
	}

	#[test]
	fn test_operators() {
		let doc = json!({"priority": 3, "tag": "nightly"});
		assert!(matches(&json!({"priority": {"$gte": 3}}), &doc));
		assert!(matches(&json!({"priority": {"$gt": 1, "$lt": 5}}), &doc));
		assert!(!matches(&json!({"priority": {"$lt": 3}}), &doc));
		assert!(matches(&json!({"tag": {"$in": ["nightly", "weekly"]}}), &doc));
		assert!(matches(&json!({"tag": {"$nin": ["weekly"]}}), &doc));
		assert!(matches(&json!({"tag": {"$ne": "weekly"}}), &doc));
		assert!(matches(&json!({"owner": {"$exists": false}}), &doc));
		assert!(!matches(&json!({"priority": {"$gt": "a"}}), &doc));
	}

	#[test]
	fn test_literal_object_is_compared_whole() {
		let doc = json!({"owner": {"team": "infra"}});
		assert!(matches(&json!({"owner": {"team": "infra"}}), &doc));
		assert!(!matches(&json!({"owner": {}}), &doc));
	}

	#[test]
	fn test_sort_order_across_kinds() {
		assert_eq!(sort_order(None, Some(&json!(1))), Ordering::Less);
		assert_eq!(sort_order(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
		assert_eq!(sort_order(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
		assert_eq!(sort_order(Some(&json!(true)), Some(&json!("a"))), Ordering::Less);
	}
}
