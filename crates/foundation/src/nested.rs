//! Recursive helpers over arbitrarily nested JSON documents.
//!
//! All walks are bounded by a maximum depth instead of cycle detection. Arrays
//! are walked like objects whose keys are indices, so an array nested below a
//! non-matching key costs one extra level of depth for its elements.
//!
//! Note on [`get_nested_values`]: values found below an already matched key
//! are NOT deduplicated. An array element that itself contains the search key
//! is recursed into and only its own leaves are collected; every other element
//! is collected as-is.
//!
//! [`replace_in_nested_values`] and [`search_in_tree`] are the untyped
//! counterparts of the walks on the typed layer tree
//! (`LayerConfig::replace_by_id` and `LayerConfig::search` in `layers`). They
//! work on documents that have not been deserialised into that model.

use serde_json::{Map, Value};

/// Default recursion bound shared by every walk in this module.
pub const DEFAULT_MAX_DEPTH: usize = 200;

/// Collects every value stored under `key` anywhere below `root`.
///
/// With `search_in_arrays`, an array found under `key` is expanded: elements
/// that contain `key` somewhere are recursed into, all others are collected as
/// terminal leaves. Without it the matched value is collected unchanged.
///
/// Returns an empty vector for primitive roots or when `key` never occurs.
pub fn get_nested_values<'a>(
    root: &'a Value,
    key: &str,
    search_in_arrays: bool,
    max_depth: usize,
) -> Vec<&'a Value> {
    let mut out = Vec::new();
    collect_nested(root, key, search_in_arrays, max_depth, 0, &mut out);
    out
}

fn collect_nested<'a>(
    node: &'a Value,
    key: &str,
    search_in_arrays: bool,
    max_depth: usize,
    depth: usize,
    out: &mut Vec<&'a Value>,
) {
    if depth >= max_depth {
        return;
    }
    match node {
        Value::Object(map) => {
            for (k, v) in map {
                if k != key {
                    collect_nested(v, key, search_in_arrays, max_depth, depth + 1, out);
                    continue;
                }
                match v {
                    Value::Array(items) if search_in_arrays => {
                        for item in items {
                            if contains_key(item, key, max_depth.saturating_sub(depth + 1)) {
                                collect_nested(item, key, true, max_depth, depth + 1, out);
                            } else {
                                out.push(item);
                            }
                        }
                    }
                    other => out.push(other),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_nested(item, key, search_in_arrays, max_depth, depth + 1, out);
            }
        }
        _ => {}
    }
}

/// Whether `key` occurs as a property name anywhere inside `node`.
pub fn contains_key(node: &Value, key: &str, max_depth: usize) -> bool {
    if max_depth == 0 {
        return false;
    }
    match node {
        Value::Object(map) => {
            map.contains_key(key) || map.values().any(|v| contains_key(v, key, max_depth - 1))
        }
        Value::Array(items) => items.iter().any(|v| contains_key(v, key, max_depth - 1)),
        _ => false,
    }
}

/// Condition an entry must satisfy to be replaced: `entry[key] == value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition<'a> {
    pub key: &'a str,
    pub value: &'a Value,
}

impl Condition<'_> {
    fn matches(&self, map: &Map<String, Value>) -> bool {
        map.get(self.key) == Some(self.value)
    }
}

/// Replaces or merges every entry under `key` that satisfies `condition`.
///
/// - An object stored directly under `key` is overwritten with `replacement`.
/// - Matching objects inside an array under `key` receive the fields of
///   `replacement` (fields absent from `replacement` survive).
/// - Non-matching array elements are only descended into when they hold an
///   array under `key` themselves.
///
/// Returns a copy of every replaced or merged entry. More than one entry means
/// the condition was not unique within the document.
pub fn replace_in_nested_values(
    root: &mut Value,
    key: &str,
    replacement: &Value,
    condition: &Condition<'_>,
    max_depth: usize,
) -> Vec<Value> {
    let mut replaced = Vec::new();
    replace_nested(root, key, replacement, condition, max_depth, 0, &mut replaced);
    replaced
}

fn replace_nested(
    node: &mut Value,
    key: &str,
    replacement: &Value,
    condition: &Condition<'_>,
    max_depth: usize,
    depth: usize,
    replaced: &mut Vec<Value>,
) {
    if depth >= max_depth {
        return;
    }
    match node {
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                if k != key {
                    replace_nested(v, key, replacement, condition, max_depth, depth + 1, replaced);
                    continue;
                }
                match v {
                    Value::Object(inner) => {
                        if condition.matches(inner) && *v != *replacement {
                            *v = replacement.clone();
                            replaced.push(replacement.clone());
                        }
                    }
                    Value::Array(items) => {
                        for item in items.iter_mut() {
                            let Value::Object(entry) = item else {
                                continue;
                            };
                            if condition.matches(entry) {
                                if let Value::Object(fields) = replacement {
                                    for (field, value) in fields {
                                        entry.insert(field.clone(), value.clone());
                                    }
                                }
                                replaced.push(item.clone());
                            } else if matches!(entry.get(key), Some(Value::Array(_))) {
                                replace_nested(
                                    item,
                                    key,
                                    replacement,
                                    condition,
                                    max_depth,
                                    depth + 1,
                                    replaced,
                                );
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                replace_nested(item, key, replacement, condition, max_depth, depth + 1, replaced);
            }
        }
        _ => {}
    }
}

/// Pre-order collection of every node (root included) with
/// `node[match_key] == match_value`. Only arrays under `child_key` are walked.
pub fn search_in_tree<'a>(
    root: &'a Value,
    child_key: &str,
    match_key: &str,
    match_value: &Value,
) -> Vec<&'a Value> {
    let mut out = Vec::new();
    search_node(root, child_key, match_key, match_value, &mut out);
    out
}

fn search_node<'a>(
    node: &'a Value,
    child_key: &str,
    match_key: &str,
    match_value: &Value,
    out: &mut Vec<&'a Value>,
) {
    let Value::Object(map) = node else {
        return;
    };
    if map.get(match_key) == Some(match_value) {
        out.push(node);
    }
    if let Some(Value::Array(children)) = map.get(child_key) {
        for child in children {
            search_node(child, child_key, match_key, match_value, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree() -> Value {
        json!({
            "subjectlayer": {
                "elements": [
                    {"id": "1", "name": "one"},
                    {
                        "type": "folder",
                        "name": "f1",
                        "elements": [
                            {"id": "2"},
                            {
                                "type": "folder",
                                "name": "f2",
                                "elements": [{"id": "3"}, {"id": "4"}]
                            }
                        ]
                    },
                    {"id": "5"}
                ]
            }
        })
    }

    #[test]
    fn flattens_leaves_in_document_order() {
        let tree = sample_tree();
        let leaves = get_nested_values(&tree, "elements", true, DEFAULT_MAX_DEPTH);
        let ids: Vec<&str> = leaves.iter().filter_map(|v| v["id"].as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(leaves.len(), 5);
    }

    #[test]
    fn without_array_search_returns_raw_values() {
        let tree = sample_tree();
        let values = get_nested_values(&tree, "elements", false, DEFAULT_MAX_DEPTH);
        // Only the outermost array: matched values are not descended into.
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn primitive_root_and_missing_key_yield_nothing() {
        assert!(get_nested_values(&Value::Null, "elements", true, 10).is_empty());
        assert!(get_nested_values(&json!(5), "elements", true, 10).is_empty());
        assert!(get_nested_values(&json!({"a": {"b": 1}}), "elements", true, 10).is_empty());
    }

    #[test]
    fn depth_limit_stops_recursion() {
        let tree = json!({"a": {"b": {"c": {"key": 1}}}});
        assert_eq!(get_nested_values(&tree, "key", false, 10).len(), 1);
        assert!(get_nested_values(&tree, "key", false, 3).is_empty());
    }

    #[test]
    fn replace_merges_array_entries() {
        let mut tree = json!({
            "baselayer": {"elements": [{"id": "a", "name": "A", "url": "u"}]}
        });
        let replaced = replace_in_nested_values(
            &mut tree,
            "elements",
            &json!({"id": "a", "visibility": true}),
            &Condition {
                key: "id",
                value: &json!("a"),
            },
            DEFAULT_MAX_DEPTH,
        );
        assert_eq!(replaced.len(), 1);
        assert_eq!(
            tree["baselayer"]["elements"][0],
            json!({"id": "a", "name": "A", "url": "u", "visibility": true})
        );
    }

    #[test]
    fn replace_overwrites_direct_objects() {
        let mut tree = json!({"wrapper": {"elements": {"id": "x", "keep": 1}}});
        let replacement = json!({"id": "x", "new": 2});
        let replaced = replace_in_nested_values(
            &mut tree,
            "elements",
            &replacement,
            &Condition {
                key: "id",
                value: &json!("x"),
            },
            DEFAULT_MAX_DEPTH,
        );
        assert_eq!(replaced, vec![replacement.clone()]);
        assert_eq!(tree["wrapper"]["elements"], replacement);
    }

    #[test]
    fn replace_descends_into_folders_and_reports_duplicates() {
        let mut tree = json!({
            "elements": [
                {"id": "dup"},
                {"type": "folder", "elements": [{"id": "dup"}, {"id": "other"}]}
            ]
        });
        let replaced = replace_in_nested_values(
            &mut tree,
            "elements",
            &json!({"flag": true}),
            &Condition {
                key: "id",
                value: &json!("dup"),
            },
            DEFAULT_MAX_DEPTH,
        );
        assert_eq!(replaced.len(), 2);
        assert_eq!(tree["elements"][1]["elements"][0]["flag"], json!(true));
        assert!(tree["elements"][1]["elements"][1].get("flag").is_none());
    }

    #[test]
    fn search_in_tree_is_pre_order_and_includes_root() {
        let tree = json!({
            "type": "folder",
            "name": "root",
            "elements": [
                {"type": "folder", "name": "a", "elements": [{"type": "folder", "name": "b"}]},
                {"type": "layer", "name": "l"},
                {"type": "folder", "name": "c"}
            ]
        });
        let found = search_in_tree(&tree, "elements", "type", &json!("folder"));
        let names: Vec<&str> = found.iter().filter_map(|v| v["name"].as_str()).collect();
        assert_eq!(names, vec!["root", "a", "b", "c"]);
    }
}
