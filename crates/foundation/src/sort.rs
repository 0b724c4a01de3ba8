//! Attribute sorting for JSON records.
//!
//! Values are compared with the loose relational semantics of a browser
//! runtime: two strings compare by UTF-16 code units, every other pairing is
//! compared numerically after coercion, and any comparison involving NaN is
//! false in both directions. That relation is not a total order, so the sort
//! below is a hand-written stable merge sort that tolerates it.

use std::cmp::Ordering;

use serde_json::Value;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Comparison key derived from a record attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Number(f64),
    Text(String),
    /// `null` and booleans: compared numerically, never as text.
    Primitive(f64),
}

impl SortKey {
    fn from_value(value: &Value) -> Self {
        if let Some(n) = parse_int(&js_string(value)) {
            return SortKey::Number(n);
        }
        match value {
            Value::Null => SortKey::Primitive(0.0),
            Value::Bool(b) => SortKey::Primitive(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => SortKey::Number(n.as_f64().unwrap_or(f64::NAN)),
            other => SortKey::Text(js_string(other)),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            SortKey::Number(n) | SortKey::Primitive(n) => *n,
            SortKey::Text(s) => string_to_number(s),
        }
    }

    /// Loose `<`.
    pub fn less_than(&self, other: &SortKey) -> bool {
        match (self, other) {
            (SortKey::Text(a), SortKey::Text(b)) => a.encode_utf16().lt(b.encode_utf16()),
            _ => self.to_number() < other.to_number(),
        }
    }
}

/// Resolves a dotted path such as `"properties.street._"`.
///
/// A missing intermediate or final property yields an empty string.
pub fn nested_element(record: &Value, path: &str) -> Value {
    let mut current = record;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Value::String(String::new()),
        }
    }
    current.clone()
}

pub fn sort_key(record: &Value, path: &str) -> SortKey {
    SortKey::from_value(&nested_element(record, path))
}

/// Sorts `records` in place by the attribute at `path`.
pub fn sort_objects(records: &mut [Value], path: &str, order: SortOrder) {
    let keys: Vec<SortKey> = records.iter().map(|r| sort_key(r, path)).collect();
    let compare = |a: usize, b: usize| -> Ordering {
        let (x, y) = match order {
            SortOrder::Asc => (&keys[a], &keys[b]),
            SortOrder::Desc => (&keys[b], &keys[a]),
        };
        if x.less_than(y) {
            Ordering::Less
        } else if y.less_than(x) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    };

    let mut order_idx: Vec<usize> = (0..records.len()).collect();
    merge_sort(&mut order_idx, &compare);

    let mut taken: Vec<Value> = records.iter_mut().map(std::mem::take).collect();
    for (slot, idx) in records.iter_mut().zip(order_idx) {
        *slot = std::mem::take(&mut taken[idx]);
    }
}

fn merge_sort(items: &mut Vec<usize>, compare: &impl Fn(usize, usize) -> Ordering) {
    if items.len() <= 1 {
        return;
    }
    let mut right = items.split_off(items.len() / 2);
    merge_sort(items, compare);
    merge_sort(&mut right, compare);

    let left = std::mem::take(items);
    items.reserve(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        // Take from the right only when strictly smaller to keep stability.
        if compare(right[j], left[i]) == Ordering::Less {
            items.push(right[j]);
            j += 1;
        } else {
            items.push(left[i]);
            i += 1;
        }
    }
    items.extend_from_slice(&left[i..]);
    items.extend_from_slice(&right[j..]);
}

/// String conversion of a JSON value as a browser runtime would print it.
fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{}", f as i128),
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Leading-integer parse: optional whitespace and sign, then decimal digits
/// (or hex digits after `0x`). Returns `None` where the runtime yields NaN.
fn parse_int(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = if s.len() >= 2 && (s.starts_with("0x") || s.starts_with("0X")) {
        (16, &s[2..])
    } else {
        (10, s)
    };
    let mut value: f64 = 0.0;
    let mut seen = false;
    for c in digits.chars() {
        let Some(d) = c.to_digit(radix) else {
            break;
        };
        value = value * f64::from(radix) + f64::from(d);
        seen = true;
    }
    if !seen {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Full-string numeric conversion used when a text key meets a number.
fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    match t {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => t.parse::<f64>().unwrap_or(f64::NAN),
    }
}
