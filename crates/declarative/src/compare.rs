//! Structural equivalence of resource representations
//!
//! REST resources come back with keys in arbitrary order, lists in arbitrary
//! order and numbers that may be integers or integral floats depending on
//! the endpoint. This module decides whether two such representations mean
//! the same thing:
//!
//! - a missing key is equivalent to an explicit `null`
//! - two falsy values (`null`, `false`, `0`, `""`, `[]`, `{}`) are equal
//! - lists are compared after sorting by a canonical key
//! - scalars are compared by their canonical string form, so `5`, `5.0`
//!   and `"5"` are all equal
//!
//! Comparison is pure. [`diff`] returns the first [`Difference`] found so the
//! caller can log where two resources diverge.

use serde_json::{Map, Value};
use std::fmt;

/// Why two representations were judged different.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Left side is non-empty but the right side is empty or missing.
    EmptyCounterpart,
    /// Key present (non-null) on the left, missing on the right.
    MissingKey,
    /// Key present (non-null) on the right, missing on the left.
    UnexpectedKey,
    /// Scalars differ after canonicalization.
    ValueMismatch,
    /// Lists have different lengths.
    LengthMismatch,
    /// One side is a mapping, list or scalar and the other is not.
    KindMismatch,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::EmptyCounterpart => "counterpart is empty",
            Self::MissingKey => "missing key",
            Self::UnexpectedKey => "unexpected key",
            Self::ValueMismatch => "values differ",
            Self::LengthMismatch => "lengths differ",
            Self::KindMismatch => "kinds differ",
        };
        f.write_str(text)
    }
}

/// One step of a path into a nested value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Mapping key.
    Key(String),
    /// Position in a sorted list.
    Index(usize),
}

/// First point at which two representations diverge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference {
    /// Path from the root to the differing value. Empty for the root.
    pub path: Vec<PathSegment>,
    /// Kind of divergence.
    pub reason: Reason,
}

impl Difference {
    fn at_root(reason: Reason) -> Self {
        Self {
            path: Vec::new(),
            reason,
        }
    }

    fn at_key(key: &str, reason: Reason) -> Self {
        Self {
            path: vec![PathSegment::Key(key.to_string())],
            reason,
        }
    }

    fn under(mut self, segment: PathSegment) -> Self {
        self.path.insert(0, segment);
        self
    }

    /// Dotted path such as `initiators[0].address`.
    #[must_use]
    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(i) => {
                    out.push_str(&format!("[{}]", i));
                }
            }
        }
        out
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key '{}' ({})", self.path_string(), self.reason)
    }
}

/// Whether a value counts as empty: `null`, `false`, zero, `""`, `[]`, `{}`.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Canonical string form of a value.
///
/// Integral floats lose their fraction (`16384.0` → `"16384"`), strings are
/// unquoted and composites serialize with sorted keys.
#[must_use]
pub fn canonical(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => canonical_number(n),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => canonical_json(value),
    }
}

fn canonical_number(n: &serde_json::Number) -> String {
    if n.is_f64()
        && let Some(f) = n.as_f64()
        && f.fract() == 0.0
        && f.abs() < 9.007_199_254_740_992e15
    {
        #[allow(clippy::cast_possible_truncation)]
        return (f as i64).to_string();
    }
    n.to_string()
}

/// JSON text with keys sorted at every level and integral floats folded.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        Value::String(k.clone()),
                        canonical_json(&map[k.as_str()])
                    )
                })
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        Value::Number(n) => canonical_number(n),
        other => other.to_string(),
    }
}

/// Sort key used for list comparison.
fn sort_key(value: &Value) -> String {
    match value {
        Value::Object(_) => canonical_json(value),
        other => canonical(other),
    }
}

#[derive(PartialEq, Eq)]
enum Kind {
    Mapping,
    List,
    Scalar,
}

fn kind(value: &Value) -> Kind {
    match value {
        Value::Object(_) => Kind::Mapping,
        Value::Array(_) => Kind::List,
        _ => Kind::Scalar,
    }
}

/// Whether two mappings are semantically equal.
#[must_use]
pub fn equal(a: &Value, b: &Value) -> bool {
    diff(a, b).is_none()
}

/// Whether two lists are semantically equal, ignoring order.
#[must_use]
pub fn equal_list(a: &Value, b: &Value) -> bool {
    diff_list(a, b).is_none()
}

/// First difference between two mappings, or `None` when they are equal.
///
/// Non-mapping inputs are compared as values: same kind and canonical form
/// or a [`Reason::KindMismatch`] / [`Reason::ValueMismatch`] at the root.
#[must_use]
pub fn diff(a: &Value, b: &Value) -> Option<Difference> {
    if is_truthy(a) && !is_truthy(b) {
        return Some(Difference::at_root(Reason::EmptyCounterpart));
    }
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => diff_maps(left, right),
        (Value::Object(_), _) if !is_truthy(a) && !is_truthy(b) => None,
        (Value::Object(_), _) => Some(Difference::at_root(Reason::KindMismatch)),
        (Value::Array(_), _) => diff_list(a, b),
        _ => diff_element(a, b),
    }
}

fn diff_maps(left: &Map<String, Value>, right: &Map<String, Value>) -> Option<Difference> {
    for (key, lv) in left {
        let Some(rv) = right.get(key) else {
            if lv.is_null() {
                continue;
            }
            return Some(Difference::at_key(key, Reason::MissingKey));
        };

        if !is_truthy(lv) && !is_truthy(rv) {
            continue;
        }

        let found = match lv {
            Value::Object(_) if kind(rv) != Kind::Mapping => {
                Some(Difference::at_root(Reason::KindMismatch))
            }
            Value::Object(_) => diff(lv, rv),
            Value::Array(_) => diff_list(lv, rv),
            _ if kind(rv) != Kind::Scalar => Some(Difference::at_root(Reason::KindMismatch)),
            _ if canonical(lv) != canonical(rv) => {
                Some(Difference::at_root(Reason::ValueMismatch))
            }
            _ => None,
        };

        if let Some(found) = found {
            return Some(found.under(PathSegment::Key(key.clone())));
        }
    }

    for (key, rv) in right {
        if !left.contains_key(key) && !rv.is_null() {
            return Some(Difference::at_key(key, Reason::UnexpectedKey));
        }
    }

    None
}

/// First difference between two lists, or `None` when they are equal.
///
/// Lists are sorted by canonical key and compared position by position. An
/// empty or missing right side is always a difference, even against an empty
/// left list; inside a mapping, two empty values are skipped before this runs.
#[must_use]
pub fn diff_list(a: &Value, b: &Value) -> Option<Difference> {
    let Value::Array(left) = a else {
        return diff_element(a, b);
    };
    if !is_truthy(b) {
        return Some(Difference::at_root(Reason::EmptyCounterpart));
    }
    let Value::Array(right) = b else {
        return Some(Difference::at_root(Reason::KindMismatch));
    };
    if left.len() != right.len() {
        return Some(Difference::at_root(Reason::LengthMismatch));
    }

    let left = sorted(left);
    let right = sorted(right);

    left.iter()
        .zip(right.iter())
        .enumerate()
        .find_map(|(i, (lv, rv))| {
            let found = match lv {
                Value::Object(_) if kind(rv) != Kind::Mapping => {
                    Some(Difference::at_root(Reason::KindMismatch))
                }
                Value::Object(_) => diff(lv, rv),
                Value::Array(_) => diff_list(lv, rv),
                _ => diff_element(lv, rv),
            };
            found.map(|d| d.under(PathSegment::Index(i)))
        })
}

fn diff_element(a: &Value, b: &Value) -> Option<Difference> {
    if kind(a) != kind(b) {
        return Some(Difference::at_root(Reason::KindMismatch));
    }
    if canonical(a) != canonical(b) {
        return Some(Difference::at_root(Reason::ValueMismatch));
    }
    None
}

fn sorted(items: &[Value]) -> Vec<&Value> {
    let mut keyed: Vec<(String, &Value)> = items.iter().map(|v| (sort_key(v), v)).collect();
    keyed.sort_by(|x, y| x.0.cmp(&y.0));
    keyed.into_iter().map(|(_, v)| v).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equal_is_reflexive() {
        let samples = [
            json!({}),
            json!({"a": 1, "b": [3, 1, 2], "c": {"d": null, "e": [{"x": 1}, {"y": 2}]}}),
            json!({"list": []}),
            json!({"flag": false, "n": 0, "s": ""}),
            json!({"nested": [[1, 2], [3]]}),
        ];
        for sample in &samples {
            assert!(equal(sample, sample), "not reflexive: {}", sample);
        }
    }

    #[test]
    fn test_missing_key_equals_null() {
        assert!(equal(&json!({"a": 1, "b": null}), &json!({"a": 1})));
        assert!(equal(&json!({"a": 1}), &json!({"a": 1, "b": null})));
    }

    #[test]
    fn test_missing_key_with_value_differs() {
        let d = diff(&json!({"a": 1, "b": 2}), &json!({"a": 1})).unwrap();
        assert_eq!(d.reason, Reason::MissingKey);
        assert_eq!(d.path_string(), "b");

        let d = diff(&json!({"a": 1}), &json!({"a": 1, "c": "x"})).unwrap();
        assert_eq!(d.reason, Reason::UnexpectedKey);
        assert_eq!(d.path_string(), "c");
    }

    #[test]
    fn test_integral_float_equals_integer() {
        assert!(equal(&json!({"a": 1.0}), &json!({"a": 1})));
        assert!(equal(&json!({"size": 16384.0}), &json!({"size": "16384"})));
        assert!(!equal(&json!({"a": 1.5}), &json!({"a": 1})));
    }

    #[test]
    fn test_type_is_ignored_for_scalars() {
        assert!(equal(&json!({"a": "5"}), &json!({"a": 5})));
        assert!(equal(&json!({"a": "true"}), &json!({"a": true})));
    }

    #[test]
    fn test_falsy_values_are_equal() {
        assert!(equal(
            &json!({"a": null, "b": false, "c": 0, "d": "", "e": [], "f": {}}),
            &json!({"a": "", "b": [], "c": null, "d": false, "e": {}, "f": 0})
        ));
    }

    #[test]
    fn test_truthy_against_empty() {
        let d = diff(&json!({"a": 1}), &json!({})).unwrap();
        assert_eq!(d.reason, Reason::EmptyCounterpart);
        assert!(d.path.is_empty());
        assert!(equal(&json!({}), &json!({"a": null})));
    }

    #[test]
    fn test_list_order_is_ignored() {
        assert!(equal_list(&json!([3, 1, 2]), &json!([1, 2, 3])));
        assert!(equal_list(&json!([1.0, 2]), &json!([2, 1])));
    }

    #[test]
    fn test_list_length_mismatch() {
        assert!(!equal_list(&json!([1, 2]), &json!([1, 2, 3])));
        let d = diff_list(&json!([1, 2]), &json!([1, 2, 3])).unwrap();
        assert_eq!(d.reason, Reason::LengthMismatch);
    }

    #[test]
    fn test_list_against_empty_right_side() {
        let d = diff_list(&json!([1]), &json!([])).unwrap();
        assert_eq!(d.reason, Reason::EmptyCounterpart);
        let d = diff_list(&json!([1]), &Value::Null).unwrap();
        assert_eq!(d.reason, Reason::EmptyCounterpart);
    }

    #[test]
    fn test_booleans_canonicalize_in_json_spelling() {
        assert_eq!(canonical(&json!(true)), "true");
        assert!(equal(&json!({"a": "true"}), &json!({"a": true})));
        assert!(!equal(&json!({"a": "True"}), &json!({"a": true})));
    }

    #[test]
    fn test_empty_right_list_is_never_equal() {
        assert!(!equal_list(&json!([]), &json!([])));
        assert!(!equal_list(&json!([]), &Value::Null));

        let d = diff_list(&json!([[]]), &json!([[]])).unwrap();
        assert_eq!(d.reason, Reason::EmptyCounterpart);
        assert_eq!(d.path_string(), "[0]");

        // Inside a mapping both empty values are skipped first.
        assert!(equal(&json!({"a": []}), &json!({"a": []})));
    }

    #[test]
    fn test_list_of_maps_ignores_key_order() {
        assert!(equal_list(
            &json!([{"k": 1, "j": 2}]),
            &json!([{"j": 2, "k": 1}])
        ));
        assert!(equal_list(
            &json!([{"name": "b"}, {"name": "a"}]),
            &json!([{"name": "a"}, {"name": "b"}])
        ));
    }

    #[test]
    fn test_nested_difference_path() {
        let a = json!({"host": {"initiators": [{"address": "a"}, {"address": "b"}]}});
        let b = json!({"host": {"initiators": [{"address": "a"}, {"address": "c"}]}});
        let d = diff(&a, &b).unwrap();
        assert_eq!(d.reason, Reason::ValueMismatch);
        assert_eq!(d.path_string(), "host.initiators[1].address");
        assert_eq!(
            d.to_string(),
            "key 'host.initiators[1].address' (values differ)"
        );
    }

    #[test]
    fn test_kind_mismatch_is_unequal() {
        let d = diff(&json!({"a": {"b": 1}}), &json!({"a": [1]})).unwrap();
        assert_eq!(d.reason, Reason::KindMismatch);
        assert_eq!(d.path_string(), "a");

        let d = diff(&json!({"a": [1]}), &json!({"a": 1})).unwrap();
        assert_eq!(d.reason, Reason::KindMismatch);

        let d = diff(&json!({"a": 1}), &json!({"a": {"b": 1}})).unwrap();
        assert_eq!(d.reason, Reason::KindMismatch);

        assert!(!equal_list(&json!([{"a": 1}]), &json!([1])));
    }

    #[test]
    fn test_nested_lists() {
        assert!(equal_list(&json!([[2, 1], [3]]), &json!([[3], [2, 1]])));
        assert!(!equal_list(&json!([[1, 2]]), &json!([[1, 3]])));
    }

    #[test]
    fn test_canonical_forms() {
        assert_eq!(canonical(&json!(16384.0)), "16384");
        assert_eq!(canonical(&json!(1.5)), "1.5");
        assert_eq!(canonical(&json!("abc")), "abc");
        assert_eq!(canonical(&json!(null)), "null");
        assert_eq!(canonical(&json!({"b": 1, "a": 2.0})), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!([0])));
        assert!(is_truthy(&json!(-1)));
    }
}
