//! Fingerprint stringification.
//!
//! Two distinct canonical forms of a [LabelSet] are produced here:
//!
//! * the *display* form (`key:value;key:value`) used for chip text, selection keys and
//!   de-duplication. Object and array values are rendered the way the database renders JSON
//!   text, so that strings computed here are byte-identical to those computed by the backend.
//! * the *query* form, plain compact JSON, used for the `fingerprint=` query parameter.
//!
//! The two must stay separate: one is a display format, the other a backend query key.

use crate::error::ExplorerError;

use serde_json::{Map, Number, Value};

/// A mapping from label name to an arbitrary JSON value, in insertion order.
pub type LabelSet = Map<String, Value>;

/// Shown for a label set that is present but has no labels.
pub const NO_LABELS: &str = "<no labels>";

/// Key that must never be treated as label data.
const TO_STRING_KEY: &str = "toString";

/// Returns the display string of a label set.
///
/// A missing or empty label set yields an empty string, meaning "no filter".
/// Keys are listed in insertion order; the output is order-preserving, not order-normalising.
pub fn label_string(labels: Option<&LabelSet>) -> String {
    match labels {
        Some(labels) => join_labels(labels),
        None => String::new(),
    }
}

/// Returns the display string of a label set for human readable chips.
///
/// Unlike [label_string], a label set that is present but empty yields [NO_LABELS].
pub fn display_label_string(labels: Option<&LabelSet>) -> String {
    match labels {
        Some(labels) if labels.is_empty() => NO_LABELS.to_string(),
        Some(labels) => join_labels(labels),
        None => String::new(),
    }
}

fn join_labels(labels: &LabelSet) -> String {
    labels
        .iter()
        .filter(|(key, _)| key.as_str() != TO_STRING_KEY)
        .map(|(key, value)| format!("{}:{}", key, format_label_value(value)))
        .collect::<Vec<_>>()
        .join(";")
}

/// Formats a single label value for display.
///
/// Objects and arrays (and `null`) are serialised to JSON, then `,` becomes `", "` and `:`
/// becomes `": "`, character for character.
pub fn format_label_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => js_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => {
            let json = serde_json::to_string(&normalise_numbers(value)).unwrap_or_default();
            json.replace(',', ", ").replace(':', ": ")
        }
    }
}

/// Returns the query string form of a fingerprint.
///
/// Any truthy value is rendered as compact JSON. Falsy values (`null`, `false`, `0`, `""`) and
/// a missing fingerprint yield an empty string.
pub fn fingerprint_to_string(fingerprint: Option<&Value>) -> String {
    match fingerprint {
        Some(value) if is_truthy(value) => serde_json::to_string(value).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Parses the query string form of a fingerprint.
///
/// A blank string means no fingerprint. Anything other than a JSON object (or `null`) is an
/// error.
pub fn parse_fingerprint(raw: &str) -> Result<Option<LabelSet>, ExplorerError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(labels) => Ok(Some(labels)),
        Value::Null => Ok(None),
        other => Err(ExplorerError::FingerprintNotObject {
            kind: json_kind(&other),
        }),
    }
}

/// Name of the JSON type of a value.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Renders a number the way JavaScript does: integral floats lose their fractional part.
fn js_number(n: &Number) -> String {
    match integral(n) {
        Some(i) => i.to_string(),
        None => n.to_string(),
    }
}

/// Largest integer exactly representable in an f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn integral(n: &Number) -> Option<i64> {
    if n.is_i64() || n.is_u64() {
        return n.as_i64();
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        Some(f as i64)
    } else {
        None
    }
}

/// Converts integral floats to integers throughout a value, so that `1.0` serialises as `1`.
fn normalise_numbers(value: &Value) -> Value {
    match value {
        Value::Number(n) => match integral(n) {
            Some(i) if n.is_f64() => Value::from(i),
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(normalise_numbers).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalise_numbers(v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn labels(value: Value) -> LabelSet {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn label_string_none_and_empty() {
        assert_eq!("", label_string(None));
        assert_eq!("", label_string(Some(&LabelSet::new())));
    }

    #[test]
    fn display_label_string_none_and_empty() {
        assert_eq!("", display_label_string(None));
        assert_eq!(NO_LABELS, display_label_string(Some(&LabelSet::new())));
    }

    #[test]
    fn label_string_scalars() {
        let l = labels(json!({"a": 1, "b": "two", "c": true, "d": 1.5}));
        assert_eq!("a:1;b:two;c:true;d:1.5", label_string(Some(&l)));
    }

    #[test]
    fn label_string_preserves_insertion_order() {
        let ba = labels(json!({"b": 2, "a": 1}));
        let ab = labels(json!({"a": 1, "b": 2}));
        assert_eq!("b:2;a:1", label_string(Some(&ba)));
        assert_eq!("a:1;b:2", label_string(Some(&ab)));
    }

    #[test]
    fn label_string_skips_to_string_key() {
        let l = labels(json!({"a": 1, "toString": "x", "b": 2}));
        assert_eq!("a:1;b:2", label_string(Some(&l)));
    }

    #[test]
    fn format_object_value_matches_database_text() {
        let v = json!({"cpu": 4, "mem": "8G"});
        assert_eq!(r#"{"cpu": 4, "mem": "8G"}"#, format_label_value(&v));
    }

    #[test]
    fn format_array_value() {
        assert_eq!("[1, 2, 3]", format_label_value(&json!([1, 2, 3])));
    }

    #[test]
    fn format_replaces_inside_strings_too() {
        let v = json!(["a,b", "c:d"]);
        assert_eq!(r#"["a, b", "c: d"]"#, format_label_value(&v));
    }

    #[test]
    fn format_null() {
        assert_eq!("null", format_label_value(&Value::Null));
    }

    #[test]
    fn format_integral_float() {
        assert_eq!("2", format_label_value(&json!(2.0)));
        assert_eq!("[2, 2.5]", format_label_value(&json!([2.0, 2.5])));
    }

    #[test]
    fn nested_label_string() {
        let l = labels(json!({"env": "prod", "hw": {"cpu": 4, "arch": ["x86", "arm"]}}));
        assert_eq!(
            r#"env:prod;hw:{"cpu": 4, "arch": ["x86", "arm"]}"#,
            label_string(Some(&l))
        );
    }

    #[test]
    fn fingerprint_to_string_falsy() {
        assert_eq!("", fingerprint_to_string(None));
        assert_eq!("", fingerprint_to_string(Some(&Value::Null)));
        assert_eq!("", fingerprint_to_string(Some(&json!(false))));
        assert_eq!("", fingerprint_to_string(Some(&json!(0))));
        assert_eq!("", fingerprint_to_string(Some(&json!(""))));
    }

    #[test]
    fn fingerprint_to_string_is_compact_json() {
        let v = json!({"b": 2, "a": {"x": [1, 2]}});
        assert_eq!(r#"{"b":2,"a":{"x":[1,2]}}"#, fingerprint_to_string(Some(&v)));
        // Empty objects are truthy.
        assert_eq!("{}", fingerprint_to_string(Some(&json!({}))));
    }

    #[test]
    fn fingerprint_round_trip() {
        let v = json!({"env": "prod", "nested": {"a": [1, "two", null]}, "flag": true});
        let s = fingerprint_to_string(Some(&v));
        let parsed: Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v, parsed);
        assert_eq!(Some(labels(v)), parse_fingerprint(&s).unwrap());
    }

    #[test]
    fn parse_blank_fingerprint() {
        assert_eq!(None, parse_fingerprint("").unwrap());
        assert_eq!(None, parse_fingerprint("  ").unwrap());
        assert_eq!(None, parse_fingerprint("null").unwrap());
    }

    #[test]
    fn parse_malformed_fingerprint() {
        let err = parse_fingerprint("{\"env\":").unwrap_err();
        assert!(matches!(err, ExplorerError::FingerprintParse(_)));
    }

    #[test]
    fn parse_non_object_fingerprint() {
        let err = parse_fingerprint("[1, 2]").unwrap_err();
        assert!(matches!(
            err,
            ExplorerError::FingerprintNotObject { kind: "array" }
        ));
    }
}
