//! Structural predicates for descriptor content.
//!
//! These are intentionally shallow "is this JSON valid for type T" checks.
//! Callers use them to drop invalid caller-supplied records rather than to
//! reject the whole pass.

use serde_json::{Map, Value};

/// Fields every pass must carry, with their expected JSON type.
const REQUIRED_FIELDS: &[(&str, fn(&Value) -> bool)] = &[
    ("formatVersion", Value::is_number),
    ("description", Value::is_string),
    ("organizationName", Value::is_string),
    ("passTypeIdentifier", Value::is_string),
    ("serialNumber", Value::is_string),
    ("teamIdentifier", Value::is_string),
];

/// Names of required root fields that are absent or have the wrong type.
pub fn missing_required_fields(root: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .filter(|(name, check)| !root.get(*name).is_some_and(|v| check(v)))
        .map(|(name, _)| *name)
        .collect()
}

/// A field record: an object with a non-empty string `key` and a string or
/// number `value`. `label` and `attributedValue`, when present, must be
/// strings (the latter may also be a number).
pub fn is_valid_field(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let key_ok = obj
        .get("key")
        .and_then(Value::as_str)
        .is_some_and(|k| !k.is_empty());
    let value_ok = obj
        .get("value")
        .is_some_and(|v| v.is_string() || v.is_number());
    let label_ok = obj.get("label").map_or(true, Value::is_string);
    let attributed_ok = obj
        .get("attributedValue")
        .map_or(true, |v| v.is_string() || v.is_number());

    key_ok && value_ok && label_ok && attributed_ok
}

/// A beacon: `proximityUUID` string, optional 16-bit `major`/`minor`,
/// optional `relevantText` string.
pub fn is_valid_beacon(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let uuid_ok = obj
        .get("proximityUUID")
        .and_then(Value::as_str)
        .is_some_and(|u| !u.is_empty());
    let u16_or_absent =
        |key: &str| obj.get(key).map_or(true, |v| v.as_u64().is_some_and(|n| n <= u16::MAX as u64));

    uuid_ok && u16_or_absent("major") && u16_or_absent("minor") && optional_string(obj, "relevantText")
}

/// A location: numeric `latitude` and `longitude` in range, optional numeric
/// `altitude`, optional `relevantText` string.
pub fn is_valid_location(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let in_range = |key: &str, limit: f64| {
        obj.get(key)
            .and_then(Value::as_f64)
            .is_some_and(|n| (-limit..=limit).contains(&n))
    };
    let altitude_ok = obj.get("altitude").map_or(true, Value::is_number);

    in_range("latitude", 90.0)
        && in_range("longitude", 180.0)
        && altitude_ok
        && optional_string(obj, "relevantText")
}

fn optional_string(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).map_or(true, Value::is_string)
}
